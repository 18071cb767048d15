//! ARPA engine
//!
//! Per-tick evaluation over a snapshot of the AIS contact map: build
//! local-frame kinematics for own ship and every target, compute CPA, apply
//! the gates, and solve the safety-radius intersection where the pass is
//! tighter than the radius. Records are rebuilt every tick; nothing here
//! persists.

use std::collections::BTreeMap;

use super::cpa::{closest_point_of_approach, safety_radius_intersection};
use super::types::{ArpaReport, OwnShipKinematics, TargetTrack};
use crate::encounter::EncounterClass;
use crate::geo;
use crate::records::{AisContact, OwnShipState};

/// ARPA gate and frame parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ArpaConfig {
    /// Safety radius, meters
    pub safety_radius: f64,
    /// CPA records are kept up to safety_radius * safety_radius_tol
    pub safety_radius_tol: f64,
    /// Own-ship travel gate to CPA, meters
    pub max_d_2_cpa: f64,
    /// Own-ship MMSI; its own AIS echo is skipped
    pub own_mmsi: String,
}

impl Default for ArpaConfig {
    fn default() -> Self {
        Self {
            safety_radius: 200.0,
            safety_radius_tol: 1.5,
            max_d_2_cpa: 2000.0,
            own_mmsi: String::new(),
        }
    }
}

/// Stateless CPA/safety-radius engine.
#[derive(Debug, Clone)]
pub struct ArpaEngine {
    config: ArpaConfig,
}

impl ArpaEngine {
    pub fn new(config: ArpaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArpaConfig {
        &self.config
    }

    /// Own-ship kinematics in the own-centered ENU frame. The desired
    /// heading for the CBF nominal control is the current course.
    pub fn own_kinematics(&self, own: &OwnShipState) -> OwnShipKinematics {
        let course_rad = own.course_deg.to_radians();
        let z = [course_rad.sin(), course_rad.cos()];
        let u = geo::kn_to_mps(own.speed_kn);
        OwnShipKinematics {
            lat: own.lat,
            lon: own.lon,
            course_deg: own.course_deg,
            u,
            ux: u * z[0],
            uy: u * z[1],
            z,
            tq: z,
        }
    }

    /// Evaluate one snapshot. Targets without a gated CPA are omitted.
    pub fn evaluate(
        &self,
        own: &OwnShipState,
        targets: &BTreeMap<String, AisContact>,
    ) -> (OwnShipKinematics, Vec<TargetTrack>) {
        let own_kin = self.own_kinematics(own);
        let mut tracks = Vec::new();

        for (mmsi, contact) in targets {
            if *mmsi == self.config.own_mmsi {
                continue;
            }

            let mut track = self.target_track(&own_kin, contact);
            let Some(cpa) = closest_point_of_approach(own_kin.ux, own_kin.uy, &track) else {
                continue;
            };

            let within_gates = cpa.t_2_cpa >= 0.0
                && cpa.d_2_cpa <= self.config.max_d_2_cpa
                && cpa.d_at_cpa <= self.config.safety_radius * self.config.safety_radius_tol;
            if !within_gates {
                continue;
            }

            track.cpa = Some(cpa);
            if cpa.d_at_cpa < self.config.safety_radius {
                track.safety = safety_radius_intersection(
                    own_kin.ux,
                    own_kin.uy,
                    &track,
                    self.config.safety_radius,
                );
            }
            tracks.push(track);
        }

        (own_kin, tracks)
    }

    /// Local-frame kinematics of one AIS contact. Missing course or speed
    /// is treated as 0.
    fn target_track(&self, own: &OwnShipKinematics, contact: &AisContact) -> TargetTrack {
        let course_deg = contact.course_deg.unwrap_or(0.0);
        let speed_kn = contact.speed_kn.unwrap_or(0.0);

        let (east, north, _) =
            geo::coords_to_xyz(contact.lat, contact.lon, 0.0, own.lat, own.lon, 0.0);
        let course_rad = course_deg.to_radians();
        let zo = [course_rad.sin(), course_rad.cos()];
        let uo = geo::kn_to_mps(speed_kn);

        TargetTrack {
            mmsi: contact.mmsi.clone(),
            course_deg,
            length: 50.0,
            po: [east, north],
            uo,
            zo,
            uo_x: uo * zo[0],
            uo_y: uo * zo[1],
            cpa: None,
            safety: None,
            encounter: EncounterClass::Safe,
        }
    }

    /// Re-express evaluated tracks in geodetic coordinates for the UI.
    pub fn convert_arpa_params(
        &self,
        own: &OwnShipKinematics,
        tracks: &[TargetTrack],
    ) -> BTreeMap<String, ArpaReport> {
        let mut reports = BTreeMap::new();

        for track in tracks {
            let Some(cpa) = track.cpa else { continue };
            let (lat_o, lon_o) = geo::xyz_to_coords(track.po[0], track.po[1], own.lat, own.lon);
            let (lat_at_cpa, lon_at_cpa) =
                geo::xyz_to_coords(cpa.x_at_cpa, cpa.y_at_cpa, own.lat, own.lon);
            let (lat_o_at_cpa, lon_o_at_cpa) =
                geo::xyz_to_coords(cpa.o_x_at_cpa, cpa.o_y_at_cpa, own.lat, own.lon);

            let mut report = ArpaReport {
                self_course: own.course_deg,
                course: track.course_deg,
                t_2_cpa: cpa.t_2_cpa,
                lat_o,
                lon_o,
                uo: track.uo,
                zo: track.zo,
                d_at_cpa: cpa.d_at_cpa,
                d_2_cpa: cpa.d_2_cpa,
                lat_at_cpa,
                lon_at_cpa,
                lat_o_at_cpa,
                lon_o_at_cpa,
                safety_params: false,
                t_2_r: None,
                lat_o_at_r: None,
                lon_o_at_r: None,
                lat_at_r: None,
                lon_at_r: None,
                d_2_r: None,
                safety_radius: None,
            };

            if let Some(sp) = track.safety {
                let (lat_o_at_r, lon_o_at_r) =
                    geo::xyz_to_coords(sp.t_x_at_r, sp.t_y_at_r, own.lat, own.lon);
                let (lat_at_r, lon_at_r) =
                    geo::xyz_to_coords(sp.x_at_r, sp.y_at_r, own.lat, own.lon);
                report.safety_params = true;
                report.t_2_r = Some(sp.t_2_r);
                report.lat_o_at_r = Some(lat_o_at_r);
                report.lon_o_at_r = Some(lon_o_at_r);
                report.lat_at_r = Some(lat_at_r);
                report.lon_at_r = Some(lon_at_r);
                report.d_2_r = Some(sp.d_2_r);
                report.safety_radius = Some(self.config.safety_radius);
            }

            reports.insert(track.mmsi.clone(), report);
        }
        reports
    }
}
