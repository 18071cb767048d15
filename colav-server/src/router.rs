//! Record router
//!
//! Consumes typed sensor records from whatever transport feeds the mpsc
//! channel, keeps the world model current, decorates AIS records (smoothed
//! track, predicted position) and forwards every record to the relay as a
//! `datain` passthrough.

use chrono::Utc;
use colav_core::geo::{self, Hemisphere};
use colav_core::records::{AisContact, AisRecord, GprmcRecord, InputRecord, OwnShipState};
use colav_core::smoother::{SmootherConfig, TrackSmoother};
use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;

use crate::{SharedWorld, SubsystemResult};

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// AIS records farther than this from own ship are dropped, geodetic
    /// degrees
    pub distance_filter_deg: f64,
    /// Dead-reckoning horizon for predicted positions, seconds
    pub predicted_interval_s: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            distance_filter_deg: 1.0,
            predicted_interval_s: 30.0,
        }
    }
}

pub struct RecordRouter {
    world: SharedWorld,
    outbound: mpsc::Sender<String>,
    smoother: TrackSmoother,
    config: RouterConfig,
}

impl RecordRouter {
    pub fn new(world: SharedWorld, outbound: mpsc::Sender<String>, config: RouterConfig) -> Self {
        Self {
            world,
            outbound,
            smoother: TrackSmoother::new(SmootherConfig::default()),
            config,
        }
    }

    pub async fn run(
        mut self,
        subsys: SubsystemHandle,
        mut records: mpsc::Receiver<InputRecord>,
    ) -> SubsystemResult {
        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => break,
                record = records.recv() => match record {
                    Some(record) => self.handle(record),
                    None => {
                        // Transport gone; stay up so the pipeline keeps
                        // serving whatever state it has
                        log::info!("Router: ingress channel closed");
                        subsys.on_shutdown_requested().await;
                        break;
                    }
                },
            }
        }
        Ok(())
    }

    fn handle(&mut self, record: InputRecord) {
        match record {
            InputRecord::Gprmc(r) => self.handle_gprmc(r),
            InputRecord::Psimsns(r) => {
                if let Ok(mut world) = self.world.lock() {
                    world.own_heading_deg = Some(r.head_deg);
                    if let Some(own) = world.own_ship.as_mut() {
                        own.heading_deg = Some(r.head_deg);
                    }
                }
                self.forward(&InputRecord::Psimsns(r));
            }
            InputRecord::Gpgga(r) => self.forward(&InputRecord::Gpgga(r)),
            InputRecord::Ais(r) => self.handle_ais(r),
        }
    }

    fn handle_gprmc(&mut self, record: GprmcRecord) {
        match (
            record.lat_dir.parse::<Hemisphere>(),
            record.lon_dir.parse::<Hemisphere>(),
        ) {
            (Ok(lat_dir), Ok(lon_dir)) => {
                if let Ok(mut world) = self.world.lock() {
                    let heading_deg = world.own_heading_deg;
                    world.own_ship = Some(OwnShipState {
                        lat: geo::deg_2_dec(record.lat, lat_dir),
                        lon: geo::deg_2_dec(record.lon, lon_dir),
                        speed_kn: record.spd_over_grnd,
                        course_deg: record.true_course,
                        heading_deg,
                    });
                }
            }
            _ => log::warn!(
                "Router: GPRMC with unknown hemisphere ({:?}/{:?})",
                record.lat_dir,
                record.lon_dir
            ),
        }
        self.forward(&InputRecord::Gprmc(record));
    }

    fn handle_ais(&mut self, mut record: AisRecord) {
        let own = match self.world.lock() {
            Ok(world) => world.own_ship.clone(),
            Err(_) => return,
        };
        // No own-ship fix yet: nothing to gate against
        let Some(own) = own else { return };

        if !within_distance(
            own.lat,
            own.lon,
            record.lat,
            record.lon,
            self.config.distance_filter_deg,
        ) {
            return;
        }

        let now_ms = Utc::now().timestamp_millis() as u64;
        let smoothed =
            self.smoother
                .update(&record.mmsi, record.lat, record.lon, record.course, now_ms);
        if !smoothed.pos_history.is_empty() {
            record.pos_history = Some(smoothed.pos_history);
        }
        if let Some(course) = smoothed.filtered_course {
            record.course = Some(course);
        }
        set_predicted_position(&mut record, self.config.predicted_interval_s);

        if let Ok(mut world) = self.world.lock() {
            world.targets.insert(
                record.mmsi.clone(),
                AisContact {
                    mmsi: record.mmsi.clone(),
                    lat: record.lat,
                    lon: record.lon,
                    course_deg: record.course,
                    speed_kn: record.speed,
                    received_ms: now_ms,
                },
            );
        }
        self.forward(&InputRecord::Ais(record));
    }

    fn forward(&self, record: &InputRecord) {
        let payload = serde_json::json!({"type": "datain", "content": record});
        if self.outbound.try_send(payload.to_string()).is_err() {
            log::warn!("Router: relay backlog, dropped {}", record.message_id());
        }
    }
}

/// Simple geodetic-degree distance gate, as coarse as the filter it feeds.
pub(crate) fn within_distance(
    own_lat: f64,
    own_lon: f64,
    lat: f64,
    lon: f64,
    limit_deg: f64,
) -> bool {
    let d_lat = lat - own_lat;
    let d_lon = lon - own_lon;
    (d_lat * d_lat + d_lon * d_lon).sqrt() < limit_deg
}

/// Project an AIS record forward along (course, speed) and write the
/// predicted position back onto it.
pub(crate) fn set_predicted_position(record: &mut AisRecord, horizon_s: f64) {
    let (Some(course), Some(speed)) = (record.course, record.speed) else {
        return;
    };
    if speed <= 0.0 {
        return;
    }

    let u = geo::kn_to_mps(speed);
    let course_rad = course.to_radians();
    let east = course_rad.sin() * u * horizon_s;
    let north = course_rad.cos() * u * horizon_s;
    let (lat_p, lon_p) = geo::xyz_to_coords(east, north, record.lat, record.lon);
    record.lat_p = Some(lat_p);
    record.lon_p = Some(lon_p);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ais(course: Option<f64>, speed: Option<f64>) -> AisRecord {
        AisRecord {
            message_id: "!AI_257000001".into(),
            mmsi: "257000001".into(),
            lat: 63.44,
            lon: 10.41,
            course,
            heading: None,
            speed,
            pos_history: None,
            lat_p: None,
            lon_p: None,
        }
    }

    #[test]
    fn test_predicted_position_northbound() {
        let mut record = ais(Some(0.0), Some(geo::mps_to_kn(5.0)));
        set_predicted_position(&mut record, 30.0);
        let lat_p = record.lat_p.unwrap();
        let lon_p = record.lon_p.unwrap();
        // 150 m north is ~0.00135 degrees of latitude
        assert!(lat_p > record.lat);
        assert!((lat_p - record.lat - 0.00135).abs() < 2e-4);
        assert!((lon_p - record.lon).abs() < 1e-6);
    }

    #[test]
    fn test_predicted_position_requires_motion() {
        let mut record = ais(Some(90.0), Some(0.0));
        set_predicted_position(&mut record, 30.0);
        assert!(record.lat_p.is_none());

        let mut record = ais(None, Some(4.0));
        set_predicted_position(&mut record, 30.0);
        assert!(record.lat_p.is_none());
    }

    #[test]
    fn test_distance_gate() {
        assert!(within_distance(63.0, 10.0, 63.4, 10.4, 1.0));
        assert!(!within_distance(63.0, 10.0, 64.0, 11.0, 1.0));
        // Boundary is exclusive
        assert!(!within_distance(63.0, 10.0, 64.0, 10.0, 1.0));
    }
}
