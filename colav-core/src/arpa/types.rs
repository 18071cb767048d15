//! ARPA type definitions
//!
//! Local-frame kinematics produced per tick plus the geodetic report shape
//! the visualization client consumes. All local-frame vectors are
//! (east, north) meters in the ENU frame centered on own ship.

use serde::{Deserialize, Serialize};

use crate::encounter::EncounterClass;

/// Own-ship kinematics in the own-centered ENU frame. Own position is the
/// origin by construction; `z` and `tq` are unit heading vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnShipKinematics {
    pub lat: f64,
    pub lon: f64,
    /// True course, degrees
    pub course_deg: f64,
    /// Speed over ground, m/s
    pub u: f64,
    /// Velocity components, m/s
    pub ux: f64,
    pub uy: f64,
    /// Heading unit vector (sin course, cos course)
    pub z: [f64; 2],
    /// Desired heading unit vector for the CBF nominal control
    pub tq: [f64; 2],
}

/// Closest point of approach for one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpaSolution {
    /// Miss distance at CPA, meters
    pub d_at_cpa: f64,
    /// Own-ship distance travelled to CPA, meters
    pub d_2_cpa: f64,
    /// Time to CPA, seconds
    pub t_2_cpa: f64,
    /// Own-ship position at CPA
    pub x_at_cpa: f64,
    pub y_at_cpa: f64,
    /// Target position at CPA
    pub o_x_at_cpa: f64,
    pub o_y_at_cpa: f64,
}

/// Earliest safety-radius breach for one target; only produced when the miss
/// distance falls inside the safety radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyIntersection {
    /// Time to radius breach, seconds
    pub t_2_r: f64,
    /// Target position at the breach
    pub t_x_at_r: f64,
    pub t_y_at_r: f64,
    /// Own-ship position at the breach
    pub x_at_r: f64,
    pub y_at_r: f64,
    /// Own-ship distance travelled to the breach, meters
    pub d_2_r: f64,
}

/// One target in the own-centered frame with whatever the engine attached.
/// Rebuilt from scratch every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetTrack {
    pub mmsi: String,
    /// Course over ground, degrees
    pub course_deg: f64,
    /// Vessel length in meters; stubbed by the coordinator absent AIS type-5
    pub length: f64,
    /// Position, (east, north) meters
    pub po: [f64; 2],
    /// Speed, m/s
    pub uo: f64,
    /// Heading unit vector
    pub zo: [f64; 2],
    /// Velocity components, m/s
    pub uo_x: f64,
    pub uo_y: f64,
    pub cpa: Option<CpaSolution>,
    pub safety: Option<SafetyIntersection>,
    /// Committed encounter state, attached by the coordinator after the
    /// classifier pass
    pub encounter: EncounterClass,
}

/// Geodetic ARPA report for the visualization client, one per target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArpaReport {
    /// Own-ship course, degrees
    pub self_course: f64,
    /// Target course, degrees
    pub course: f64,
    pub t_2_cpa: f64,
    /// Target position
    pub lat_o: f64,
    pub lon_o: f64,
    /// Target speed, m/s
    pub uo: f64,
    /// Target heading unit vector
    pub zo: [f64; 2],
    pub d_at_cpa: f64,
    pub d_2_cpa: f64,
    /// Own-ship position at CPA
    pub lat_at_cpa: f64,
    pub lon_at_cpa: f64,
    /// Target position at CPA
    pub lat_o_at_cpa: f64,
    pub lon_o_at_cpa: f64,
    pub safety_params: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_2_r: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat_o_at_r: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon_o_at_r: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat_at_r: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon_at_r: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d_2_r: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_radius: Option<f64>,
}
