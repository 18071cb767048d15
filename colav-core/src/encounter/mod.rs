//! Encounter classification under the maritime rules of the road
//!
//! A geometric sector classifier ([`sectors`]) labels the instantaneous
//! own-ship/target geometry, and a per-target hysteresis state machine
//! ([`fsm`]) decides when that label becomes the committed encounter state.
//!
//! Angles are radians throughout this module; callers convert wire degrees
//! at the boundary.

mod fsm;
mod sectors;

use serde::{Deserialize, Serialize};

pub use fsm::{EncounterFsm, HysteresisConfig};
pub use sectors::{SectorClassifier, THETA_1_DEG, THETA_2_DEG};

/// The six encounter categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncounterClass {
    Safe,
    OvertakingStar,
    OvertakingPort,
    Headon,
    Giveway,
    Standon,
}

impl EncounterClass {
    pub const ALL: [EncounterClass; 6] = [
        EncounterClass::Safe,
        EncounterClass::OvertakingStar,
        EncounterClass::OvertakingPort,
        EncounterClass::Headon,
        EncounterClass::Giveway,
        EncounterClass::Standon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EncounterClass::Safe => "SAFE",
            EncounterClass::OvertakingStar => "OVERTAKING_STAR",
            EncounterClass::OvertakingPort => "OVERTAKING_PORT",
            EncounterClass::Headon => "HEADON",
            EncounterClass::Giveway => "GIVEWAY",
            EncounterClass::Standon => "STANDON",
        }
    }
}

impl std::fmt::Display for EncounterClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the pair is opening or closing range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSituation {
    Increasing,
    ClosingIn,
}

/// Sector geometry plus the per-target hysteresis machine, as kept by the
/// coordinator for each MMSI.
#[derive(Debug, Clone)]
pub struct EncounterClassifier {
    sectors: SectorClassifier,
    fsm: EncounterFsm,
}

impl EncounterClassifier {
    pub fn new(hysteresis: HysteresisConfig) -> Self {
        Self {
            sectors: SectorClassifier::default(),
            fsm: EncounterFsm::new(hysteresis),
        }
    }

    /// Committed encounter state.
    pub fn state(&self) -> EncounterClass {
        self.fsm.state()
    }

    /// Classify the instantaneous geometry and feed the result through the
    /// hysteresis machine. `own_course` and `target_course` are radians,
    /// `target_pos` is (east, north) meters relative to own ship, speeds are
    /// m/s, and `d_at_cpa`/`t_2_cpa` are the entry/exit predicate inputs.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        own_course: f64,
        target_course: f64,
        target_pos: [f64; 2],
        own_speed: f64,
        target_speed: f64,
        d_at_cpa: f64,
        t_2_cpa: f64,
    ) -> EncounterClass {
        let classified = self.sectors.classify(
            own_course,
            target_course,
            target_pos,
            own_speed,
            target_speed,
        );
        self.fsm.update(classified, d_at_cpa, t_2_cpa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_head_on_commits_and_holds_through_cpa_growth() {
        let mut classifier = EncounterClassifier::new(HysteresisConfig::default());

        // Reciprocal courses, target 500 m dead ahead, both 5 m/s. CPA is
        // 50 s out with essentially zero miss distance: inside the entry
        // band, so the machine commits to HEADON.
        let state = classifier.update(0.0, PI, [0.0, 500.0], 5.0, 5.0, 0.5, 50.0);
        assert_eq!(state, EncounterClass::Headon);

        // The miss distance drifting out to 210 m leaves the entry band but
        // not the exit band; the commitment holds.
        let state = classifier.update(0.0, PI, [0.0, 500.0], 5.0, 5.0, 210.0, 50.0);
        assert_eq!(state, EncounterClass::Headon);

        // Past the exit bound it releases.
        let state = classifier.update(0.0, PI, [0.0, 500.0], 5.0, 5.0, 320.0, 50.0);
        assert_eq!(state, EncounterClass::Safe);
    }

    #[test]
    fn test_class_strings_match_wire_format() {
        assert_eq!(
            serde_json::to_string(&EncounterClass::OvertakingStar).unwrap(),
            "\"OVERTAKING_STAR\""
        );
        assert_eq!(
            serde_json::to_string(&EncounterClass::Headon).unwrap(),
            "\"HEADON\""
        );
        assert_eq!(
            serde_json::to_string(&EncounterClass::Giveway).unwrap(),
            "\"GIVEWAY\""
        );
        let back: EncounterClass = serde_json::from_str("\"STANDON\"").unwrap();
        assert_eq!(back, EncounterClass::Standon);
    }
}
