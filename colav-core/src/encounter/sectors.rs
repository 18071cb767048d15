//! Sector geometry for encounter classification
//!
//! Two angular thresholds partition the circle into four sectors. The
//! relative bearing sector (RBS) locates the target as seen from own ship;
//! the situation sector (SS) locates the target's course within the same
//! partition rotated to the target's point of view. A 4x4 lookup over
//! (RBS, SS) yields the encounter class, with the range situation breaking
//! ties.
//!
//! Sectors are half-open [lo, hi) in the positive rotation direction, so a
//! value exactly on a boundary lands in exactly one sector.

use std::f64::consts::{PI, TAU};

use super::{EncounterClass, RangeSituation};

/// Half-width of the bow/stern sectors, degrees
pub const THETA_1_DEG: f64 = 20.0;
/// Boundary between the beam and stern sectors, degrees
pub const THETA_2_DEG: f64 = 120.0;

/// True when `angle` lies in the half-open arc [start, end) measured in the
/// positive rotation direction. Wraps through 0 correctly.
pub(crate) fn angle_in_range(angle: f64, start: f64, end: f64) -> bool {
    (angle - start).rem_euclid(TAU) < (end - start).rem_euclid(TAU)
}

/// The sector partition shared by RBS and SS.
#[derive(Debug, Clone)]
pub struct SectorClassifier {
    theta_1: f64,
    theta_2: f64,
    /// Arc widths of sectors 1..4
    arcs: [f64; 4],
}

impl Default for SectorClassifier {
    fn default() -> Self {
        Self::new(THETA_1_DEG.to_radians(), THETA_2_DEG.to_radians())
    }
}

impl SectorClassifier {
    pub fn new(theta_1: f64, theta_2: f64) -> Self {
        Self {
            theta_1,
            theta_2,
            arcs: [
                2.0 * theta_1,
                theta_2 - theta_1,
                2.0 * (PI - theta_2),
                theta_2 - theta_1,
            ],
        }
    }

    /// Relative bearing sector of the target as seen from own ship.
    /// `target_pos` is (east, north) meters with own ship at the origin.
    pub fn relative_bearing_sector(&self, own_course: f64, target_pos: [f64; 2]) -> u8 {
        let phi = target_pos[0].atan2(target_pos[1]) - own_course;

        if angle_in_range(phi, -self.theta_1, self.theta_1) {
            1
        } else if angle_in_range(phi, self.theta_1, self.theta_2) {
            2
        } else if angle_in_range(phi, self.theta_2, -self.theta_2) {
            3
        } else {
            4
        }
    }

    /// Situation sector of the target's course, plus the rotated boundaries
    /// (theta_11, theta_22) needed by the RBS=1/SS=3 special case.
    pub fn situation_sector(&self, target_course: f64, target_pos: [f64; 2]) -> (u8, f64, f64) {
        // Bearing of own ship as seen from the target
        let phi_ts = (-target_pos[0]).atan2(-target_pos[1]);
        let theta_11 = self.theta_1 + phi_ts;
        let theta_22 = self.theta_2 + phi_ts;

        let b2 = theta_11 + self.arcs[1];
        let b3 = b2 + self.arcs[2];
        let b4 = b3 + self.arcs[3];

        let ss = if angle_in_range(target_course, theta_11, b2) {
            2
        } else if angle_in_range(target_course, b2, b3) {
            3
        } else if angle_in_range(target_course, b3, b4) {
            4
        } else {
            1
        };
        (ss, theta_11, theta_22)
    }

    /// Opening or closing range, from the sign of p_rel . v_rel.
    pub fn range_situation(
        &self,
        own_course: f64,
        target_course: f64,
        target_pos: [f64; 2],
        own_speed: f64,
        target_speed: f64,
    ) -> RangeSituation {
        let v_rel_e = target_speed * target_course.sin() - own_speed * own_course.sin();
        let v_rel_n = target_speed * target_course.cos() - own_speed * own_course.cos();
        let dot = target_pos[0] * v_rel_e + target_pos[1] * v_rel_n;
        if dot >= 0.0 {
            RangeSituation::Increasing
        } else {
            RangeSituation::ClosingIn
        }
    }

    /// Classify the instantaneous geometry. All angles radians, positions
    /// (east, north) meters relative to own ship, speeds m/s.
    pub fn classify(
        &self,
        own_course: f64,
        target_course: f64,
        target_pos: [f64; 2],
        own_speed: f64,
        target_speed: f64,
    ) -> EncounterClass {
        use EncounterClass::*;

        let rbs = self.relative_bearing_sector(own_course, target_pos);
        let (ss, _theta_11, theta_22) = self.situation_sector(target_course, target_pos);
        let range = self.range_situation(
            own_course,
            target_course,
            target_pos,
            own_speed,
            target_speed,
        );
        let closing = range == RangeSituation::ClosingIn;

        match (rbs, ss) {
            (1, 1) => Headon,
            (1, 2) => Giveway,
            (1, 3) => {
                // Overtaking from astern of the target; the half of the
                // stern sector the target's course falls in decides the side.
                if !closing {
                    Safe
                } else if angle_in_range(target_course, theta_22, theta_22 + self.arcs[2] / 2.0) {
                    OvertakingPort
                } else {
                    OvertakingStar
                }
            }
            (1, 4) => Standon,
            (2, 1) | (2, 2) => Giveway,
            (2, 3) => {
                if closing {
                    OvertakingStar
                } else {
                    Safe
                }
            }
            (2, 4) => Safe,
            (3, 1) | (3, 2) | (3, 4) => {
                if closing {
                    Standon
                } else {
                    Safe
                }
            }
            (3, 3) => Safe,
            (4, 1) => Standon,
            (4, 2) => Safe,
            (4, 3) => {
                if closing {
                    OvertakingPort
                } else {
                    Safe
                }
            }
            _ => Standon, // (4, 4)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const D2R: f64 = PI / 180.0;

    #[test]
    fn test_angle_in_range_wraps() {
        assert!(angle_in_range(0.0, -20.0 * D2R, 20.0 * D2R));
        assert!(angle_in_range(350.0 * D2R, -20.0 * D2R, 20.0 * D2R));
        assert!(!angle_in_range(20.0 * D2R, -20.0 * D2R, 20.0 * D2R)); // half-open
        assert!(angle_in_range(-20.0 * D2R, -20.0 * D2R, 20.0 * D2R));
        assert!(angle_in_range(5.0 * D2R, 300.0 * D2R, 60.0 * D2R));
        assert!(!angle_in_range(100.0 * D2R, 300.0 * D2R, 60.0 * D2R));
    }

    #[test]
    fn test_rbs_sectors() {
        let c = SectorClassifier::default();
        assert_eq!(c.relative_bearing_sector(0.0, [0.0, 100.0]), 1); // dead ahead
        assert_eq!(c.relative_bearing_sector(0.0, [100.0, 100.0]), 2); // starboard bow
        assert_eq!(c.relative_bearing_sector(0.0, [0.0, -100.0]), 3); // astern
        assert_eq!(c.relative_bearing_sector(0.0, [-100.0, 100.0]), 4); // port bow
        // Rotating own course rotates the partition with it
        assert_eq!(c.relative_bearing_sector(90.0 * D2R, [100.0, 0.0]), 1);
    }

    #[test]
    fn test_head_on_geometry() {
        let c = SectorClassifier::default();
        // Own ship northbound, target dead ahead southbound: reciprocal courses
        let class = c.classify(0.0, PI, [0.0, 500.0], 5.0, 5.0);
        assert_eq!(class, EncounterClass::Headon);
    }

    #[test]
    fn test_crossing_starboard_gives_way() {
        let c = SectorClassifier::default();
        // Target on starboard bow crossing to port
        let class = c.classify(0.0, 270.0 * D2R, [500.0, 500.0], 5.0, 5.0);
        assert_eq!(class, EncounterClass::Giveway);
    }

    #[test]
    fn test_crossing_port_stands_on() {
        let c = SectorClassifier::default();
        // Target on port bow crossing to starboard
        let class = c.classify(0.0, 90.0 * D2R, [-500.0, 500.0], 5.0, 5.0);
        assert_eq!(class, EncounterClass::Standon);
    }

    #[test]
    fn test_overtaking_halves() {
        let c = SectorClassifier::default();
        // Faster own ship coming up on a slow target dead ahead. The half of
        // the stern sector the target's course lands in selects the side;
        // a course exactly on the half boundary is the starboard half.
        let star = c.classify(0.0, 1.0 * D2R, [0.0, 200.0], 10.0, 3.0);
        assert_eq!(star, EncounterClass::OvertakingStar);

        let port = c.classify(0.0, -1.0 * D2R, [0.0, 200.0], 10.0, 3.0);
        assert_eq!(port, EncounterClass::OvertakingPort);
    }

    #[test]
    fn test_receding_target_is_safe() {
        let c = SectorClassifier::default();
        // Same geometry as the overtake but the target is the faster one,
        // so range increases and the class stays safe.
        let class = c.classify(0.0, 1.0 * D2R, [0.0, 200.0], 3.0, 10.0);
        assert_eq!(class, EncounterClass::Safe);
    }
}
