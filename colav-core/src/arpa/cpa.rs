//! CPA and safety-radius geometry
//!
//! Constant-velocity extrapolation in the own-centered ENU frame. Own ship
//! sits at the origin; the target at `po` with velocity `(uo_x, uo_y)`.

use super::types::{CpaSolution, SafetyIntersection, TargetTrack};

/// Relative speeds below this are treated as parallel courses (no CPA).
const REL_SPEED_EPS: f64 = 1e-9;

/// Closest point of approach under constant-velocity extrapolation.
///
/// Returns `None` when the relative velocity is degenerate; a negative
/// `t_2_cpa` (CPA in the past) is returned as-is and gated by the caller.
pub(crate) fn closest_point_of_approach(
    ux: f64,
    uy: f64,
    target: &TargetTrack,
) -> Option<CpaSolution> {
    let [po_x, po_y] = target.po;
    let urx = target.uo_x - ux;
    let ury = target.uo_y - uy;
    let ur = (urx * urx + ury * ury).sqrt();

    if ur < REL_SPEED_EPS {
        return None;
    }

    let d_at_cpa = (po_x * ury - po_y * urx).abs() / ur;
    let t_2_cpa = -(po_x * urx + po_y * ury) / (ur * ur);

    let x_at_cpa = ux * t_2_cpa;
    let y_at_cpa = uy * t_2_cpa;
    let d_2_cpa = (x_at_cpa * x_at_cpa + y_at_cpa * y_at_cpa).sqrt();

    Some(CpaSolution {
        d_at_cpa,
        d_2_cpa,
        t_2_cpa,
        x_at_cpa,
        y_at_cpa,
        o_x_at_cpa: po_x + t_2_cpa * target.uo_x,
        o_y_at_cpa: po_y + t_2_cpa * target.uo_y,
    })
}

/// Earliest non-negative time at which the pair distance equals `radius`.
///
/// Solves |p_rel + t v_rel|^2 = radius^2; the quadratic has real roots
/// whenever the CPA miss distance is below the radius. Returns `None` for a
/// negative discriminant or when both roots are in the past.
pub(crate) fn safety_radius_intersection(
    ux: f64,
    uy: f64,
    target: &TargetTrack,
    radius: f64,
) -> Option<SafetyIntersection> {
    let [po_x, po_y] = target.po;
    let urx = target.uo_x - ux;
    let ury = target.uo_y - uy;

    let a = urx * urx + ury * ury;
    let t_2_r = if a < REL_SPEED_EPS * REL_SPEED_EPS {
        // Parallel courses already inside the radius
        0.0
    } else {
        let b = 2.0 * (po_x * urx + po_y * ury);
        let c = po_x * po_x + po_y * po_y - radius * radius;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrt_d = discriminant.sqrt();
        let t_low = (-b - sqrt_d) / (2.0 * a);
        let t_high = (-b + sqrt_d) / (2.0 * a);
        if t_low >= 0.0 {
            t_low
        } else if t_high >= 0.0 {
            // Already inside the radius; the breach is now
            0.0
        } else {
            return None;
        }
    };

    Some(SafetyIntersection {
        t_2_r,
        t_x_at_r: po_x + t_2_r * target.uo_x,
        t_y_at_r: po_y + t_2_r * target.uo_y,
        x_at_r: t_2_r * ux,
        y_at_r: t_2_r * uy,
        d_2_r: ((t_2_r * ux).powi(2) + (t_2_r * uy).powi(2)).sqrt(),
    })
}
