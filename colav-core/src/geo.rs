//! Geodetic and unit transforms
//!
//! All coordinate plumbing for the COLAV pipeline: WGS-84 geodetic to
//! local East-North-Up (through ECEF) and back, NMEA degrees-decimal-minutes
//! to decimal degrees, and the usual marine unit conversions.
//!
//! Every 2-D vector in the pipeline is (east, north) in meters; courses are
//! measured clockwise from true north.

use std::str::FromStr;

use crate::error::GeoError;

/// WGS-84 semi-major axis in meters
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS-84 first eccentricity squared
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// Conversion constants
pub const NAUTICAL_MILE_M: f64 = 1852.0;
pub const KNOT_MPS: f64 = 0.514444;
pub const NM_PER_DEGREE: f64 = 60.0;

/// Hemisphere indicator of a DDM coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    fn sign(&self) -> f64 {
        match self {
            Hemisphere::North | Hemisphere::East => 1.0,
            Hemisphere::South | Hemisphere::West => -1.0,
        }
    }
}

impl FromStr for Hemisphere {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "N" => Ok(Hemisphere::North),
            "S" => Ok(Hemisphere::South),
            "E" => Ok(Hemisphere::East),
            "W" => Ok(Hemisphere::West),
            other => Err(GeoError::UnknownHemisphere(other.to_string())),
        }
    }
}

/// Axis selector for [`dec_2_deg`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Lat,
    Lon,
}

/// Convert degrees-decimal-minutes ("DDMM.mmmm") plus hemisphere to signed
/// decimal degrees. South and west are negative.
pub fn deg_2_dec(ddm: f64, dir: Hemisphere) -> f64 {
    let degrees = (ddm / 100.0).trunc();
    let minutes = ddm - degrees * 100.0;
    dir.sign() * (degrees + minutes / 60.0)
}

/// Convert signed decimal degrees back to ("DDMM.mmmm", hemisphere letter).
/// The returned magnitude is always positive; the letter carries the sign.
pub fn dec_2_deg(dec: f64, axis: Axis) -> (f64, Hemisphere) {
    let dir = match (axis, dec < 0.0) {
        (Axis::Lon, false) => Hemisphere::East,
        (Axis::Lon, true) => Hemisphere::West,
        (Axis::Lat, false) => Hemisphere::North,
        (Axis::Lat, true) => Hemisphere::South,
    };
    let a = dec.abs();
    let degrees = a.trunc();
    (degrees * 100.0 + (a - degrees) * 60.0, dir)
}

/// Geodetic (degrees, meters) to ECEF (meters)
fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, alt: f64) -> [f64; 3] {
    let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon_deg.to_radians().sin_cos();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    [
        (n + alt) * cos_lat * cos_lon,
        (n + alt) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + alt) * sin_lat,
    ]
}

/// ECEF (meters) to geodetic (degrees, meters), iterative latitude solve.
fn ecef_to_geodetic(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let lon = y.atan2(x);
    let p = (x * x + y * y).sqrt();

    let mut lat = z.atan2(p * (1.0 - WGS84_E2));
    for _ in 0..8 {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        let alt = p / lat.cos() - n;
        lat = z.atan2(p * (1.0 - WGS84_E2 * n / (n + alt)));
    }

    let sin_lat = lat.sin();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    let alt = p / lat.cos() - n;
    (lat.to_degrees(), lon.to_degrees(), alt)
}

/// Geodetic position to local East-North-Up meters around the origin
/// (lat_o, lon_o, alt_o). Returns (east, north, up).
pub fn coords_to_xyz(
    lat: f64,
    lon: f64,
    alt: f64,
    lat_o: f64,
    lon_o: f64,
    alt_o: f64,
) -> (f64, f64, f64) {
    let ecef = geodetic_to_ecef(lat, lon, alt);
    let origin = geodetic_to_ecef(lat_o, lon_o, alt_o);
    let dx = ecef[0] - origin[0];
    let dy = ecef[1] - origin[1];
    let dz = ecef[2] - origin[2];

    let (sin_lat, cos_lat) = lat_o.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon_o.to_radians().sin_cos();

    let east = -sin_lon * dx + cos_lon * dy;
    let north = -sin_lat * cos_lon * dx - sin_lat * sin_lon * dy + cos_lat * dz;
    let up = cos_lat * cos_lon * dx + cos_lat * sin_lon * dy + sin_lat * dz;
    (east, north, up)
}

/// Local East-North-Up meters around (lat_o, lon_o) back to geodetic
/// (lat, lon) degrees. Inverse of [`coords_to_xyz`].
pub fn xyz_to_coords(x: f64, y: f64, lat_o: f64, lon_o: f64) -> (f64, f64) {
    xyz_to_coords_alt(x, y, lat_o, lon_o, 0.0, 0.0)
}

/// As [`xyz_to_coords`] with explicit origin height and up component.
pub fn xyz_to_coords_alt(x: f64, y: f64, lat_o: f64, lon_o: f64, h_o: f64, z: f64) -> (f64, f64) {
    let origin = geodetic_to_ecef(lat_o, lon_o, h_o);
    let (sin_lat, cos_lat) = lat_o.to_radians().sin_cos();
    let (sin_lon, cos_lon) = lon_o.to_radians().sin_cos();

    let dx = -sin_lon * x - sin_lat * cos_lon * y + cos_lat * cos_lon * z;
    let dy = cos_lon * x - sin_lat * sin_lon * y + cos_lat * sin_lon * z;
    let dz = cos_lat * y + sin_lat * z;

    let (lat, lon, _) = ecef_to_geodetic(origin[0] + dx, origin[1] + dy, origin[2] + dz);
    (lat, lon)
}

/// Knots to meters per second
#[inline]
pub fn kn_to_mps(kn: f64) -> f64 {
    kn * KNOT_MPS
}

/// Meters per second to knots
#[inline]
pub fn mps_to_kn(mps: f64) -> f64 {
    mps / KNOT_MPS
}

/// Meters to nautical miles
#[inline]
pub fn m_to_nm(m: f64) -> f64 {
    m / NAUTICAL_MILE_M
}

/// Nautical miles to degrees of latitude
#[inline]
pub fn nm_to_deg(nm: f64) -> f64 {
    nm / NM_PER_DEGREE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddm_to_decimal() {
        // 6326.3043 N = 63 degrees + 26.3043 minutes
        let dec = deg_2_dec(6326.3043, Hemisphere::North);
        assert!((dec - 63.438405).abs() < 1e-6);

        let dec_w = deg_2_dec(1024.5395, Hemisphere::West);
        assert!(dec_w < 0.0);
        assert!((dec_w + 10.408991666666667).abs() < 1e-9);
    }

    #[test]
    fn test_ddm_roundtrip() {
        for dec in [63.438405, -10.408992, 0.25, -0.25] {
            let (ddm, dir) = dec_2_deg(dec, Axis::Lat);
            assert!(ddm >= 0.0);
            let back = deg_2_dec(ddm, dir);
            assert!((back - dec).abs() < 1e-6, "roundtrip failed for {}", dec);
        }
    }

    #[test]
    fn test_hemisphere_parse() {
        assert_eq!("N".parse::<Hemisphere>().unwrap(), Hemisphere::North);
        assert!("X".parse::<Hemisphere>().is_err());
    }

    #[test]
    fn test_enu_roundtrip_within_1cm() {
        let (lat_o, lon_o) = (63.4389, 10.3995); // Trondheim harbour
        for (e, n) in [
            (0.0, 0.0),
            (1000.0, -2000.0),
            (-7000.0, 7000.0),
            (9500.0, 1500.0),
        ] {
            let (lat, lon) = xyz_to_coords(e, n, lat_o, lon_o);
            let (e2, n2, _) = coords_to_xyz(lat, lon, 0.0, lat_o, lon_o, 0.0);
            assert!(
                (e2 - e).abs() < 0.01 && (n2 - n).abs() < 0.01,
                "roundtrip drift at ({}, {}): ({}, {})",
                e,
                n,
                e2 - e,
                n2 - n
            );
        }
    }

    #[test]
    fn test_enu_axes_orientation() {
        let (lat_o, lon_o) = (63.4389, 10.3995);
        // A point 0.01 degrees north maps to positive north, ~1111 m
        let (e, n, _) = coords_to_xyz(lat_o + 0.01, lon_o, 0.0, lat_o, lon_o, 0.0);
        assert!(n > 1000.0 && n < 1200.0);
        assert!(e.abs() < 1.0);
        // A point east of the origin maps to positive east
        let (e, n, _) = coords_to_xyz(lat_o, lon_o + 0.01, 0.0, lat_o, lon_o, 0.0);
        assert!(e > 400.0 && e < 600.0);
        assert!(n.abs() < 1.0);
    }

    #[test]
    fn test_unit_conversions() {
        assert!((kn_to_mps(1.0) - 0.514444).abs() < 1e-9);
        assert!((mps_to_kn(kn_to_mps(7.3)) - 7.3).abs() < 1e-9);
        assert!((m_to_nm(1852.0) - 1.0).abs() < 1e-12);
        assert!((nm_to_deg(60.0) - 1.0).abs() < 1e-12);
    }
}
