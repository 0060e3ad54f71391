// Coordinate frames used by the sampler and the visibility calculator
//
// - ECI: Earth-centered inertial (SGP4 TEME output), kilometers
// - ECEF: Earth-centered Earth-fixed, meters
// - LLH: WGS84 latitude/longitude (degrees) and height (meters)

use chrono::{DateTime, Utc};
use std::f64::consts::{PI, TAU};

/// Degrees to radians conversion factor
const DTOR: f64 = PI / 180.0;

/// Radians to degrees conversion factor
const RTOD: f64 = 180.0 / PI;

/// WGS84 ellipsoid semi-major axis (equatorial radius) in meters
pub const WGS84_A: f64 = 6378137.0;

/// WGS84 ellipsoid flattening factor
const WGS84_F: f64 = 1.0 / 298.257223563;

/// WGS84 ellipsoid semi-minor axis (polar radius) in meters
const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);

/// WGS84 ellipsoid eccentricity squared
const WGS84_ECC_SQ: f64 = 1.0 - (WGS84_B * WGS84_B) / (WGS84_A * WGS84_A);

/// Julian date of the Unix epoch
const JD_UNIX_EPOCH: f64 = 2_440_587.5;

/// Julian date of J2000.0
const JD_J2000: f64 = 2_451_545.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Julian date of an instant, millisecond resolution
pub fn julian_date(instant: DateTime<Utc>) -> f64 {
    instant.timestamp_millis() as f64 / MILLIS_PER_DAY + JD_UNIX_EPOCH
}

/// Greenwich Mean Sidereal Time in radians, in [0, 2π)
pub fn gmst(instant: DateTime<Utc>) -> f64 {
    let jd = julian_date(instant);
    let ut = (jd + 0.5).fract();
    let jd0 = jd - ut;
    let tu = (jd0 - JD_J2000) / 36525.0;
    let seconds = 24110.54841 + tu * (8640184.812866 + tu * (0.093104 - tu * 6.2e-6));
    let seconds = (seconds + 86400.0 * 1.00273790934 * ut).rem_euclid(86400.0);
    TAU * seconds / 86400.0
}

/// Reduce any longitude into (-180, 180]
pub fn normalize_longitude(lon_deg: f64) -> f64 {
    // In-range values pass through untouched so the reduction is exactly idempotent
    if lon_deg > -180.0 && lon_deg <= 180.0 {
        return lon_deg;
    }
    let reduced = lon_deg.rem_euclid(360.0);
    if reduced > 180.0 {
        reduced - 360.0
    } else {
        reduced
    }
}

/// Rotate an inertial vector into the Earth-fixed frame (same units in, same out)
pub fn eci_to_ecef(x: f64, y: f64, z: f64, gmst_rad: f64) -> (f64, f64, f64) {
    let (s, c) = gmst_rad.sin_cos();
    (c * x + s * y, -s * x + c * y, z)
}

/// Inverse of [`eci_to_ecef`]
pub fn ecef_to_eci(x: f64, y: f64, z: f64, gmst_rad: f64) -> (f64, f64, f64) {
    let (s, c) = gmst_rad.sin_cos();
    (c * x - s * y, s * x + c * y, z)
}

/// WGS84 lat/lon (degrees) and height (meters) to ECEF meters
pub fn llh2ecef(lat: f64, lon: f64, alt: f64) -> (f64, f64, f64) {
    let (slat, clat) = (lat * DTOR).sin_cos();
    let (slon, clon) = (lon * DTOR).sin_cos();

    // Radius of curvature in prime vertical
    let rn = WGS84_A / (1.0 - slat * slat * WGS84_ECC_SQ).sqrt();

    let x = (rn + alt) * clat * clon;
    let y = (rn + alt) * clat * slon;
    let z = (rn * (1.0 - WGS84_ECC_SQ) + alt) * slat;

    (x, y, z)
}

/// ECEF meters to WGS84 (lat°, lon°, height m), Bowring's closed form
pub fn ecef2llh(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let lon = y.atan2(x);

    let p = (x * x + y * y).sqrt();
    let th = (WGS84_A * z).atan2(WGS84_B * p);
    let (sin_th, cos_th) = th.sin_cos();

    let ep_sq = (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);
    let lat = (z + ep_sq * WGS84_B * sin_th.powi(3)).atan2(p - WGS84_ECC_SQ * WGS84_A * cos_th.powi(3));

    let (sin_lat, cos_lat) = lat.sin_cos();
    let n = WGS84_A / (1.0 - WGS84_ECC_SQ * sin_lat * sin_lat).sqrt();
    let alt = if cos_lat.abs() > 1e-10 {
        p / cos_lat - n
    } else {
        // At the poles p / cos(lat) degenerates
        z.abs() - WGS84_B
    };

    (lat * RTOD, lon * RTOD, alt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EPSILON: f64 = 1e-6;

    #[test]
    fn test_julian_date() {
        let date = Utc.with_ymd_and_hms(1995, 10, 1, 9, 0, 0).unwrap();
        assert!((julian_date(date) - 2449991.875).abs() < EPSILON);
    }

    #[test]
    fn test_gmst() {
        let date = Utc.with_ymd_and_hms(1995, 10, 1, 9, 0, 0).unwrap();
        assert!((gmst(date) - 2.524218).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_longitude_range_and_idempotence() {
        let samples = [
            -1080.0, -540.0, -360.0, -270.5, -180.0, -179.999, -90.0, 0.0, 90.0, 180.0,
            180.001, 270.0, 359.9, 360.0, 540.0, 721.25, 1e6, -1e6,
        ];
        for lon in samples {
            let n = normalize_longitude(lon);
            assert!(n > -180.0 && n <= 180.0, "{} -> {}", lon, n);
            assert_eq!(normalize_longitude(n), n, "not idempotent for {}", lon);
        }
        assert_eq!(normalize_longitude(-180.0), 180.0);
        assert_eq!(normalize_longitude(270.0), -90.0);
        assert_eq!(normalize_longitude(540.0), 180.0);
    }

    #[test]
    fn test_llh2ecef_equator() {
        let (x, y, z) = llh2ecef(0.0, 0.0, 0.0);
        assert!((x - WGS84_A).abs() < EPSILON);
        assert!(y.abs() < EPSILON);
        assert!(z.abs() < EPSILON);
    }

    #[test]
    fn test_llh_round_trip() {
        for (lat, lon, alt) in [(51.5, -0.1, 0.0), (-33.9, 151.2, 420_000.0), (89.0, 45.0, 1000.0)] {
            let (x, y, z) = llh2ecef(lat, lon, alt);
            let (lat2, lon2, alt2) = ecef2llh(x, y, z);
            assert!((lat - lat2).abs() < 1e-6);
            assert!((lon - lon2).abs() < 1e-6);
            assert!((alt - alt2).abs() < 1e-2);
        }
    }

    #[test]
    fn test_frame_rotation_round_trip() {
        let g = 1.234;
        let (ex, ey, ez) = eci_to_ecef(7000.0, -1200.0, 300.0, g);
        let (ix, iy, iz) = ecef_to_eci(ex, ey, ez, g);
        assert!((ix - 7000.0).abs() < 1e-9);
        assert!((iy + 1200.0).abs() < 1e-9);
        assert!((iz - 300.0).abs() < 1e-9);
    }
}
