use super::geodesy::{ecef_to_eci, eci_to_ecef, gmst, llh2ecef};
use chrono::{DateTime, Utc};
use orbit_common::{EciPosition, Observer};
use std::f64::consts::PI;
use thiserror::Error;

const DTOR: f64 = PI / 180.0;
const RTOD: f64 = 180.0 / PI;

/// Below this slant range (meters) the look direction is undefined
const MIN_RANGE_M: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VisibilityIndeterminate {
    #[error("non-finite geometry")]
    NonFinite,

    #[error("object coincides with the observer")]
    ZeroRange,
}

/// Local east/north/up unit vectors at the observer, in ECEF
fn enu_basis(observer: &Observer) -> ([f64; 3], [f64; 3], [f64; 3]) {
    let (slat, clat) = (observer.latitude_deg * DTOR).sin_cos();
    let (slon, clon) = (observer.longitude_deg * DTOR).sin_cos();

    let east = [-slon, clon, 0.0];
    let north = [-slat * clon, -slat * slon, clat];
    let up = [clat * clon, clat * slon, slat];
    (east, north, up)
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Elevation of an inertial position (km) above the observer's local horizon, in degrees.
///
/// The observer sits on the ellipsoid surface (height 0).
pub fn elevation_deg(
    observer: &Observer,
    position: &EciPosition,
    instant: DateTime<Utc>,
) -> Result<f64, VisibilityIndeterminate> {
    let (sx, sy, sz) = eci_to_ecef(position.x_km, position.y_km, position.z_km, gmst(instant));
    let (ox, oy, oz) = llh2ecef(observer.latitude_deg, observer.longitude_deg, 0.0);

    let rho = [sx * 1000.0 - ox, sy * 1000.0 - oy, sz * 1000.0 - oz];
    let range = dot(rho, rho).sqrt();
    if !range.is_finite() {
        return Err(VisibilityIndeterminate::NonFinite);
    }
    if range < MIN_RANGE_M {
        return Err(VisibilityIndeterminate::ZeroRange);
    }

    let (_, _, up) = enu_basis(observer);
    let sin_el = (dot(rho, up) / range).clamp(-1.0, 1.0);
    let elevation = sin_el.asin() * RTOD;
    if !elevation.is_finite() {
        return Err(VisibilityIndeterminate::NonFinite);
    }
    Ok(elevation)
}

/// Overhead means strictly positive elevation; indeterminate geometry counts as not visible
pub fn is_overhead(observer: &Observer, position: &EciPosition, instant: DateTime<Utc>) -> bool {
    match elevation_deg(observer, position, instant) {
        Ok(elevation) => elevation > 0.0,
        Err(e) => {
            tracing::debug!("Visibility indeterminate, treating as below horizon: {}", e);
            false
        }
    }
}

/// Inertial position (km) seen from `observer` at the given azimuth, elevation and slant range.
///
/// Inverse of [`elevation_deg`] for the elevation component.
pub fn position_from_look_angles(
    observer: &Observer,
    azimuth_deg: f64,
    elevation_deg: f64,
    range_km: f64,
    instant: DateTime<Utc>,
) -> EciPosition {
    let (east, north, up) = enu_basis(observer);
    let (saz, caz) = (azimuth_deg * DTOR).sin_cos();
    let (sel, cel) = (elevation_deg * DTOR).sin_cos();
    let range_m = range_km * 1000.0;

    let (e, n, u) = (range_m * cel * saz, range_m * cel * caz, range_m * sel);
    let (ox, oy, oz) = llh2ecef(observer.latitude_deg, observer.longitude_deg, 0.0);
    let x = ox + e * east[0] + n * north[0] + u * up[0];
    let y = oy + e * east[1] + n * north[1] + u * up[1];
    let z = oz + e * east[2] + n * north[2] + u * up[2];

    let (ix, iy, iz) = ecef_to_eci(x / 1000.0, y / 1000.0, z / 1000.0, gmst(instant));
    EciPosition::new(ix, iy, iz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn london() -> Observer {
        Observer::new(51.5, -0.1).with_label("London")
    }

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_look_angles_round_trip() {
        for (az, el) in [(0.0, 45.0), (135.0, 5.0), (270.0, -3.0), (10.0, 89.0)] {
            let position = position_from_look_angles(&london(), az, el, 1200.0, instant());
            let elevation = elevation_deg(&london(), &position, instant()).unwrap();
            assert!((elevation - el).abs() < 1e-6, "az {} el {} -> {}", az, el, elevation);
        }
    }

    #[test]
    fn test_overhead_threshold() {
        let below = position_from_look_angles(&london(), 200.0, -3.0, 2000.0, instant());
        let above = position_from_look_angles(&london(), 200.0, 5.0, 2000.0, instant());
        assert!(!is_overhead(&london(), &below, instant()));
        assert!(is_overhead(&london(), &above, instant()));
    }

    #[test]
    fn test_far_side_of_earth_is_not_overhead() {
        let (x, y, z) = llh2ecef(-51.5, 179.9, 550_000.0);
        let (ix, iy, iz) = ecef_to_eci(x / 1000.0, y / 1000.0, z / 1000.0, gmst(instant()));
        let position = EciPosition::new(ix, iy, iz);
        assert!(elevation_deg(&london(), &position, instant()).unwrap() < -45.0);
    }

    #[test]
    fn test_degenerate_geometry_is_not_visible() {
        let at_observer = position_from_look_angles(&london(), 0.0, 90.0, 0.0, instant());
        assert_eq!(
            elevation_deg(&london(), &at_observer, instant()),
            Err(VisibilityIndeterminate::ZeroRange)
        );
        assert!(!is_overhead(&london(), &at_observer, instant()));

        let nan = EciPosition::new(f64::NAN, 0.0, 0.0);
        assert_eq!(
            elevation_deg(&london(), &nan, instant()),
            Err(VisibilityIndeterminate::NonFinite)
        );
    }
}
