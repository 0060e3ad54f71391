///! Orbit sampler: element set + instant -> geodetic position
///!
///! The propagation routine is injected through [`Propagator`]; the default is
///! SGP4 from the `sgp4` crate.
use super::geodesy::{ecef2llh, eci_to_ecef, gmst, normalize_longitude};
use chrono::{DateTime, Utc};
use orbit_common::{CatalogId, ElementSet, EciPosition, GeodeticPosition};
use std::sync::Arc;
use thiserror::Error;

/// Why one object could not be placed at one instant.
///
/// Non-fatal: the caller drops the object from this frame and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropagationFailure {
    #[error("invalid element set: {0}")]
    InvalidElements(String),

    #[error("propagator error: {0}")]
    Propagator(String),

    #[error("propagator returned no position")]
    MissingPosition,

    #[error("propagator returned non-finite coordinates")]
    NonFinite,

    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("no element set for object {0}")]
    UnknownObject(CatalogId),
}

pub type SampleResult = Result<GeodeticPosition, PropagationFailure>;

/// External propagation primitive: element lines and a time in, inertial position out.
///
/// `Ok(None)` means the routine ran but produced no position.
pub trait Propagator: Send + Sync {
    fn propagate(&self, set: &ElementSet, instant: DateTime<Utc>) -> Result<Option<EciPosition>, PropagationFailure>;
}

/// SGP4/SDP4 via the `sgp4` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct Sgp4Propagator;

impl Propagator for Sgp4Propagator {
    fn propagate(&self, set: &ElementSet, instant: DateTime<Utc>) -> Result<Option<EciPosition>, PropagationFailure> {
        let elements = sgp4::Elements::from_tle(
            Some(set.display_name.clone()),
            set.line1.as_bytes(),
            set.line2.as_bytes(),
        )
        .map_err(|e| PropagationFailure::InvalidElements(format!("{:?}", e)))?;

        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| PropagationFailure::InvalidElements(format!("{:?}", e)))?;

        let epoch_ms = elements.datetime.and_utc().timestamp_millis();
        let minutes = (instant.timestamp_millis() - epoch_ms) as f64 / 60_000.0;

        let prediction = constants
            .propagate(sgp4::MinutesSinceEpoch(minutes))
            .map_err(|e| PropagationFailure::Propagator(format!("{:?}", e)))?;

        let [x, y, z] = prediction.position;
        Ok(Some(EciPosition::new(x, y, z)))
    }
}

/// Convert an inertial position (km) at `instant` into a range-checked geodetic position.
///
/// Latitude outside [-90, 90] is a propagation anomaly and is rejected, never clamped.
pub fn eci_to_geodetic(position: &EciPosition, instant: DateTime<Utc>) -> SampleResult {
    if !position.is_finite() {
        return Err(PropagationFailure::NonFinite);
    }

    let (x, y, z) = eci_to_ecef(position.x_km, position.y_km, position.z_km, gmst(instant));
    let (lat, lon, alt) = ecef2llh(x * 1000.0, y * 1000.0, z * 1000.0);

    if !(lat.is_finite() && lon.is_finite() && alt.is_finite()) {
        return Err(PropagationFailure::NonFinite);
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(PropagationFailure::LatitudeOutOfRange(lat));
    }

    Ok(GeodeticPosition {
        latitude_deg: lat,
        longitude_deg: normalize_longitude(lon),
        altitude_meters: alt,
    })
}

/// Result of sampling many objects at one instant
#[derive(Debug, Clone, Default)]
pub struct BatchSample {
    pub positions: Vec<(CatalogId, GeodeticPosition)>,
    pub failures: Vec<(CatalogId, PropagationFailure)>,
}

/// Stateless sampler around an injected propagator
#[derive(Clone)]
pub struct OrbitSampler {
    propagator: Arc<dyn Propagator>,
}

impl Default for OrbitSampler {
    fn default() -> Self {
        Self::new(Arc::new(Sgp4Propagator))
    }
}

impl OrbitSampler {
    pub fn new(propagator: Arc<dyn Propagator>) -> Self {
        Self { propagator }
    }

    /// Inertial position, with "no position" and non-finite output mapped to failures
    pub fn propagate_eci(&self, set: &ElementSet, instant: DateTime<Utc>) -> Result<EciPosition, PropagationFailure> {
        let position = self
            .propagator
            .propagate(set, instant)?
            .ok_or(PropagationFailure::MissingPosition)?;
        if !position.is_finite() {
            return Err(PropagationFailure::NonFinite);
        }
        Ok(position)
    }

    pub fn sample(&self, set: &ElementSet, instant: DateTime<Utc>) -> SampleResult {
        let position = self.propagate_eci(set, instant)?;
        eci_to_geodetic(&position, instant)
    }

    /// Sample every set at one instant; failures are collected, never propagated
    pub fn sample_batch<'a, I>(&self, sets: I, instant: DateTime<Utc>) -> BatchSample
    where
        I: IntoIterator<Item = &'a ElementSet>,
    {
        let mut batch = BatchSample::default();
        for set in sets {
            match self.sample(set, instant) {
                Ok(position) => batch.positions.push((set.catalog_id, position)),
                Err(e) => batch.failures.push((set.catalog_id, e)),
            }
        }
        if !batch.failures.is_empty() {
            tracing::debug!(
                "{} of {} objects failed to propagate at {}",
                batch.failures.len(),
                batch.failures.len() + batch.positions.len(),
                instant
            );
        }
        batch
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub const ISS_LINE1: &str = "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992";
    pub const ISS_LINE2: &str = "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008";

    pub fn iss() -> ElementSet {
        ElementSet::new(25544, "ISS (ZARYA)", ISS_LINE1, ISS_LINE2)
    }

    /// Returns a fixed inertial position for every object except the listed failures
    pub struct FixedPropagator {
        pub position: Option<EciPosition>,
        pub failing: Vec<CatalogId>,
    }

    impl Propagator for FixedPropagator {
        fn propagate(&self, set: &ElementSet, _instant: DateTime<Utc>) -> Result<Option<EciPosition>, PropagationFailure> {
            if self.failing.contains(&set.catalog_id) {
                return Err(PropagationFailure::Propagator("error code 1".to_string()));
            }
            Ok(self.position)
        }
    }
}
