pub mod geodesy;
pub mod sampler;
pub mod visibility;

pub use geodesy::normalize_longitude;
pub use sampler::{
    eci_to_geodetic, BatchSample, OrbitSampler, PropagationFailure, Propagator, SampleResult, Sgp4Propagator,
};
pub use visibility::{elevation_deg, is_overhead, position_from_look_angles, VisibilityIndeterminate};
