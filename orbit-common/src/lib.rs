//! Shared data model for the orbit tracker: element sets, sampled positions,
//! observers and the small enums both render surfaces agree on.

pub mod types;

pub use types::*;
