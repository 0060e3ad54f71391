///! Constellation filtering and catalog search

mod constellation;
pub use constellation::{
    detect_constellation, find_preset, matches, normalize_name, preset_filter,
    ConstellationPreset, CONSTELLATION_PRESETS,
};

mod search;
pub use search::{search_catalog, DEFAULT_THRESHOLD};
