pub mod filter;
pub mod geocode;
pub mod orbit;
pub mod playback;
pub mod store;
pub mod tracker;
