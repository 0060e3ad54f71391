pub mod config;
pub mod logging;
pub mod model;
pub mod module;
