//! CLI command implementations

pub mod config;
pub mod flush;
pub mod start;
pub mod status;
pub mod stop;
