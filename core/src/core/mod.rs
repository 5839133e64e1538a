//! Core infrastructure: configuration and shared constants

pub mod config;
pub mod constants;
pub mod logging;

pub use config::Config;
