//! Configuration management for the threadkeeper CLI.
//!
//! Loads the TOML config file that selects a conversation manager and its
//! limits.

mod app;
mod types;


pub use app::AppConfig;

pub const THREADKEEPER_CONFIG_PATH: &str = ".threadkeeper/config.toml";
