//! Configuration module.
//!
//! This module handles:
//! - The API client and tracking settings
//! - Loading them from `~/.ecectl/config.yaml`, `.env` and the environment

mod parser;
mod settings;

pub use parser::{apply_env_overrides, default_config_path, ConfigParser, CONFIG_DIR, CONFIG_FILE};
pub use settings::{
    ClientConfig, TrackConfig, TrackSettings, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_TIMEOUT_SECS,
};
