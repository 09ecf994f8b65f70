//! Configuration for the strata tool: RON-persisted settings, command-line
//! overrides, and platform directory resolution.

mod cli;
mod config;
mod error;
mod paths;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, LightingConfig, StorageConfig, WorldConfig};
pub use error::ConfigError;
pub use paths::{DirsError, StrataDirs};
