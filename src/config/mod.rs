//! Configuration module.
//!
//! Settings come from an optional TOML file, environment variables and CLI
//! flags, in increasing order of precedence.

pub mod loader;

pub use loader::{resolve, CliOverrides, ConfigError, ConfigFile, ResolvedConfig};
