//! Configuration file loading with precedence handling.

use crate::model::PermissionMode;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CLAUDE_CODE_CLI_CONFIG";
/// Environment variable overriding the model.
pub const MODEL_ENV: &str = "CLAUDE_CODE_CLI_MODEL";
/// Environment variable overriding the `claude` executable.
pub const CLAUDE_PATH_ENV: &str = "CLAUDE_CODE_CLI_CLAUDE_PATH";

/// Executable spawned when nothing else is configured.
pub const DEFAULT_CLAUDE_PATH: &str = "claude";

/// Errors that can occur during config loading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config path exists but is not a file.
    #[error("Invalid config path: {0}")]
    InvalidPath(String),

    /// Failed to read config file (file may not exist or have permission issues).
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError {
        /// Path that failed to read.
        path: PathBuf,
        /// Reason for failure.
        reason: String,
    },

    /// Config file contains invalid TOML syntax.
    #[error("Invalid TOML in {path}: {reason}")]
    ParseError {
        /// Path with invalid TOML.
        path: PathBuf,
        /// Parse error details.
        reason: String,
    },

    /// A field parsed but holds an unusable value.
    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue {
        /// Field name as written in the file.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

/// TOML configuration file structure.
///
/// All fields are optional - if not specified, hardcoded defaults are used.
/// Corresponds to `~/.config/claude-code-cli/config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Default model for `query` and `demo-tools`.
    #[serde(default)]
    pub model: Option<String>,

    /// Default permission mode for `query`.
    #[serde(default)]
    pub permission_mode: Option<String>,

    /// Default turn limit for `query`.
    #[serde(default)]
    pub max_turns: Option<u32>,

    /// Path or name of the `claude` executable.
    #[serde(default)]
    pub claude_path: Option<PathBuf>,

    /// Write logs to this file instead of stderr.
    #[serde(default)]
    pub log_file_path: Option<PathBuf>,

    /// OTLP logs endpoint, used when `BRAINTRUST_OTLP_ENDPOINT` is unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

/// Resolved configuration after applying precedence rules.
///
/// Created by merging defaults, config file, env vars, and CLI args.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Model override.
    pub model: Option<String>,
    /// Permission mode.
    pub permission_mode: Option<PermissionMode>,
    /// Turn limit.
    pub max_turns: Option<u32>,
    /// Executable to spawn.
    pub claude_path: PathBuf,
    /// Log file; `None` logs to stderr.
    pub log_file_path: Option<PathBuf>,
    /// OTLP endpoint fallback.
    pub otlp_endpoint: Option<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            model: None,
            permission_mode: None,
            max_turns: None,
            claude_path: PathBuf::from(DEFAULT_CLAUDE_PATH),
            log_file_path: None,
            otlp_endpoint: None,
        }
    }
}

/// Flags that override the resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    /// `--model`.
    pub model: Option<String>,
    /// `--permission-mode`.
    pub permission_mode: Option<PermissionMode>,
    /// `--max-turns`.
    pub max_turns: Option<u32>,
}

/// Load configuration file from a specific path.
///
/// Returns `Ok(None)` if file doesn't exist (not an error - use defaults).
/// Returns `Err` if file exists but cannot be read or parsed.
///
/// # Errors
///
/// Returns error if the path is a directory or the file has read or parse
/// errors.
pub fn load_config_file(path: impl Into<PathBuf>) -> Result<Option<ConfigFile>, ConfigError> {
    let path = path.into();

    // Missing file is not an error - use defaults
    if !path.exists() {
        return Ok(None);
    }
    if path.is_dir() {
        return Err(ConfigError::InvalidPath(path.display().to_string()));
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let config: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    Ok(Some(config))
}

/// Resolve default config file path.
///
/// Returns `~/.config/claude-code-cli/config.toml` on Unix, appropriate path
/// on other platforms. Returns `None` if home directory cannot be determined.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("claude-code-cli").join("config.toml"))
}

/// Load configuration with precedence handling.
///
/// Precedence (highest to lowest):
/// 1. Explicit `config_path` argument (CLI `--config`)
/// 2. `CLAUDE_CODE_CLI_CONFIG` environment variable
/// 3. Default path `~/.config/claude-code-cli/config.toml`
///
/// Missing config files are NOT errors - defaults are used.
///
/// # Errors
///
/// Returns error only if a config file exists but cannot be read or parsed.
pub fn load_config_with_precedence(config_path: Option<PathBuf>) -> Result<Option<ConfigFile>, ConfigError> {
    if let Some(path) = config_path {
        return load_config_file(path);
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return load_config_file(PathBuf::from(env_path));
    }

    if let Some(default_path) = default_config_path() {
        return load_config_file(default_path);
    }

    Ok(None)
}

/// Merge config file into defaults to create resolved config.
///
/// # Errors
///
/// Returns `InvalidValue` if `permission_mode` is not a known mode.
pub fn merge_config(config_file: Option<ConfigFile>) -> Result<ResolvedConfig, ConfigError> {
    let defaults = ResolvedConfig::default();

    let Some(config) = config_file else {
        return Ok(defaults);
    };

    let permission_mode = config
        .permission_mode
        .map(|raw| {
            raw.parse::<PermissionMode>()
                .map_err(|_| ConfigError::InvalidValue {
                    field: "permission_mode",
                    value: raw,
                })
        })
        .transpose()?;

    Ok(ResolvedConfig {
        model: config.model.or(defaults.model),
        permission_mode: permission_mode.or(defaults.permission_mode),
        max_turns: config.max_turns.or(defaults.max_turns),
        claude_path: config.claude_path.unwrap_or(defaults.claude_path),
        log_file_path: config.log_file_path.or(defaults.log_file_path),
        otlp_endpoint: config.otlp_endpoint.or(defaults.otlp_endpoint),
    })
}

/// Apply environment variable overrides to resolved config.
///
/// Checks for:
/// - `CLAUDE_CODE_CLI_MODEL`: Override model
/// - `CLAUDE_CODE_CLI_CLAUDE_PATH`: Override the executable
pub fn apply_env_overrides(mut config: ResolvedConfig) -> ResolvedConfig {
    if let Ok(model) = std::env::var(MODEL_ENV) {
        config.model = Some(model);
    }

    if let Ok(path) = std::env::var(CLAUDE_PATH_ENV) {
        config.claude_path = PathBuf::from(path);
    }

    config
}

/// Apply CLI argument overrides to resolved config.
///
/// Precedence chain: Defaults → Config File → Env Vars → CLI Args (highest)
pub fn apply_cli_overrides(mut config: ResolvedConfig, overrides: CliOverrides) -> ResolvedConfig {
    if let Some(model) = overrides.model {
        config.model = Some(model);
    }

    if let Some(mode) = overrides.permission_mode {
        config.permission_mode = Some(mode);
    }

    if let Some(max_turns) = overrides.max_turns {
        config.max_turns = Some(max_turns);
    }

    config
}

/// Run the whole precedence chain.
///
/// # Errors
///
/// Propagates file and value errors from loading and merging.
pub fn resolve(config_path: Option<PathBuf>, overrides: CliOverrides) -> Result<ResolvedConfig, ConfigError> {
    let file = load_config_with_precedence(config_path)?;
    let merged = merge_config(file)?;
    Ok(apply_cli_overrides(apply_env_overrides(merged), overrides))
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
