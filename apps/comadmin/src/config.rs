//! # Configuration
//!
//! Settings are layered, highest precedence first:
//! 1. Command-line flags
//! 2. Environment: `COMADMIN_CONFIG`, `COMADMIN_LOG_FORMAT`
//! 3. The TOML config file named by `--config` or `COMADMIN_CONFIG`
//! 4. Defaults: 64-bit view, system registry, text logs
//!
//! ```toml
//! [registry]
//! view = "64"              # "32" | "64"
//! snapshot = "fixture.txt" # relative to the config file
//!
//! [logging]
//! format = "text"          # "text" | "json"
//! ```

use crate::cli::Cli;
use comadmin_core::{ComAdminError, RegistryView};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming the config file.
pub const ENV_CONFIG_PATH: &str = "COMADMIN_CONFIG";

/// Environment variable selecting the log format.
pub const ENV_LOG_FORMAT: &str = "COMADMIN_LOG_FORMAT";

// =============================================================================
// LOG FORMAT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ComAdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ComAdminError::Config(format!(
                "Unknown log format '{}' (expected 'text' or 'json')",
                other
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

// =============================================================================
// CONFIG FILE
// =============================================================================

/// `[registry]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub view: Option<String>,
    pub snapshot: Option<PathBuf>,
}

/// `[logging]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub format: Option<LogFormat>,
}

/// The TOML config file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

impl FileConfig {
    /// Parse configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self, ComAdminError> {
        toml::from_str(contents)
            .map_err(|e| ComAdminError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration from a file.
    ///
    /// A relative `snapshot` path is resolved against the file's directory.
    pub fn load_from_path(path: &Path) -> Result<Self, ComAdminError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ComAdminError::Config(format!(
                "Failed to read config at '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::parse(&contents)?;
        let dir = path.parent().unwrap_or(Path::new(""));
        config.registry.snapshot = config.registry.snapshot.map(|snapshot| {
            if snapshot.is_relative() {
                dir.join(snapshot)
            } else {
                snapshot
            }
        });
        Ok(config)
    }
}

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// The environment variables that feed configuration.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub config_path: Option<PathBuf>,
    pub log_format: Option<String>,
}

impl Environment {
    /// Read from the process environment. Empty values count as unset.
    #[must_use]
    pub fn from_process() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            config_path: var(ENV_CONFIG_PATH).map(PathBuf::from),
            log_format: var(ENV_LOG_FORMAT),
        }
    }
}

// =============================================================================
// RESOLVED SETTINGS
// =============================================================================

/// Effective settings after layering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub view: RegistryView,
    /// Seed an in-memory store from this snapshot instead of using the
    /// system registry.
    pub snapshot: Option<PathBuf>,
    pub log_format: LogFormat,
    pub json_mode: bool,
    pub quiet: bool,
    pub verbose: bool,
}

impl Settings {
    /// Layer command-line flags over the environment over the config file.
    ///
    /// A config file that was asked for, by flag or environment, must exist.
    pub fn resolve(cli: &Cli, env: &Environment) -> Result<Self, ComAdminError> {
        let config_path = cli.config.as_ref().or(env.config_path.as_ref());
        let file = match config_path {
            Some(path) => FileConfig::load_from_path(path)?,
            None => FileConfig::default(),
        };

        let view = match (cli.view, file.registry.view.as_deref()) {
            (Some(view), _) => view,
            (None, Some(view)) => view.parse()?,
            (None, None) => RegistryView::default(),
        };

        let log_format = match env.log_format.as_deref() {
            Some(format) => format.parse()?,
            None => file.logging.format.unwrap_or_default(),
        };

        Ok(Self {
            view,
            snapshot: cli.snapshot.clone().or(file.registry.snapshot),
            log_format,
            json_mode: cli.json_mode,
            quiet: cli.quiet,
            verbose: cli.verbose,
        })
    }

    /// Default `EnvFilter` directives when `RUST_LOG` is unset.
    #[must_use]
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "comadmin=debug,comadmin_core=debug"
        } else {
            "comadmin=warn,comadmin_core=warn"
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
