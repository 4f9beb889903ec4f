//! Configuration loading
//!
//! Each setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The TOML file is taken from `--config` when given, otherwise from
//! `$XDG_CONFIG_HOME/engage/<service>.toml`, otherwise from
//! `/etc/engage/<service>.toml`. A missing file is not an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_DATABASE_PATH: &str = "ENGAGE_DATABASE_PATH";
pub const ENV_BIND_ADDRESS: &str = "ENGAGE_BIND_ADDRESS";
pub const ENV_MAX_FILE_SIZE: &str = "ENGAGE_MAX_FILE_SIZE";
pub const ENV_MAX_ROWS_PER_FILE: &str = "ENGAGE_MAX_ROWS_PER_FILE";
pub const ENV_ALLOWED_EXTENSIONS: &str = "ENGAGE_ALLOWED_EXTENSIONS";
pub const ENV_LOG_LEVEL: &str = "ENGAGE_LOG_LEVEL";

/// Contents of a service TOML file
///
/// Every section and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub ingest: IngestConfig,
    pub projections: ProjectionConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Limits and formats applied while ingesting one file
/// Smallest notes cap that still leaves room for a truncated line
pub const MIN_NOTES_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Maximum accepted upload size in bytes
    pub max_file_size: u64,
    /// Maximum number of non-blank data rows per file
    pub max_rows_per_file: usize,
    /// Accepted rows written per storage transaction
    pub batch_size: usize,
    /// Maximum length of the stored validation notes
    pub max_notes_len: usize,
    /// chrono format string for dates supplied as text
    pub date_format: String,
    /// Lowercase file extensions without the leading dot
    pub allowed_extensions: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            max_rows_per_file: 10_000,
            batch_size: 100,
            max_notes_len: 4000,
            date_format: "%Y-%m-%d".to_string(),
            allowed_extensions: ["xlsx", "xls", "csv", "tsv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl IngestConfig {
    /// Normalize extensions and reject limits the pipeline cannot run with
    pub fn validated(mut self) -> Result<Self> {
        if self.max_file_size == 0 {
            return Err(Error::Config("ingest.max_file_size must be positive".to_string()));
        }
        if self.max_rows_per_file == 0 {
            return Err(Error::Config("ingest.max_rows_per_file must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("ingest.batch_size must be positive".to_string()));
        }
        if self.max_notes_len < MIN_NOTES_LEN {
            return Err(Error::Config(format!(
                "ingest.max_notes_len must be at least {}",
                MIN_NOTES_LEN
            )));
        }
        if self.date_format.trim().is_empty() {
            return Err(Error::Config("ingest.date_format must not be empty".to_string()));
        }

        self.allowed_extensions = normalize_extensions(self.allowed_extensions.iter().map(String::as_str));
        if self.allowed_extensions.is_empty() {
            return Err(Error::Config("ingest.allowed_extensions must not be empty".to_string()));
        }

        Ok(self)
    }

    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        self.allowed_extensions.iter().any(|e| *e == extension)
    }
}

fn normalize_extensions<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let ext = value.trim().trim_start_matches('.').to_ascii_lowercase();
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectionConfig {
    /// Run a projection refresh every N seconds (disabled when absent)
    pub refresh_interval_secs: Option<u64>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub bind: Option<String>,
}

/// Fully resolved settings for one service process
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub database_path: PathBuf,
    pub log_level: String,
    pub ingest: IngestConfig,
    pub projections: ProjectionConfig,
    /// TOML file the settings were read from, if any
    pub config_file: Option<PathBuf>,
}

impl ServiceConfig {
    /// Resolve settings from CLI, environment, TOML file and defaults
    pub fn resolve(service: &str, default_bind: &str, cli: &CliOverrides) -> Result<Self> {
        let config_file = match &cli.config {
            Some(path) => Some(path.clone()),
            None => default_config_path(service),
        };

        let toml_config = match &config_file {
            Some(path) => load_toml_config(path)?,
            None => {
                warn!("No config file found for {}, using defaults", service);
                TomlConfig::default()
            }
        };

        Self::from_sources(
            toml_config,
            config_file,
            default_bind,
            cli,
            |name| std::env::var(name).ok(),
        )
    }

    /// Combine already-loaded sources; `env` looks up environment variables
    pub fn from_sources<F>(
        toml_config: TomlConfig,
        config_file: Option<PathBuf>,
        default_bind: &str,
        cli: &CliOverrides,
        env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let TomlConfig {
            server,
            logging,
            mut ingest,
            projections,
        } = toml_config;

        let bind_address = cli
            .bind
            .clone()
            .or_else(|| env(ENV_BIND_ADDRESS))
            .or(server.bind_address)
            .unwrap_or_else(|| default_bind.to_string());

        let database_path = cli
            .database
            .clone()
            .or_else(|| env(ENV_DATABASE_PATH).map(PathBuf::from))
            .or(server.database_path)
            .unwrap_or_else(default_database_path);

        let log_level = env(ENV_LOG_LEVEL).unwrap_or(logging.level);

        if let Some(value) = env(ENV_MAX_FILE_SIZE) {
            ingest.max_file_size = parse_env(ENV_MAX_FILE_SIZE, &value)?;
        }
        if let Some(value) = env(ENV_MAX_ROWS_PER_FILE) {
            ingest.max_rows_per_file = parse_env(ENV_MAX_ROWS_PER_FILE, &value)?;
        }
        if let Some(value) = env(ENV_ALLOWED_EXTENSIONS) {
            ingest.allowed_extensions = normalize_extensions(value.split(','));
        }

        Ok(Self {
            bind_address,
            database_path,
            log_level,
            ingest: ingest.validated()?,
            projections,
            config_file,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| Error::Config(format!("{} is not a valid number: {:?}", name, value)))
}

/// Read and parse a TOML config file
///
/// A missing file yields defaults; an unreadable or malformed one is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found: {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// First existing config file for `service`
fn default_config_path(service: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", service);

    let user_config = dirs::config_dir().map(|d| d.join("engage").join(&file_name));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/engage").join(&file_name);
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    if cfg!(target_os = "macos") {
        // ~/Library/Application Support/engage
        dirs::data_dir()
            .map(|d| d.join("engage").join("engage.db"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/engage/engage.db"))
    } else {
        // ~/.local/share/engage (or /var/lib/engage for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("engage").join("engage.db"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/engage/engage.db"))
    }
}
