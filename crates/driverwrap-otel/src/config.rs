//! Instrumentation configuration: defaults, environment and TOML file loading

use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::{Error, Result};

/// Database system reported as `db.system.name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DbSystem {
    #[default]
    Postgresql,
    Sqlite,
}

impl DbSystem {
    /// Semantic-convention value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgresql => "postgresql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for DbSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts driver names as well as semantic-convention names.
impl FromStr for DbSystem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgresql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(Error::Config(format!("unknown database system: {other}"))),
        }
    }
}

/// Settings shared by every hook an [`Instrumentation`](crate::Instrumentation)
/// builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentationConfig {
    pub system: DbSystem,
    /// Value of `db.client.connection.pool.name`.
    pub pool_name: String,
    /// Reported as `db.client.connection.idle.max`.
    pub idle_max: u32,
    /// Attach `db.query.text` to operation metrics and spans.
    pub record_query_text: bool,
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            system: DbSystem::default(),
            pool_name: "default".to_string(),
            idle_max: 2,
            record_query_text: true,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl InstrumentationConfig {
    #[must_use]
    pub fn new(system: DbSystem, pool_name: impl Into<String>) -> Self {
        Self {
            system,
            pool_name: pool_name.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        load_from_env(Self::default())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse configuration: {e}")))?;
        apply_file_config(Self::default(), file)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    #[must_use]
    pub const fn with_system(mut self, system: DbSystem) -> Self {
        self.system = system;
        self
    }

    #[must_use]
    pub fn with_pool_name(mut self, pool_name: impl Into<String>) -> Self {
        self.pool_name = pool_name.into();
        self
    }

    #[must_use]
    pub const fn with_idle_max(mut self, idle_max: u32) -> Self {
        self.idle_max = idle_max;
        self
    }

    #[must_use]
    pub const fn with_record_query_text(mut self, enabled: bool) -> Self {
        self.record_query_text = enabled;
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    #[must_use]
    pub const fn with_json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Environment
// ═══════════════════════════════════════════════════════════════════════════

/// Environment variable names
mod vars {
    pub const DB_SYSTEM: &str = "DRIVERWRAP_DB_SYSTEM";
    pub const POOL_NAME: &str = "DRIVERWRAP_POOL_NAME";
    pub const IDLE_MAX: &str = "DRIVERWRAP_IDLE_MAX";
    pub const RECORD_QUERY_TEXT: &str = "DRIVERWRAP_RECORD_QUERY_TEXT";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const JSON_LOGS: &str = "DRIVERWRAP_JSON_LOGS";
}

/// Load configuration from environment variables on top of `config`.
pub fn load_from_env(mut config: InstrumentationConfig) -> Result<InstrumentationConfig> {
    if let Ok(system) = env::var(vars::DB_SYSTEM) {
        config.system = system
            .parse()
            .map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("Invalid {}: {msg}", vars::DB_SYSTEM)),
                other => other,
            })?;
    }

    if let Ok(name) = env::var(vars::POOL_NAME) {
        config.pool_name = name;
    }

    if let Ok(idle_str) = env::var(vars::IDLE_MAX)
        && let Ok(idle_max) = idle_str.parse::<u32>()
    {
        config.idle_max = idle_max;
    }

    if let Ok(val) = env::var(vars::RECORD_QUERY_TEXT) {
        config.record_query_text = parse_bool(&val);
    }

    if let Ok(level) = env::var(vars::RUST_LOG) {
        config.log_level = level;
    }

    if let Ok(val) = env::var(vars::JSON_LOGS) {
        config.json_logs = parse_bool(&val);
    }

    Ok(config)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

// ═══════════════════════════════════════════════════════════════════════════
// TOML file
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database: Option<DatabaseSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Deserialize)]
struct DatabaseSection {
    system: Option<String>,
    pool_name: Option<String>,
    idle_max: Option<u32>,
    record_query_text: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    json: Option<bool>,
}

fn apply_file_config(
    mut config: InstrumentationConfig,
    file: FileConfig,
) -> Result<InstrumentationConfig> {
    if let Some(db) = file.database {
        if let Some(system) = db.system {
            config.system = system.parse()?;
        }
        if let Some(name) = db.pool_name {
            config.pool_name = name;
        }
        if let Some(idle_max) = db.idle_max {
            config.idle_max = idle_max;
        }
        if let Some(enabled) = db.record_query_text {
            config.record_query_text = enabled;
        }
    }

    if let Some(logging) = file.logging {
        if let Some(level) = logging.level {
            config.log_level = level;
        }
        if let Some(json) = logging.json {
            config.json_logs = json;
        }
    }

    Ok(config)
}
