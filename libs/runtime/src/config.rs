//! Server configuration.
//!
//! Sources, lowest precedence first: built-in defaults, the YAML file,
//! `APP__` environment variables (`APP__SERVER__PORT=9000` sets
//! `server.port`), then command-line flags. Module sections stay untyped
//! here; each module deserializes its own through [`AppConfig::module_config`].

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::paths::home_dir::resolve_home_dir;

const HOME_SUBDIR: &str = ".attendance";
const DEFAULT_SQLITE_URL: &str = "sqlite://database/attendance.db";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Absent means documents live in process memory.
    pub database: Option<DatabaseConfig>,
    pub logging: Option<LoggingConfig>,
    /// `modules.<name>` sections, e.g. `api_ingress` and `attendance`.
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Base for relative SQLite and log paths. Absolute after loading.
    pub home_dir: String,
    pub host: String,
    pub port: u16,
    /// Per-request timeout; 0 keeps the ingress default.
    #[serde(default)]
    pub timeout_sec: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            host: "127.0.0.1".to_string(),
            port: 8001,
            timeout_sec: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// `sqlite://relative/or/absolute.db` or `sqlite::memory:`.
    pub url: String,
    pub max_conns: Option<u32>,
    pub busy_timeout_ms: Option<u32>,
}

/// Log sections by target; `default` covers every target without its own.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    /// "trace" through "error", or "off".
    pub console_level: String,
    /// Relative to `server.home_dir`; empty disables the file sink.
    pub file: String,
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

pub fn default_logging_config() -> LoggingConfig {
    HashMap::from([(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/attendance.log".to_string(),
            file_level: "debug".to_string(),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    )])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: Some(DatabaseConfig {
                url: DEFAULT_SQLITE_URL.to_string(),
                max_conns: Some(10),
                busy_timeout_ms: Some(5000),
            }),
            logging: Some(default_logging_config()),
            modules: HashMap::new(),
        }
    }
}

/// Flags that win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub port: Option<u16>,
    /// 1 = debug, 2+ = trace on the console.
    pub verbose: u8,
    /// Replace the configured database with an in-memory SQLite one.
    pub mock: bool,
}

impl AppConfig {
    /// Read `path` (or start from defaults when there is none), apply `args`
    /// and resolve `server.home_dir`, creating it if needed.
    pub fn load(path: Option<&Path>, args: &CliArgs) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let configured = Some(config.server.home_dir.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        let home = resolve_home_dir(configured, HOME_SUBDIR, true)
            .context("Failed to resolve server.home_dir")?;
        config.server.home_dir = home.to_string_lossy().into_owned();

        config.apply_cli_overrides(args);
        Ok(config)
    }

    /// Sections the file leaves out stay absent rather than taking defaults.
    fn from_file(path: &Path) -> Result<Self> {
        let base = AppConfig {
            database: None,
            logging: None,
            ..AppConfig::default()
        };
        Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("APP__").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        let level = match args.verbose {
            0 => return,
            1 => "debug",
            _ => "trace",
        };
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default) = logging.get_mut("default") {
            default.console_level = level.to_string();
        }
    }

    /// `modules.<name>` as `T`. A missing section is `T::default()`.
    pub fn module_config<T>(&self, name: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        self.modules
            .get(name)
            .map_or_else(
                || Ok(T::default()),
                |raw| serde_json::from_value(raw.clone()),
            )
            .with_context(|| format!("invalid {name} config"))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }
}
