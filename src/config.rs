// Runtime settings shared by the CLI and the API server
// Loaded from an optional TOML file, then overridden by command-line flags

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_PATH: &str = "chit_fund.db";
pub const DEFAULT_BIND: &str = "0.0.0.0:8001";
pub const DEFAULT_BUSINESS_NAME: &str = "KA Associates";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Address the API server binds to
    pub bind_address: String,

    /// Allowed CORS origins ("*" = permissive)
    pub cors_origins: Vec<String>,

    /// Signature line used in reminder messages
    pub business_name: String,

    /// tracing-subscriber filter directive, overridden by RUST_LOG
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            bind_address: DEFAULT_BIND.to_string(),
            cors_origins: vec!["*".to_string()],
            business_name: DEFAULT_BUSINESS_NAME.to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    /// Load from `path` when given, otherwise start from defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

/// Install the global tracing subscriber. RUST_LOG wins over the configured filter.
pub fn init_logging(filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
