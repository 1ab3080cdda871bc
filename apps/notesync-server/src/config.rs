use anyhow::{Context, Result};
use jsonschema::{validator_for, Validator};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "configs/default.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Interface address to listen on.
    pub bind: String,
    #[schemars(range(min = 1, max = 65535))]
    pub port: u16,
    /// Maximum accepted request body, in KiB.
    #[schemars(range(min = 1, max = 65536))]
    pub body_limit_kb: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8091,
            body_limit_kb: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding `notesync.sqlite`.
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("state"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct ServerConfig {
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    /// File the config was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

static CONFIG_SCHEMA: Lazy<Validator> = Lazy::new(|| {
    let schema = schemars::schema_for!(ServerConfig);
    let schema_value = serde_json::to_value(&schema).expect("schema value");
    validator_for(&schema_value).expect("valid schema")
});

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Schema(String),
    #[error("invalid NOTESYNC_PORT: {0}")]
    InvalidPort(String),
    #[error("invalid bind address: {0}")]
    InvalidBind(String),
    #[error("http.port must be non-zero")]
    ZeroPort,
    #[error("http.body_limit_kb must be within 1..=65536, got {0}")]
    BodyLimit(u32),
}

impl ServerConfig {
    pub fn parse_toml(content: &str) -> Result<Self> {
        let raw: toml::Value = toml::from_str(content)?;
        let json_value = serde_json::to_value(&raw)?;
        let validation_errors: Vec<_> = CONFIG_SCHEMA
            .iter_errors(&json_value)
            .map(|e| e.to_string())
            .collect();
        if !validation_errors.is_empty() {
            return Err(ConfigError::Schema(validation_errors.join(", ")).into());
        }
        Ok(toml::from_str(content)?)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::parse_toml(&content).with_context(|| format!("parse config {}", path.display()))
    }

    /// Discover, load, override from env and validate.
    ///
    /// An explicit `NOTESYNC_CONFIG` that cannot be read is an error; a missing
    /// `configs/default.toml` falls back to built-in defaults.
    pub fn load() -> Result<Self> {
        let mut cfg = match discovered_config_path() {
            Some(path) => {
                let mut cfg = Self::load_file(&path)?;
                cfg.source = Some(path);
                cfg
            }
            None => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_overrides(
        &mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(bind) = get("NOTESYNC_BIND").filter(|v| !v.trim().is_empty()) {
            self.http.bind = bind.trim().to_string();
        }
        if let Some(raw) = get("NOTESYNC_PORT").filter(|v| !v.trim().is_empty()) {
            self.http.port = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?;
        }
        if let Some(dir) = get("NOTESYNC_STATE_DIR").filter(|v| !v.trim().is_empty()) {
            self.storage.state_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if !(1..=65536).contains(&self.http.body_limit_kb) {
            return Err(ConfigError::BodyLimit(self.http.body_limit_kb));
        }
        self.bind_ip()?;
        Ok(())
    }

    fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.http
            .bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(self.http.bind.clone()))
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(SocketAddr::new(self.bind_ip()?, self.http.port))
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.http.body_limit_kb as usize * 1024
    }
}

fn discovered_config_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("NOTESYNC_CONFIG") {
        if !explicit.trim().is_empty() {
            return Some(PathBuf::from(explicit));
        }
    }
    let local = PathBuf::from(DEFAULT_CONFIG_PATH);
    local.exists().then_some(local)
}
