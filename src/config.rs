use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::lint::DEFAULT_REPORT;
use crate::pipeline::PipelineConfig;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Storage backend
    pub storage: StorageKind,
    /// Path to the SQLite database
    pub database_path: PathBuf,
    /// HMAC secret for session tokens
    pub jwt_secret: String,
    /// Session token lifetime
    pub token_ttl_hours: u32,
    pub pipeline: PipelineSettings,
    /// Linters by language tag
    pub linters: Vec<LinterConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Sqlite,
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StorageKind::Sqlite),
            "memory" => Ok(StorageKind::Memory),
            _ => Err(format!(
                "Invalid storage '{}'. Valid options: sqlite, memory",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub inspection_workers: usize,
    pub persistence_workers: usize,
    /// Unset means enqueue waits for as long as it takes.
    pub enqueue_timeout_ms: Option<u64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            inspection_workers: 4,
            persistence_workers: 4,
            enqueue_timeout_ms: None,
        }
    }
}

impl PipelineSettings {
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            inspection_workers: self.inspection_workers,
            persistence_workers: self.persistence_workers,
            enqueue_timeout: self.enqueue_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinterConfig {
    pub lang: String,
    #[serde(flatten)]
    pub kind: LinterKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LinterKind {
    /// Fixed report for every document
    Stub {
        #[serde(default = "default_report")]
        report: String,
    },
    /// External tool run over a temporary copy of the document
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        /// File extension for the temporary copy
        #[serde(default)]
        extension: String,
    },
}

fn default_report() -> String {
    DEFAULT_REPORT.to_string()
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            storage: StorageKind::default(),
            database_path: data_dir.join("docshare").join("docshare.db"),
            jwt_secret: String::new(),
            token_ttl_hours: 24,
            pipeline: PipelineSettings::default(),
            linters: vec![LinterConfig {
                lang: "text".to_string(),
                kind: LinterKind::Stub {
                    report: default_report(),
                },
            }],
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies `DOCSHARE_*` overrides looked up through `var`.
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = var("DOCSHARE_LISTEN") {
            self.listen_addr = addr;
        }
        if let Some(storage) = var("DOCSHARE_STORAGE") {
            self.storage = storage
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("DOCSHARE_STORAGE: {}", e)))?;
        }
        if let Some(db_path) = var("DOCSHARE_DATABASE_PATH") {
            self.database_path = PathBuf::from(db_path);
        }
        if let Some(secret) = var("DOCSHARE_JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Some(workers) = var("DOCSHARE_INSPECTION_WORKERS") {
            self.pipeline.inspection_workers = parse_number("DOCSHARE_INSPECTION_WORKERS", &workers)?;
        }
        if let Some(workers) = var("DOCSHARE_PERSISTENCE_WORKERS") {
            self.pipeline.persistence_workers =
                parse_number("DOCSHARE_PERSISTENCE_WORKERS", &workers)?;
        }
        Ok(())
    }

    /// Checks settings the server cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "jwt_secret must be set (or DOCSHARE_JWT_SECRET)".to_string(),
            ));
        }
        if self.pipeline.inspection_workers == 0 || self.pipeline.persistence_workers == 0 {
            return Err(ConfigError::Invalid(
                "pipeline worker counts must be at least 1".to_string(),
            ));
        }
        if self.token_ttl_hours == 0 {
            return Err(ConfigError::Invalid(
                "token_ttl_hours must be at least 1".to_string(),
            ));
        }
        for linter in &self.linters {
            if linter.lang.trim().is_empty() {
                return Err(ConfigError::Invalid("linter without a lang".to_string()));
            }
            if let LinterKind::Command { program, .. } = &linter.kind {
                if program.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "linter for '{}' has no program",
                        linter.lang
                    )));
                }
            }
        }
        Ok(())
    }

    /// Default config file path: ~/.config/docshare/config.yaml
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docshare")
            .join("config.yaml")
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} must be a number, got '{}'", name, value)))
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    e
                )
            }
            ConfigError::Invalid(reason) => write!(f, "Invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}
