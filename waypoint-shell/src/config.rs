//! Shell configuration.
//!
//! Loading flow:
//! 1. Start with [`ShellConfig::default()`]
//! 2. If a config file exists (explicit path or the platform config dir),
//!    its keys replace the defaults
//! 3. Apply `WAYPOINT_ENVIRONMENT` and `WAYPOINT_BASE_URL` overrides

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;
use waypoint_core::{MetaTagProbe, PathConfigSource};

/// Fallback path configuration compiled into the binary.
pub const BUNDLED_PATH_CONFIGURATION: &str = include_str!("../resources/path-configuration.json");

pub const ENV_ENVIRONMENT: &str = "WAYPOINT_ENVIRONMENT";
pub const ENV_BASE_URL: &str = "WAYPOINT_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("environment `{0}` has no base URL")]
    UnknownEnvironment(String),
    #[error("invalid URL `{value}`: {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Which path configuration source is consulted first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrder {
    #[default]
    RemoteFirst,
    BundledFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Title shown above error notices.
    pub app_name: String,
    pub environment: String,
    /// Environment name to base URL.
    pub environments: BTreeMap<String, String>,
    pub configuration_path: String,
    /// Replaces the compiled-in fallback document.
    pub bundled_configuration: Option<PathBuf>,
    pub source_order: SourceOrder,
    pub user_agent: String,
    pub fetch_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    /// Unset means loads have no deadline.
    pub load_timeout_ms: Option<u64>,
    pub auth_marker: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            app_name: "Waypoint".to_string(),
            environment: "development".to_string(),
            environments: BTreeMap::from([(
                "development".to_string(),
                "http://localhost:3000".to_string(),
            )]),
            configuration_path: "/turbo.json".to_string(),
            bundled_configuration: None,
            source_order: SourceOrder::RemoteFirst,
            user_agent: "Waypoint-Shell".to_string(),
            fetch_timeout_ms: 10_000,
            probe_timeout_ms: 2_000,
            load_timeout_ms: None,
            auth_marker: MetaTagProbe::DEFAULT_MARKER.to_string(),
        }
    }
}

impl ShellConfig {
    /// `<platform config dir>/config.json`, when the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "DrTomLLC", "Waypoint")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load from `path` (or the default location) with process environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        Self::load_with_env(path.as_deref(), |key| std::env::var(key).ok())
    }

    /// Load from `path` with overrides read through `env`. A missing file
    /// yields defaults; a malformed one is an error.
    pub fn load_with_env(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                tracing::debug!(?path, "loading shell config from file");
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&content)?
            }
            _ => {
                tracing::debug!(?path, "shell config file not found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides(env);
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(name) = env(ENV_ENVIRONMENT).filter(|v| !v.trim().is_empty()) {
            self.select_environment(name.trim());
        }
        if let Some(url) = env(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.override_base_url(url.trim());
        }
    }

    pub fn select_environment(&mut self, name: &str) {
        self.environment = name.to_string();
    }

    /// Point the selected environment at `url`.
    pub fn override_base_url(&mut self, url: &str) {
        self.environments
            .insert(self.environment.clone(), url.to_string());
    }

    fn base_str(&self) -> Result<&str> {
        self.environments
            .get(&self.environment)
            .map(|s| s.trim_end_matches('/'))
            .ok_or_else(|| ConfigError::UnknownEnvironment(self.environment.clone()))
    }

    pub fn base_url(&self) -> Result<Url> {
        let base = self.base_str()?;
        Url::parse(base).map_err(|source| ConfigError::InvalidUrl {
            value: base.to_string(),
            source,
        })
    }

    /// Base URL joined with `path` by plain concatenation.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let joined = format!("{}{}", self.base_str()?, path);
        Url::parse(&joined).map_err(|source| ConfigError::InvalidUrl {
            value: joined,
            source,
        })
    }

    /// The remote document and the bundled fallback, in configured order.
    pub fn path_config_sources(&self) -> Result<Vec<PathConfigSource>> {
        let remote = PathConfigSource::Server(self.url_for(&self.configuration_path)?);
        let bundled = match &self.bundled_configuration {
            Some(path) => PathConfigSource::File(path.clone()),
            None => {
                PathConfigSource::bundled("path-configuration.json", BUNDLED_PATH_CONFIGURATION)
            }
        };
        Ok(match self.source_order {
            SourceOrder::RemoteFirst => vec![remote, bundled],
            SourceOrder::BundledFirst => vec![bundled, remote],
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }
}
