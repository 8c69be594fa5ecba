//! Loading, merging and caching path configuration sources.

use super::matcher;
use super::rule::{PathRule, parse_document};
use crate::properties::PropertyMap;
use crate::settings::ShellSettings;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

/// Fetches a remote configuration document.
#[async_trait]
pub trait ConfigFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// Where a rule list comes from.
#[derive(Debug, Clone)]
pub enum PathConfigSource {
    /// `GET <url>` through the [`ConfigFetcher`].
    Server(Url),
    /// A JSON file on disk.
    File(PathBuf),
    /// A document shipped inside the binary. Always readable.
    Bundled { name: String, contents: String },
}

impl PathConfigSource {
    pub fn bundled(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self::Bundled {
            name: name.into(),
            contents: contents.into(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Server(url) => url.to_string(),
            Self::File(path) => path.display().to_string(),
            Self::Bundled { name, .. } => format!("bundled:{}", name),
        }
    }
}

/// Rules and settings merged from every source that could be read.
#[derive(Debug, Clone, Default)]
pub struct PathConfiguration {
    rules: Vec<PathRule>,
    settings: ShellSettings,
    loaded_sources: usize,
}

impl PathConfiguration {
    pub fn new(rules: Vec<PathRule>, settings: ShellSettings) -> Self {
        Self {
            rules,
            settings,
            loaded_sources: 0,
        }
    }

    pub fn properties(&self, url: &Url) -> PropertyMap {
        matcher::resolve(url, &self.rules)
    }

    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    pub fn settings(&self) -> &ShellSettings {
        &self.settings
    }

    /// How many sources contributed. Zero means every source failed.
    pub fn loaded_sources(&self) -> usize {
        self.loaded_sources
    }
}

/// Read every source in order and concatenate their rules.
///
/// A failing source is logged and skipped. Settings come from the first
/// source that carries a `settings` object.
pub async fn load_sources(
    sources: &[PathConfigSource],
    fetcher: &dyn ConfigFetcher,
    fetch_timeout: Duration,
) -> PathConfiguration {
    let mut config = PathConfiguration::default();
    let mut settings: Option<ShellSettings> = None;

    for source in sources {
        let text = match read_source(source, fetcher, fetch_timeout).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    source = %source.describe(),
                    error = %format!("{:#}", e),
                    "path configuration source unavailable"
                );
                continue;
            }
        };

        match parse_document(&text) {
            Ok(parsed) => {
                tracing::debug!(
                    source = %source.describe(),
                    rules = parsed.rules.len(),
                    "loaded path configuration source"
                );
                config.rules.extend(parsed.rules);
                if settings.is_none() {
                    settings = parsed.settings;
                }
                config.loaded_sources += 1;
            }
            Err(e) => {
                tracing::warn!(
                    source = %source.describe(),
                    error = %e,
                    "path configuration source is malformed"
                );
            }
        }
    }

    if config.loaded_sources == 0 {
        tracing::error!(
            "no path configuration source could be loaded; every visit resolves to empty properties"
        );
    }

    config.settings = settings.unwrap_or_default();
    config
}

async fn read_source(
    source: &PathConfigSource,
    fetcher: &dyn ConfigFetcher,
    fetch_timeout: Duration,
) -> Result<String> {
    match source {
        PathConfigSource::Server(url) => tokio::time::timeout(fetch_timeout, fetcher.fetch(url))
            .await
            .map_err(|_| anyhow!("fetch timed out after {:?}", fetch_timeout))?,
        PathConfigSource::File(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        PathConfigSource::Bundled { contents, .. } => Ok(contents.clone()),
    }
}

/// Lazily loads the configured sources on first use and caches the result
/// until [`refresh`](Self::refresh) is called.
pub struct PathConfigurationStore {
    sources: Vec<PathConfigSource>,
    fetcher: Arc<dyn ConfigFetcher>,
    fetch_timeout: Duration,
    current: RwLock<Option<Arc<PathConfiguration>>>,
}

impl std::fmt::Debug for PathConfigurationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathConfigurationStore")
            .field("sources", &self.sources)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl PathConfigurationStore {
    pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(sources: Vec<PathConfigSource>, fetcher: Arc<dyn ConfigFetcher>) -> Self {
        Self {
            sources,
            fetcher,
            fetch_timeout: Self::DEFAULT_FETCH_TIMEOUT,
            current: RwLock::new(None),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// The cached configuration, loading it on first use.
    pub async fn load(&self) -> Arc<PathConfiguration> {
        if let Some(config) = self.current.read().await.as_ref() {
            return config.clone();
        }

        let mut slot = self.current.write().await;
        if let Some(config) = slot.as_ref() {
            return config.clone();
        }
        let config = Arc::new(self.fetch_all().await);
        *slot = Some(config.clone());
        config
    }

    /// Re-read every source and swap the cached configuration.
    pub async fn refresh(&self) -> Arc<PathConfiguration> {
        let config = Arc::new(self.fetch_all().await);
        *self.current.write().await = Some(config.clone());
        tracing::info!(rules = config.rules().len(), "path configuration refreshed");
        config
    }

    pub async fn properties(&self, url: &Url) -> PropertyMap {
        self.load().await.properties(url)
    }

    pub async fn settings(&self) -> ShellSettings {
        self.load().await.settings().clone()
    }

    async fn fetch_all(&self) -> PathConfiguration {
        load_sources(&self.sources, self.fetcher.as_ref(), self.fetch_timeout).await
    }
}
