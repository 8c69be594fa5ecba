use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Response};
use url::Url;
use waypoint_core::ConfigFetcher;

use crate::{MAX_REDIRECTS, redirect_target};

/// Fetches remote `turbo.json` documents. The deadline is applied by the
/// configuration store.
#[derive(Debug, Clone)]
pub struct HttpConfigFetcher {
    http: Client,
}

impl HttpConfigFetcher {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    async fn get(&self, url: &Url) -> Result<Response> {
        self.http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to contact {}", url))
    }
}

#[async_trait]
impl ConfigFetcher for HttpConfigFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        let mut current = url.clone();
        let mut resp = self.get(&current).await?;
        for _ in 0..MAX_REDIRECTS {
            let Some(next) = redirect_target(&resp) else {
                break;
            };
            current = next;
            resp = self.get(&current).await?;
        }
        if redirect_target(&resp).is_some() {
            return Err(anyhow!("more than {} redirects from {}", MAX_REDIRECTS, url));
        }

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(anyhow!(
                "configuration server returned {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            ));
        }

        tracing::debug!(url = %current, bytes = text.len(), "fetched path configuration");
        Ok(text)
    }
}
