//! Content loads over HTTP.
//!
//! Every failure is mapped onto [`LoadError`] so the shell can pick the
//! matching notice.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Response};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, COOKIE, PRAGMA, SET_COOKIE};
use std::time::Duration;
use url::Url;
use waypoint_core::{BrowsingContext, ContentLoader, LoadError, LoadedContent};

use crate::{MAX_REDIRECTS, redirect_target};

#[derive(Debug, Clone)]
pub struct HttpContentLoader {
    http: Client,
    load_timeout: Option<Duration>,
}

impl HttpContentLoader {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            load_timeout: None,
        }
    }

    /// Per-request deadline, applied to each redirect hop. `None` lets a load
    /// run until the transport gives up.
    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// One request with no redirect handling.
    async fn send(
        &self,
        url: &Url,
        context: &BrowsingContext,
        bypass_cache: bool,
    ) -> Result<Response> {
        let mut request = self.http.get(url.clone());
        if let Some(cookies) = context.cookie_header() {
            request = request.header(COOKIE, cookies);
        }
        if bypass_cache {
            request = request
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }
        if let Some(timeout) = self.load_timeout {
            request = request.timeout(timeout);
        }
        request
            .send()
            .await
            .map_err(|e| anyhow::Error::from(classify(&e)))
    }
}

/// Whether a `Content-Type` value is something the content engine renders.
pub fn is_renderable(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/xhtml+xml"
        || (essence.starts_with("text/") && essence.ends_with("html"))
}

/// Map a transport error onto the load failure taxonomy.
pub fn classify(err: &reqwest::Error) -> LoadError {
    if err.is_timeout() {
        LoadError::TimeoutFailure
    } else if err.is_body() || err.is_decode() {
        LoadError::PageLoadFailure {
            reason: err.to_string(),
        }
    } else {
        LoadError::NetworkFailure {
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl ContentLoader for HttpContentLoader {
    async fn load(
        &self,
        url: &Url,
        context: &BrowsingContext,
        bypass_cache: bool,
    ) -> Result<LoadedContent> {
        let mut current = url.clone();
        let mut hops = 0;
        let resp = loop {
            let resp = self.send(&current, context, bypass_cache).await?;
            for value in resp.headers().get_all(SET_COOKIE) {
                if let Ok(value) = value.to_str() {
                    context.store_cookie(value);
                }
            }

            let Some(next) = redirect_target(&resp) else {
                break resp;
            };
            hops += 1;
            if hops > MAX_REDIRECTS {
                return Err(LoadError::NetworkFailure {
                    reason: format!("more than {} redirects from {}", MAX_REDIRECTS, url),
                }
                .into());
            }
            tracing::debug!(
                from = %current,
                to = %next,
                context = context.label(),
                "following redirect"
            );
            current = next;
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(LoadError::http(status.as_u16()).into());
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        match content_type.as_deref() {
            Some(ct) if is_renderable(ct) => {}
            other => {
                return Err(LoadError::ContentTypeMismatch {
                    content_type: other.unwrap_or("none").to_string(),
                }
                .into());
            }
        }

        let final_url = resp.url().clone();
        let body = resp.text().await.map_err(|e| classify(&e))?;

        tracing::debug!(
            url = %final_url,
            context = context.label(),
            status = status.as_u16(),
            bytes = body.len(),
            "content loaded"
        );

        Ok(LoadedContent {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}
