use anyhow::{Context, Result};
use reqwest::header::LOCATION;
use reqwest::{Client, Response, redirect};
use std::time::Duration;
use url::Url;

pub mod fetcher;
pub mod loader;

pub use fetcher::HttpConfigFetcher;
pub use loader::HttpContentLoader;

/// Redirect hops followed before a load is abandoned.
pub const MAX_REDIRECTS: usize = 10;

/// Build the HTTP client shared by every content session and the config
/// fetcher. The client never follows redirects itself: callers walk each hop
/// so that cookies set along the way land in the right browsing context.
pub fn build_client(user_agent: &str, connect_timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(connect_timeout)
        .redirect(redirect::Policy::none())
        .build()
        .context("Failed to build HTTP client")
}

/// Where a 3xx response points, resolved against the URL that produced it.
pub(crate) fn redirect_target(resp: &Response) -> Option<Url> {
    if !resp.status().is_redirection() {
        return None;
    }
    let location = resp.headers().get(LOCATION)?.to_str().ok()?;
    resp.url().join(location).ok()
}
