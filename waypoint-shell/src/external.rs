use anyhow::{Result, anyhow};
use async_trait::async_trait;
use url::Url;

/// Receives links that leave the managed domain.
#[async_trait]
pub trait ExternalOpener: Send + Sync {
    async fn open(&self, url: &Url) -> Result<()>;
}

/// Whether `url` belongs to the domain served from `base`: same scheme,
/// host and port.
pub fn is_managed(base: &Url, url: &Url) -> bool {
    base.scheme() == url.scheme()
        && base.host_str() == url.host_str()
        && base.port_or_known_default() == url.port_or_known_default()
}

/// Hands links to the platform browser.
#[derive(Debug, Default)]
pub struct SystemBrowser;

#[async_trait]
impl ExternalOpener for SystemBrowser {
    async fn open(&self, url: &Url) -> Result<()> {
        tracing::info!(%url, "opening in system browser");

        #[cfg(windows)]
        let status = tokio::process::Command::new("cmd")
            .args(["/C", "start", "", url.as_str()])
            .status()
            .await?;

        #[cfg(target_os = "macos")]
        let status = tokio::process::Command::new("open")
            .arg(url.as_str())
            .status()
            .await?;

        #[cfg(not(any(windows, target_os = "macos")))]
        let status = tokio::process::Command::new("xdg-open")
            .arg(url.as_str())
            .status()
            .await?;

        if !status.success() {
            return Err(anyhow!(
                "browser launcher exited with code {}",
                status.code().unwrap_or(-1)
            ));
        }
        Ok(())
    }
}
