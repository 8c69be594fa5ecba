//! Content sessions.
//!
//! A session owns one isolated browsing context and issues loads for the
//! Screen it was last asked to show. Loads run as tokio tasks; completions
//! come back as [`SessionEvent`]s on a channel the shell drains one at a
//! time. A new visit supersedes the one in flight: the old task is aborted
//! and, should its event still arrive, its generation no longer matches.

use crate::error::FailureKind;
use crate::routing::Target;
use crate::screen::{Screen, ScreenId};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

/// A successfully loaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedContent {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// A cookie held by a [`BrowsingContext`]. `expires` is `None` for session
/// cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredCookie {
    value: String,
    expires: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_none_or(|at| at > now)
    }
}

/// Per-session browsing state. Never shared between sessions.
#[derive(Debug)]
pub struct BrowsingContext {
    id: Uuid,
    label: String,
    cookies: Mutex<BTreeMap<String, StoredCookie>>,
}

impl BrowsingContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            cookies: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Value for a `Cookie` request header, if any live cookie is held.
    pub fn cookie_header(&self) -> Option<String> {
        let now = Utc::now();
        let mut jar = self.cookies.lock().unwrap_or_else(|e| e.into_inner());
        jar.retain(|_, cookie| cookie.is_live(now));
        if jar.is_empty() {
            return None;
        }
        Some(
            jar.iter()
                .map(|(k, c)| format!("{}={}", k, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Apply a `Set-Cookie` header. `Max-Age` takes precedence over
    /// `Expires`; an empty value or an expiry in the past removes the cookie.
    /// Other attributes are not interpreted.
    pub fn store_cookie(&self, set_cookie: &str) {
        self.store_cookie_at(set_cookie, Utc::now());
    }

    fn store_cookie_at(&self, set_cookie: &str, now: DateTime<Utc>) {
        let mut parts = set_cookie.split(';');
        let pair = parts.next().unwrap_or_default();
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        let mut max_age = None;
        let mut expires = None;
        for attr in parts {
            let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
            match key.trim().to_ascii_lowercase().as_str() {
                "max-age" => max_age = val.trim().parse::<i64>().ok(),
                "expires" => {
                    expires = DateTime::parse_from_rfc2822(val.trim())
                        .ok()
                        .map(|at| at.with_timezone(&Utc))
                }
                _ => {}
            }
        }
        let expires = match max_age {
            Some(secs) if secs <= 0 => Some(DateTime::<Utc>::MIN_UTC),
            Some(secs) => TimeDelta::try_seconds(secs).and_then(|d| now.checked_add_signed(d)),
            None => expires,
        };

        let cookie = StoredCookie {
            value: value.trim().to_string(),
            expires,
        };
        let mut jar = self.cookies.lock().unwrap_or_else(|e| e.into_inner());
        if cookie.value.is_empty() || !cookie.is_live(now) {
            jar.remove(name);
        } else {
            jar.insert(name.to_string(), cookie);
        }
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        let now = Utc::now();
        self.cookies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .filter(|c| c.is_live(now))
            .map(|c| c.value.clone())
    }
}

/// The engine that fetches and renders a URL's content.
#[async_trait]
pub trait ContentLoader: Send + Sync {
    /// Load `url` within `context`. Failures should be [`LoadError`]s where
    /// they fit the taxonomy.
    ///
    /// [`LoadError`]: crate::error::LoadError
    async fn load(
        &self,
        url: &Url,
        context: &BrowsingContext,
        bypass_cache: bool,
    ) -> Result<LoadedContent>;

    /// Run a script against loaded content. Engines without a script
    /// runtime keep the default.
    async fn evaluate_script(
        &self,
        _content: &LoadedContent,
        _context: &BrowsingContext,
        _script: &str,
    ) -> Result<String> {
        Err(anyhow!("script evaluation is not supported by this content engine"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitOutcome {
    Loaded(LoadedContent),
    Failed(FailureKind),
}

/// Completion of one load, delivered to the shell.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub target: Target,
    pub generation: u64,
    pub screen_id: ScreenId,
    pub outcome: VisitOutcome,
}

#[derive(Debug, Clone)]
struct ActiveScreen {
    id: ScreenId,
    url: Url,
}

pub struct ContentSession {
    target: Target,
    context: Arc<BrowsingContext>,
    loader: Arc<dyn ContentLoader>,
    events: mpsc::Sender<SessionEvent>,
    active: Option<ActiveScreen>,
    generation: u64,
    pending: bool,
    in_flight: Option<JoinHandle<()>>,
    last_content: Option<LoadedContent>,
}

impl std::fmt::Debug for ContentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSession")
            .field("target", &self.target)
            .field("context", &self.context.id())
            .field("active", &self.active)
            .field("generation", &self.generation)
            .field("pending", &self.pending)
            .finish()
    }
}

impl ContentSession {
    pub fn new(
        target: Target,
        loader: Arc<dyn ContentLoader>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let label = match target {
            Target::Primary => "primary",
            Target::Modal => "modal",
        };
        Self {
            target,
            context: Arc::new(BrowsingContext::new(label)),
            loader,
            events,
            active: None,
            generation: 0,
            pending: false,
            in_flight: None,
            last_content: None,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn context(&self) -> &BrowsingContext {
        &self.context
    }

    pub fn active_url(&self) -> Option<&Url> {
        self.active.as_ref().map(|a| &a.url)
    }

    pub fn active_screen(&self) -> Option<ScreenId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A load for the active Screen has been issued and not yet accepted.
    pub fn is_loading(&self) -> bool {
        self.pending
    }

    pub fn last_content(&self) -> Option<&LoadedContent> {
        self.last_content.as_ref()
    }

    /// Make `screen` active and start loading it. Returns the load's
    /// generation.
    pub fn visit(&mut self, screen: &Screen) -> u64 {
        self.active = Some(ActiveScreen {
            id: screen.id(),
            url: screen.url().clone(),
        });
        self.last_content = None;
        self.start(false)
    }

    /// Load the active Screen again, bypassing any cache.
    pub fn reload(&mut self) -> Option<u64> {
        if self.active.is_none() {
            tracing::debug!(session = ?self.target, "reload ignored; no active screen");
            return None;
        }
        Some(self.start(true))
    }

    /// Abort any load in flight and forget the active Screen.
    pub fn cancel(&mut self) {
        self.abort_in_flight();
        self.pending = false;
        self.active = None;
        self.last_content = None;
    }

    /// Whether `event` completes this session's current load. Stale and
    /// foreign events are rejected; an accepted event clears the pending
    /// state.
    pub fn accept(&mut self, event: &SessionEvent) -> bool {
        let current = event.target == self.target
            && event.generation == self.generation
            && self.pending
            && self.active_screen() == Some(event.screen_id);
        if !current {
            tracing::debug!(
                session = ?self.target,
                generation = event.generation,
                current = self.generation,
                "ignoring superseded load completion"
            );
            return false;
        }

        self.pending = false;
        self.in_flight = None;
        if let VisitOutcome::Loaded(content) = &event.outcome {
            self.last_content = Some(content.clone());
        }
        true
    }

    /// Evaluate `script` against the most recently loaded content.
    pub async fn evaluate(&self, script: &str) -> Result<String> {
        let content = self
            .last_content
            .as_ref()
            .context("no content loaded in this session")?;
        self.loader
            .evaluate_script(content, &self.context, script)
            .await
    }

    fn start(&mut self, bypass_cache: bool) -> u64 {
        self.abort_in_flight();
        self.generation += 1;
        self.pending = true;

        let Some(active) = self.active.clone() else {
            return self.generation;
        };
        let generation = self.generation;
        let target = self.target;
        let loader = self.loader.clone();
        let context = self.context.clone();
        let events = self.events.clone();

        tracing::info!(
            session = ?target,
            url = %active.url,
            generation,
            bypass_cache,
            "load started"
        );

        self.in_flight = Some(tokio::spawn(async move {
            let outcome = match loader.load(&active.url, &context, bypass_cache).await {
                Ok(content) => VisitOutcome::Loaded(content),
                Err(e) => {
                    tracing::warn!(
                        session = ?target,
                        url = %active.url,
                        error = %format!("{:#}", e),
                        "load failed"
                    );
                    VisitOutcome::Failed(FailureKind::from_error(&e))
                }
            };
            let event = SessionEvent {
                target,
                generation,
                screen_id: active.id,
                outcome,
            };
            if events.send(event).await.is_err() {
                tracing::debug!(session = ?target, "shell gone; dropping load completion");
            }
        }));

        generation
    }

    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

impl Drop for ContentSession {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}
