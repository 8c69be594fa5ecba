//! The shell loop.
//!
//! The shell owns the navigation stack, both content sessions and the
//! capability gate. Inbound events and load completions are handled one at a
//! time on the same task, so routing and gating never overlap.

use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::{mpsc, oneshot, watch};
use url::Url;

use waypoint_core::gate::ButtonAction;
use waypoint_core::settings::ButtonSide;
use waypoint_core::{
    Affordances, AuthProbe, ConfigFetcher, ContentLoader, ContentSession, ErrorNotice, LoadState,
    LoadedContent, MetaTagProbe, PathConfigurationStore, PropertyMap, SessionEvent, ShellSettings,
    Target, VisitAction, VisitOutcome, VisitRequest, VisitRouter,
};

use super::events::{Inbound, ShellEvent};
use super::state::{ShellSnapshot, ShellState};
use crate::config::ShellConfig;
use crate::external::{ExternalOpener, is_managed};

const SESSION_EVENT_BUFFER: usize = 32;

pub struct Shell {
    config: ShellConfig,
    base_url: Url,
    store: Arc<PathConfigurationStore>,
    settings: ShellSettings,
    primary: ContentSession,
    modal: ContentSession,
    session_events: mpsc::Receiver<SessionEvent>,
    probe: Arc<dyn AuthProbe>,
    opener: Arc<dyn ExternalOpener>,
    state: ShellState,
    affordances: watch::Sender<Affordances>,
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("base_url", &self.base_url)
            .field("primary", &self.primary)
            .field("modal", &self.modal)
            .field("state", &self.state)
            .finish()
    }
}

impl Shell {
    /// Build a shell around the given engine seams. Both sessions share
    /// `loader`; each keeps its own browsing context.
    pub fn new(
        config: ShellConfig,
        loader: Arc<dyn ContentLoader>,
        fetcher: Arc<dyn ConfigFetcher>,
        opener: Arc<dyn ExternalOpener>,
    ) -> Result<Self> {
        let base_url = config.base_url()?;
        let store = PathConfigurationStore::new(config.path_config_sources()?, fetcher)
            .with_fetch_timeout(config.fetch_timeout());
        let (tx, rx) = mpsc::channel(SESSION_EVENT_BUFFER);
        let (affordances, _) = watch::channel(Affordances::default());

        Ok(Self {
            probe: Arc::new(MetaTagProbe::new(config.auth_marker.clone())),
            primary: ContentSession::new(Target::Primary, loader.clone(), tx.clone()),
            modal: ContentSession::new(Target::Modal, loader, tx),
            session_events: rx,
            store: Arc::new(store),
            settings: ShellSettings::default(),
            state: ShellState::new(),
            base_url,
            config,
            opener,
            affordances,
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn AuthProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn settings(&self) -> &ShellSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> ShellSnapshot {
        self.state.snapshot()
    }

    /// Affordances as republished after every successful load.
    pub fn subscribe(&self) -> watch::Receiver<Affordances> {
        self.affordances.subscribe()
    }

    /// Either session has a load in flight.
    pub fn is_loading(&self) -> bool {
        self.primary.is_loading() || self.modal.is_loading()
    }

    /// Load the path configuration, publish the signed-out affordances and
    /// visit the root.
    pub async fn boot(&mut self) -> Result<()> {
        let config = self.store.load().await;
        self.settings = config.settings().clone();
        self.publish_affordances();

        let root = self.config.url_for("")?;
        tracing::info!(%root, rules = config.rules().len(), "shell booting");
        self.propose(root, VisitAction::Replace, PropertyMap::new())
            .await;
        Ok(())
    }

    /// Process one inbound event.
    pub async fn handle(&mut self, event: ShellEvent) -> ControlFlow<()> {
        tracing::debug!(?event, "shell event");
        match event {
            ShellEvent::Propose {
                url,
                action,
                properties,
            } => self.propose(url, action, properties).await,
            ShellEvent::SelectTab(index) => self.select_tab(index).await,
            ShellEvent::TapButton { side, index } => self.tap_button(side, index).await,
            ShellEvent::Back => self.back(),
            ShellEvent::DismissModal => self.dismiss_modal(),
            ShellEvent::RefreshConfiguration => self.refresh_configuration().await,
            ShellEvent::Shutdown => {
                tracing::info!("shell shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Drain load completions until neither session is loading.
    pub async fn settle(&mut self) {
        while self.is_loading() {
            match self.session_events.recv().await {
                Some(event) => self.on_session_event(event).await,
                None => break,
            }
        }
    }

    /// Run until `Shutdown` or until every inbound sender is gone.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Inbound>) {
        let mut waiting: Vec<oneshot::Sender<ShellSnapshot>> = Vec::new();

        loop {
            tokio::select! {
                Some(event) = self.session_events.recv() => {
                    self.on_session_event(event).await;
                }
                message = inbound.recv() => match message {
                    Some(Inbound::Event(event)) => {
                        if self.handle(event).await.is_break() {
                            break;
                        }
                    }
                    Some(Inbound::Snapshot(reply)) => waiting.push(reply),
                    None => {
                        tracing::info!("inbound channel closed; shell stopping");
                        break;
                    }
                },
            }

            if !self.is_loading() {
                for reply in waiting.drain(..) {
                    let _ = reply.send(self.state.snapshot());
                }
            }
        }

        for reply in waiting {
            let _ = reply.send(self.state.snapshot());
        }
    }

    async fn propose(&mut self, url: Url, action: VisitAction, overrides: PropertyMap) {
        if !is_managed(&self.base_url, &url) {
            if let Err(e) = self.opener.open(&url).await {
                tracing::warn!(%url, error = %format!("{:#}", e), "external link hand-off failed");
            }
            return;
        }

        let mut properties = self.store.properties(&url).await;
        properties.merge_from(&overrides);
        self.route(VisitRequest::new(url, action, properties));
    }

    fn route(&mut self, request: VisitRequest) {
        let active = self.primary.active_url().cloned();
        let outcome = VisitRouter::route(
            &request,
            &mut self.state.stack,
            &mut self.state.modal,
            active.as_ref(),
        );

        if outcome.dismissed.is_some() {
            self.modal.cancel();
        }

        match outcome.plan.target {
            Target::Modal => {
                self.modal.visit(&outcome.screen);
            }
            Target::Primary => {
                self.primary.visit(&outcome.screen);
                if outcome.plan.force_reload {
                    self.primary.reload();
                }
            }
        }

        self.state.prune_notices();
    }

    async fn select_tab(&mut self, index: usize) {
        let Some(tab) = self
            .state
            .affordances
            .tabs
            .iter()
            .find(|t| t.index == index)
            .cloned()
        else {
            tracing::warn!(index, "tab is not offered; ignoring selection");
            return;
        };

        match self.config.url_for(&tab.visit) {
            Ok(url) => {
                self.state.affordances.selected_tab = Some(index);
                self.propose(url, VisitAction::Replace, PropertyMap::new())
                    .await;
            }
            Err(e) => tracing::warn!(index, error = %e, "tab has an unusable path"),
        }
    }

    async fn tap_button(&mut self, side: ButtonSide, index: usize) {
        let Some(button) = self.state.affordances.buttons(side).get(index).cloned() else {
            tracing::warn!(?side, index, "button is not offered; ignoring tap");
            return;
        };

        match button.action {
            ButtonAction::Visit(path) => match self.config.url_for(&path) {
                Ok(url) => {
                    self.propose(url, VisitAction::Replace, PropertyMap::new())
                        .await
                }
                Err(e) => tracing::warn!(%path, error = %e, "button has an unusable path"),
            },
            ButtonAction::Script(script) => match self.primary.evaluate(&script).await {
                Ok(result) => tracing::info!(%script, %result, "button script evaluated"),
                Err(e) => {
                    tracing::warn!(%script, error = %format!("{:#}", e), "button script failed")
                }
            },
            ButtonAction::None => tracing::debug!(?side, index, "button has no action"),
        }
    }

    fn back(&mut self) {
        if self.state.stack.pop().is_none() {
            tracing::debug!("back ignored; already at the root");
            return;
        }
        let Some(top) = self.state.stack.top().cloned() else {
            return;
        };
        if let Some(screen) = self.state.stack.get_mut(top.id()) {
            screen.load_state = LoadState::Pending;
        }
        self.state.clear_notice(top.id());
        self.primary.visit(&top);
        self.state.prune_notices();
    }

    fn dismiss_modal(&mut self) {
        if self.state.modal.dismiss().is_some() {
            self.modal.cancel();
            self.state.prune_notices();
        } else {
            tracing::debug!("dismiss ignored; no modal presented");
        }
    }

    async fn refresh_configuration(&mut self) {
        let config = self.store.refresh().await;
        self.settings = config.settings().clone();
        self.publish_affordances();
    }

    async fn on_session_event(&mut self, event: SessionEvent) {
        let session = match event.target {
            Target::Primary => &mut self.primary,
            Target::Modal => &mut self.modal,
        };
        if !session.accept(&event) {
            return;
        }

        let Some(screen) = self.state.screen_mut(event.screen_id) else {
            tracing::debug!(screen = %event.screen_id, "completed screen is gone");
            return;
        };

        match event.outcome {
            VisitOutcome::Loaded(content) => {
                screen.load_state = LoadState::Loaded;
                self.state.clear_notice(event.screen_id);
                tracing::info!(url = %content.url, session = ?event.target, "screen loaded");
                self.gate(&content).await;
            }
            VisitOutcome::Failed(failure) => {
                screen.load_state = LoadState::Failed(failure.clone());
                let notice = ErrorNotice::for_failure(&self.config.app_name, &failure);
                tracing::warn!(
                    url = %screen.url(),
                    session = ?event.target,
                    title = %notice.title,
                    "screen failed to load"
                );
                self.state.show_notice(event.screen_id, notice);
            }
        }
    }

    async fn gate(&mut self, content: &LoadedContent) {
        let outcome = match tokio::time::timeout(
            self.config.probe_timeout(),
            self.probe.probe(content),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(anyhow!(
                "authentication probe timed out after {:?}",
                self.config.probe_timeout()
            )),
        };
        let authenticated = self.state.gate.record_probe(outcome);
        tracing::debug!(authenticated, "capability gate evaluated");
        self.publish_affordances();
    }

    fn publish_affordances(&mut self) {
        let current_path = self.state.stack.top().map(|s| s.url().path().to_string());
        let mut affordances = self
            .state
            .gate
            .affordances(&self.settings, current_path.as_deref());

        // A selected tab stays selected while it is still offered.
        if let Some(selected) = self.state.affordances.selected_tab
            && affordances.tabs.iter().any(|t| t.index == selected)
        {
            affordances.selected_tab = Some(selected);
        }

        self.state.affordances = affordances.clone();
        self.affordances.send_replace(affordances);
    }
}
