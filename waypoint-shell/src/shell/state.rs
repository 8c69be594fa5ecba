//! State owned by the shell loop and the snapshot it reports.

use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;
use waypoint_core::{
    Affordances, CapabilityGate, ErrorNotice, LoadState, ModalPresentation, NavigationStack,
    Screen, ScreenId,
};

/// Everything the routing engine and capability gate read or write. Only
/// the shell loop touches it.
#[derive(Debug, Default)]
pub struct ShellState {
    pub stack: NavigationStack,
    pub modal: ModalPresentation,
    pub gate: CapabilityGate,
    pub affordances: Affordances,
    notices: BTreeMap<ScreenId, ErrorNotice>,
    notices_shown: u64,
}

impl ShellState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn screen_mut(&mut self, id: ScreenId) -> Option<&mut Screen> {
        match self.stack.get_mut(id) {
            Some(screen) => Some(screen),
            None => self.modal.get_mut(id),
        }
    }

    /// Replace the content of Screen `id` with `notice`.
    pub fn show_notice(&mut self, id: ScreenId, notice: ErrorNotice) {
        self.notices.insert(id, notice);
        self.notices_shown += 1;
    }

    pub fn clear_notice(&mut self, id: ScreenId) {
        self.notices.remove(&id);
    }

    pub fn notice(&self, id: ScreenId) -> Option<&ErrorNotice> {
        self.notices.get(&id)
    }

    /// Total notices shown since start.
    pub fn notices_shown(&self) -> u64 {
        self.notices_shown
    }

    /// Forget notices of Screens no longer on the stack or in the modal.
    pub fn prune_notices(&mut self) {
        let modal = self.modal.screen().map(Screen::id);
        let stack = &self.stack;
        self.notices
            .retain(|id, _| stack.contains(*id) || modal == Some(*id));
    }

    pub fn snapshot(&self) -> ShellSnapshot {
        let summarize = |screen: &Screen| ScreenSummary {
            url: screen.url().clone(),
            state: match &screen.load_state {
                LoadState::Pending => "pending".to_string(),
                LoadState::Loaded => "loaded".to_string(),
                LoadState::Failed(kind) => format!("failed: {}", kind.message()),
            },
            notice: self.notices.get(&screen.id()).cloned(),
        };

        ShellSnapshot {
            stack: self.stack.entries().iter().map(summarize).collect(),
            modal: self.modal.screen().map(summarize),
            authenticated: self.gate.is_authenticated(),
            affordances: self.affordances.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenSummary {
    pub url: Url,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<ErrorNotice>,
}

/// Read-only view of the shell for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShellSnapshot {
    pub stack: Vec<ScreenSummary>,
    pub modal: Option<ScreenSummary>,
    pub authenticated: bool,
    pub affordances: Affordances,
}
