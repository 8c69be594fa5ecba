//! Inbound shell events.
//!
//! Every collaborator talks to the shell through these; they are processed
//! strictly one at a time in arrival order:
//!   Propose            → external link hand-off or visit routing
//!   SelectTab          → replace visit to the tab's path
//!   TapButton          → replace visit or script evaluation
//!   Back               → pop the primary stack
//!   DismissModal       → tear down the modal presentation
//!   RefreshConfiguration → re-read every path configuration source
//!   Shutdown           → leave the loop

use super::state::ShellSnapshot;
use tokio::sync::oneshot;
use url::Url;
use waypoint_core::settings::ButtonSide;
use waypoint_core::{PropertyMap, VisitAction};

#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    /// A visit proposal. `properties` overlay whatever the path rules
    /// resolve for `url`.
    Propose {
        url: Url,
        action: VisitAction,
        properties: PropertyMap,
    },
    SelectTab(usize),
    TapButton { side: ButtonSide, index: usize },
    Back,
    DismissModal,
    RefreshConfiguration,
    Shutdown,
}

impl ShellEvent {
    pub fn visit(url: Url, action: VisitAction) -> Self {
        Self::Propose {
            url,
            action,
            properties: PropertyMap::new(),
        }
    }
}

/// What [`Shell::run`](super::Shell::run) reads from its inbound channel.
#[derive(Debug)]
pub enum Inbound {
    Event(ShellEvent),
    /// Reply with a snapshot once no load is in flight.
    Snapshot(oneshot::Sender<ShellSnapshot>),
}

impl From<ShellEvent> for Inbound {
    fn from(event: ShellEvent) -> Self {
        Self::Event(event)
    }
}
