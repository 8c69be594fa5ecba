//! Post-load capability gate.
//!
//! After every successful load the loaded content is probed for an
//! authentication marker. The result decides which protected tabs and
//! buttons are offered until the next load.

use crate::session::LoadedContent;
use crate::settings::{ButtonSide, ShellSettings};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Reads the authentication marker out of loaded content.
#[async_trait]
pub trait AuthProbe: Send + Sync {
    /// `Ok(true)` only when the marker is present and set.
    async fn probe(&self, content: &LoadedContent) -> Result<bool>;
}

/// Looks for `<meta name="{name}" content="true">` in the document.
#[derive(Debug, Clone)]
pub struct MetaTagProbe {
    name: String,
}

static META_TAG: OnceLock<Regex> = OnceLock::new();
static ATTRIBUTE: OnceLock<Regex> = OnceLock::new();

impl MetaTagProbe {
    pub const DEFAULT_MARKER: &'static str = "turbo:authenticated";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The `content` attribute of the first meta tag named `self.name`.
    pub fn marker_value(&self, html: &str) -> Option<String> {
        let tag_re = META_TAG
            .get_or_init(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("Invalid meta tag regex"));
        let attr_re = ATTRIBUTE.get_or_init(|| {
            Regex::new(r#"(?is)([a-z][a-z0-9:_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
                .expect("Invalid attribute regex")
        });

        for tag in tag_re.find_iter(html) {
            let mut name = None;
            let mut content = None;
            for caps in attr_re.captures_iter(tag.as_str()) {
                let value = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str().to_string());
                match caps[1].to_ascii_lowercase().as_str() {
                    "name" => name = value,
                    "content" => content = value,
                    _ => {}
                }
            }
            if name.as_deref() == Some(self.name.as_str()) {
                return content;
            }
        }
        None
    }
}

impl Default for MetaTagProbe {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MARKER)
    }
}

#[async_trait]
impl AuthProbe for MetaTagProbe {
    async fn probe(&self, content: &LoadedContent) -> Result<bool> {
        match self.marker_value(&content.body) {
            Some(value) => Ok(value.trim() == "true"),
            None => Err(anyhow!("marker `{}` not present", self.name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleTab {
    /// Position in the configured tab list.
    pub index: usize,
    pub title: Option<String>,
    pub icon: Option<String>,
    pub visit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonAction {
    Visit(String),
    Script(String),
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonFace {
    Title(String),
    Icon(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleButton {
    pub face: ButtonFace,
    pub action: ButtonAction,
}

/// Navigation affordances currently on offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affordances {
    pub tabs: Vec<VisibleTab>,
    pub selected_tab: Option<usize>,
    pub left_buttons: Vec<VisibleButton>,
    pub right_buttons: Vec<VisibleButton>,
}

impl Affordances {
    pub fn buttons(&self, side: ButtonSide) -> &[VisibleButton] {
        match side {
            ButtonSide::Left => &self.left_buttons,
            ButtonSide::Right => &self.right_buttons,
            ButtonSide::Unknown => &[],
        }
    }
}

/// Holds the authentication state. Lives for the process only.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityGate {
    authenticated: bool,
}

impl CapabilityGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Record a probe result. Any probe error counts as signed out.
    pub fn record_probe(&mut self, outcome: Result<bool>) -> bool {
        self.authenticated = match outcome {
            Ok(flag) => flag,
            Err(e) => {
                tracing::debug!(error = %e, "authentication probe failed; treating as signed out");
                false
            }
        };
        self.authenticated
    }

    /// Probe `content` and record the result.
    pub async fn evaluate(&mut self, probe: &dyn AuthProbe, content: &LoadedContent) -> bool {
        let outcome = probe.probe(content).await;
        self.record_probe(outcome)
    }

    /// Tabs and buttons visible for the Screen at `current_path`.
    pub fn affordances(&self, settings: &ShellSettings, current_path: Option<&str>) -> Affordances {
        let allowed = |protected: bool| !protected || self.authenticated;

        let tabs: Vec<VisibleTab> = settings
            .tabs
            .iter()
            .enumerate()
            .filter(|(_, tab)| allowed(tab.protected))
            .map(|(index, tab)| VisibleTab {
                index,
                title: tab.title.clone(),
                icon: tab.icon.clone(),
                visit: tab.visit.clone(),
            })
            .collect();

        let mut left_buttons = Vec::new();
        let mut right_buttons = Vec::new();
        for spec in settings
            .buttons
            .iter()
            .filter(|b| Some(b.path.as_str()) == current_path && allowed(b.protected))
        {
            let face = match (&spec.title, &spec.icon) {
                (Some(title), _) => ButtonFace::Title(title.clone()),
                (None, Some(icon)) => ButtonFace::Icon(icon.clone()),
                (None, None) => continue,
            };
            let action = match (&spec.visit, &spec.script) {
                (Some(visit), _) => ButtonAction::Visit(visit.clone()),
                (None, Some(script)) => ButtonAction::Script(script.clone()),
                (None, None) => ButtonAction::None,
            };
            let button = VisibleButton { face, action };
            match spec.side {
                ButtonSide::Left => left_buttons.push(button),
                ButtonSide::Right => right_buttons.push(button),
                ButtonSide::Unknown => {}
            }
        }

        Affordances {
            selected_tab: tabs.first().map(|t| t.index),
            tabs,
            left_buttons,
            right_buttons,
        }
    }
}
