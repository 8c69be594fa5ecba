//! Remotely configured shell settings: tabs and navigation buttons.
//!
//! Only the keys the shell acts on are modelled. Styling keys (`navbar`,
//! `tabbar`) and anything else in the `settings` object are ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellSettings {
    #[serde(default)]
    pub tabs: Vec<TabSpec>,
    #[serde(default)]
    pub buttons: Vec<ButtonSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSpec {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "icon_ios")]
    pub icon: Option<String>,
    /// Path visited when the tab is selected.
    #[serde(default = "root_path")]
    pub visit: String,
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonSide {
    Left,
    Right,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSpec {
    /// The button is offered only while a Screen with this path is active.
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "icon_ios")]
    pub icon: Option<String>,
    #[serde(default = "unknown_side")]
    pub side: ButtonSide,
    #[serde(default)]
    pub visit: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub protected: bool,
}

impl ShellSettings {
    /// Lenient parse of a `settings` object. A value that does not fit the
    /// model degrades to `None` and is logged.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match serde_json::from_value(value) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed settings object");
                None
            }
        }
    }
}

fn root_path() -> String {
    "/".to_string()
}

fn unknown_side() -> ButtonSide {
    ButtonSide::Unknown
}
