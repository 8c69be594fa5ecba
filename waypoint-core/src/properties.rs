//! Path properties: the raw scalar map produced by rule matching, and the
//! typed view the routing engine reads from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A scalar property value. Rules cannot carry arrays or objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    /// Convert a JSON value, rejecting anything that is not a scalar.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Merged properties for one URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap(BTreeMap<String, PropertyValue>);

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropertyValue::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.0.insert(key.into(), value);
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merge_from(&mut self, other: &PropertyMap) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, PropertyValue)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, PropertyValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Presentation {
    #[default]
    Default,
    Modal,
}

/// Action override a rule may force on every visit to a matching path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyAction {
    Replace,
    Restore,
}

/// The recognised keys of a [`PropertyMap`]. Unknown keys and unknown values
/// of known keys are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathProperties {
    pub presentation: Presentation,
    pub action: Option<PropertyAction>,
}

impl PathProperties {
    pub const PRESENTATION: &'static str = "presentation";
    pub const ACTION: &'static str = "action";

    pub fn is_modal(&self) -> bool {
        self.presentation == Presentation::Modal
    }
}

impl From<&PropertyMap> for PathProperties {
    fn from(map: &PropertyMap) -> Self {
        let presentation = match map.get_str(Self::PRESENTATION) {
            Some("modal") => Presentation::Modal,
            _ => Presentation::Default,
        };
        let action = match map.get_str(Self::ACTION) {
            Some("replace") => Some(PropertyAction::Replace),
            Some("restore") => Some(PropertyAction::Restore),
            _ => None,
        };
        Self {
            presentation,
            action,
        }
    }
}
