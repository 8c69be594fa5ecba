//! Path rules and the `turbo.json` document they are read from.

use crate::error::RuleError;
use crate::properties::{PropertyMap, PropertyValue};
use crate::settings::ShellSettings;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use url::Url;

/// One rule as it appears on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRule {
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// A compiled rule. Immutable once built.
#[derive(Debug, Clone)]
pub struct PathRule {
    patterns: Vec<Regex>,
    query: Vec<(String, Regex)>,
    properties: PropertyMap,
}

impl PathRule {
    pub fn new(patterns: &[&str], properties: PropertyMap) -> Result<Self, RuleError> {
        if patterns.is_empty() {
            return Err(RuleError::NoPatterns);
        }
        let patterns = patterns
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            query: Vec::new(),
            properties,
        })
    }

    /// Additionally require query parameter `key` to match `pattern`.
    pub fn with_query(mut self, key: &str, pattern: &str) -> Result<Self, RuleError> {
        self.query.push((key.to_string(), compile(pattern)?));
        Ok(self)
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Any pattern must match the path; every query constraint must match
    /// the value of its parameter.
    pub fn matches(&self, url: &Url) -> bool {
        let path = url.path();
        if !self.patterns.iter().any(|re| re.is_match(path)) {
            return false;
        }
        self.query.iter().all(|(key, re)| {
            url.query_pairs()
                .find(|(k, _)| k.as_ref() == key.as_str())
                .is_some_and(|(_, v)| re.is_match(&v))
        })
    }
}

impl TryFrom<RawRule> for PathRule {
    type Error = RuleError;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        let mut properties = PropertyMap::new();
        for (key, value) in &raw.properties {
            match PropertyValue::from_json(value) {
                Some(v) => properties.insert(key.clone(), v),
                None => tracing::warn!(%key, "dropping non-scalar rule property"),
            }
        }

        let patterns: Vec<&str> = raw.patterns.iter().map(String::as_str).collect();
        let mut rule = PathRule::new(&patterns, properties)?;
        for (key, pattern) in &raw.query {
            rule = rule.with_query(key, pattern)?;
        }
        Ok(rule)
    }
}

fn compile(pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    settings: Option<Value>,
    #[serde(default)]
    rules: Vec<RawRule>,
}

/// What one configuration source contributed.
#[derive(Debug, Clone, Default)]
pub struct ParsedSource {
    pub settings: Option<ShellSettings>,
    pub rules: Vec<PathRule>,
}

/// Parse a whole document. Invalid JSON fails the source; an invalid rule
/// is skipped on its own.
pub fn parse_document(text: &str) -> Result<ParsedSource, RuleError> {
    let doc: ConfigDocument = serde_json::from_str(text)?;

    let mut rules = Vec::with_capacity(doc.rules.len());
    for (index, raw) in doc.rules.into_iter().enumerate() {
        match PathRule::try_from(raw) {
            Ok(rule) => rules.push(rule),
            Err(e) => tracing::warn!(index, error = %e, "skipping path rule"),
        }
    }

    Ok(ParsedSource {
        settings: doc.settings.and_then(ShellSettings::from_value),
        rules,
    })
}
