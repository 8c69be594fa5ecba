//! Load failure taxonomy.
//!
//! `LoadError` is the closed set a content engine may report. Anything else
//! that comes back from a loader is kept as an unclassified failure and gets
//! the generic presentation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A classified content load failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadError {
    /// The remote answered with a non-success status.
    #[error("HTTP request failed with status {status}")]
    Http { status: u16 },
    /// The transport could not complete the request.
    #[error("network failure: {reason}")]
    NetworkFailure { reason: String },
    /// The transport gave up after its deadline.
    #[error("request timed out")]
    TimeoutFailure,
    /// The response was not something the content engine can render.
    #[error("unexpected content type: {content_type}")]
    ContentTypeMismatch { content_type: String },
    /// Any other failure during the load stage.
    #[error("page load failed: {reason}")]
    PageLoadFailure { reason: String },
}

impl LoadError {
    pub fn http(status: u16) -> Self {
        Self::Http { status }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            _ => None,
        }
    }
}

/// Why a Screen failed to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Load(LoadError),
    /// Error raised outside the taxonomy. Keeps its display text only.
    Unclassified(String),
}

impl FailureKind {
    /// Classify an error returned through a trait seam.
    pub fn from_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<LoadError>() {
            Some(load) => Self::Load(load.clone()),
            None => Self::Unclassified(format!("{:#}", err)),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Load(err) => err.to_string(),
            Self::Unclassified(msg) => msg.clone(),
        }
    }
}

impl From<LoadError> for FailureKind {
    fn from(err: LoadError) -> Self {
        Self::Load(err)
    }
}

/// Errors raised while turning a path configuration document into rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule has no patterns")]
    NoPatterns,
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("failed to parse path configuration: {0}")]
    Json(#[from] serde_json::Error),
}
