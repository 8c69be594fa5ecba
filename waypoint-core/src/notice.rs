//! Full-screen notices shown in place of a failed Screen's content.

use crate::error::{FailureKind, LoadError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    /// Title of the Screen hosting the notice (the app name).
    pub screen_title: String,
    pub title: String,
    /// Symbol name for the notice icon.
    pub icon: String,
    pub message: String,
}

impl ErrorNotice {
    pub fn for_failure(app_name: &str, failure: &FailureKind) -> Self {
        let (title, icon) = presentation(failure);
        Self {
            screen_title: app_name.to_string(),
            title: title.to_string(),
            icon: icon.to_string(),
            message: failure.message(),
        }
    }
}

fn presentation(failure: &FailureKind) -> (&'static str, &'static str) {
    match failure {
        FailureKind::Load(LoadError::Http { status: 401 }) => ("Login Required", "lock.shield"),
        FailureKind::Load(LoadError::Http { status: 404 }) => {
            ("Page Not Found", "questionmark.circle")
        }
        FailureKind::Load(LoadError::Http { .. }) => {
            ("Problem Loading Page", "exclamationmark.triangle")
        }
        FailureKind::Load(LoadError::NetworkFailure { .. }) => ("Network Failure", "wifi.slash"),
        FailureKind::Load(LoadError::TimeoutFailure) => ("Request Timeout", "clock"),
        FailureKind::Load(LoadError::ContentTypeMismatch { .. }) => {
            ("Content Type Mismatch", "nosign")
        }
        FailureKind::Load(LoadError::PageLoadFailure { .. }) => {
            ("Problem Loading Page", "xmark.square")
        }
        FailureKind::Unclassified(_) => ("Problem Loading Page", "exclamationmark.triangle"),
    }
}
