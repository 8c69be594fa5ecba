use crate::error::FailureKind;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

pub type ScreenId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    Pending,
    Loaded,
    Failed(FailureKind),
}

/// One content-bearing stack entry. Bound to a single URL for its lifetime:
/// refreshing a Screen means creating a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    id: ScreenId,
    url: Url,
    pub load_state: LoadState,
}

impl Screen {
    pub fn new(url: Url) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            load_state: LoadState::Pending,
        }
    }

    pub fn id(&self) -> ScreenId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded
    }
}
