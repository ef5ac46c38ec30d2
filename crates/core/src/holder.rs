//! In-memory token holder and attachment diagnostics

use std::sync::Arc;

use authlab_domain::AttachmentRecord;
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct HolderState {
    token: Option<String>,
    last: AttachmentRecord,
}

/// The tab's current access token plus what the interceptor last did
///
/// The active provider keeps the token in step with its session; the
/// interceptor reads it first and falls back to storage.
#[derive(Debug, Clone, Default)]
pub struct TokenHolder {
    inner: Arc<RwLock<HolderState>>,
}

impl TokenHolder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_token(&self, token: Option<String>) {
        self.inner.write().token = token.filter(|t| !t.is_empty());
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.read().token.clone()
    }

    pub fn record(&self, record: AttachmentRecord) {
        self.inner.write().last = record;
    }

    /// Last attachment decision
    #[must_use]
    pub fn last_attachment(&self) -> AttachmentRecord {
        self.inner.read().last.clone()
    }
}
