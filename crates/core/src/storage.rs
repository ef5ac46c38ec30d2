//! Storage adapter: key derivation and strategy-selected backends
//!
//! Token material lives under `{kind}:{realm}:{clientId}` in one of three
//! backends chosen by [`StorageStrategy`]. The PKCE verifier has to survive
//! the authorization redirect, so under the in-memory strategy it is kept in
//! the session store instead.

use std::sync::Arc;

use authlab_common::storage::KeyValueStore;
use authlab_domain::constants::STORAGE_STRATEGY_KEY;
use authlab_domain::{AuthConfig, Result, StorageStrategy, TokenKind};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::browser::Tab;

/// Realm and client that scope a session's storage keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub realm: String,
    pub client_id: String,
}

impl SessionKeys {
    pub fn new(realm: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self { realm: realm.into(), client_id: client_id.into() }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.realm.clone(), config.client_id.clone())
    }

    /// Full key for `kind`
    #[must_use]
    pub fn key(&self, kind: TokenKind) -> String {
        kind.key(&self.realm, &self.client_id)
    }
}

/// Reads and writes token material for one tab
///
/// Clones share the selected strategy.
#[derive(Debug, Clone)]
pub struct StorageAdapter {
    tab: Tab,
    strategy: Arc<RwLock<StorageStrategy>>,
}

impl StorageAdapter {
    /// Open with the persisted strategy, or `default` when none is stored
    pub fn open(tab: Tab, default: StorageStrategy) -> Self {
        let persisted = match tab.local_store().get(STORAGE_STRATEGY_KEY) {
            Ok(Some(raw)) => match raw.parse::<StorageStrategy>() {
                Ok(strategy) => Some(strategy),
                Err(err) => {
                    warn!(tab_id = %tab.id(), error = %err, "ignoring persisted storage strategy");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(tab_id = %tab.id(), error = %err, "storage strategy unreadable");
                None
            }
        };
        let strategy = persisted.unwrap_or(default);
        debug!(tab_id = %tab.id(), %strategy, "storage adapter opened");
        Self { tab, strategy: Arc::new(RwLock::new(strategy)) }
    }

    #[must_use]
    pub fn strategy(&self) -> StorageStrategy {
        *self.strategy.read()
    }

    pub fn tab(&self) -> &Tab {
        &self.tab
    }

    pub fn read(&self, keys: &SessionKeys, kind: TokenKind) -> Result<Option<String>> {
        let value = self.backend(placement(self.strategy(), kind)).get(&keys.key(kind))?;
        Ok(value.filter(|v| !v.is_empty()))
    }

    pub fn write(&self, keys: &SessionKeys, kind: TokenKind, value: &str) -> Result<()> {
        self.backend(placement(self.strategy(), kind)).set(&keys.key(kind), value)?;
        Ok(())
    }

    pub fn remove(&self, keys: &SessionKeys, kind: TokenKind) -> Result<()> {
        self.backend(placement(self.strategy(), kind)).remove(&keys.key(kind))?;
        Ok(())
    }

    /// Remove every kind of entry for this session
    pub fn clear(&self, keys: &SessionKeys) -> Result<()> {
        for kind in TokenKind::ALL {
            self.remove(keys, kind)?;
        }
        Ok(())
    }

    /// Switch backends, moving this session's entries across
    ///
    /// Entries are copied as whole values and then removed from the old
    /// backend. The choice is persisted for later loads.
    pub fn set_strategy(&self, keys: &SessionKeys, next: StorageStrategy) -> Result<()> {
        let mut current = self.strategy.write();
        let previous = *current;

        if previous != next {
            for kind in TokenKind::ALL {
                let from = placement(previous, kind);
                let to = placement(next, kind);
                if from == to {
                    continue;
                }
                let key = keys.key(kind);
                if let Some(value) = self.backend(from).get(&key)? {
                    self.backend(to).set(&key, &value)?;
                }
                self.backend(from).remove(&key)?;
            }
            *current = next;
            info!(tab_id = %self.tab.id(), from = %previous, to = %next, "storage strategy switched");
        }

        self.tab.local_store().set(STORAGE_STRATEGY_KEY, &next.to_string())?;
        Ok(())
    }

    fn backend(&self, strategy: StorageStrategy) -> &dyn KeyValueStore {
        match strategy {
            StorageStrategy::Memory => self.tab.memory_store().as_ref(),
            StorageStrategy::Session => self.tab.session_store().as_ref(),
            StorageStrategy::Persistent => self.tab.local_store(),
        }
    }
}

fn placement(strategy: StorageStrategy, kind: TokenKind) -> StorageStrategy {
    match (strategy, kind) {
        (StorageStrategy::Memory, TokenKind::PkceVerifier) => StorageStrategy::Session,
        (strategy, _) => strategy,
    }
}
