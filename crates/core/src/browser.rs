//! Browser model: shared storage, a broadcast hub, and tabs
//!
//! One [`Browser`] owns what every tab can see (the persistent store and the
//! named-channel hub). Each [`Tab`] owns its in-memory and session-scoped
//! stores and a unique id. Nothing else is shared between tabs.

use std::sync::Arc;

use authlab_common::storage::{KeyValueStore, MemoryStore, SharedStore, StoreView};
use authlab_common::time::{Clock, SystemClock};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

const HUB_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Frame {
    channel: Arc<str>,
    origin: Arc<str>,
    data: Arc<str>,
}

/// Named pub/sub channels between tabs
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<Frame>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    /// Open `name` on behalf of `origin`
    pub fn channel(&self, name: &str, origin: &str) -> ChannelPort {
        ChannelPort { name: Arc::from(name), origin: Arc::from(origin), tx: self.tx.clone() }
    }
}

/// One tab's handle on a named channel
///
/// Posts reach every other port on the same name, never the poster.
#[derive(Debug, Clone)]
pub struct ChannelPort {
    name: Arc<str>,
    origin: Arc<str>,
    tx: broadcast::Sender<Frame>,
}

impl ChannelPort {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Post a message; returns how many listeners could receive it
    pub fn post(&self, data: &str) -> usize {
        let frame =
            Frame { channel: self.name.clone(), origin: self.origin.clone(), data: Arc::from(data) };
        self.tx.send(frame).unwrap_or(0)
    }

    /// Start receiving
    #[must_use]
    pub fn listen(&self) -> ChannelListener {
        ChannelListener { rx: self.tx.subscribe(), name: self.name.clone(), origin: self.origin.clone() }
    }
}

/// Receiving side of a [`ChannelPort`]
#[derive(Debug)]
pub struct ChannelListener {
    rx: broadcast::Receiver<Frame>,
    name: Arc<str>,
    origin: Arc<str>,
}

impl ChannelListener {
    /// Next message from another origin, `None` once the hub is gone
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(frame) if frame.channel != self.name || frame.origin == self.origin => continue,
                Ok(frame) => return Some(frame.data.to_string()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.name, skipped, "broadcast channel lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Everything tabs share
#[derive(Debug, Clone)]
pub struct Browser {
    local: SharedStore,
    hub: BroadcastHub,
    clock: Arc<dyn Clock>,
}

impl Default for Browser {
    fn default() -> Self {
        Self::new()
    }
}

impl Browser {
    /// In-memory persistent store and the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    /// Same, with a chosen clock
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_parts(Arc::new(MemoryStore::new()), clock)
    }

    /// Persistent store backed by `backend` (e.g. a file store)
    #[must_use]
    pub fn with_parts(backend: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { local: SharedStore::new(backend), hub: BroadcastHub::new(), clock }
    }

    /// Open a new tab with empty memory and session stores
    #[must_use]
    pub fn open_tab(&self) -> Tab {
        let id = Uuid::new_v4().to_string();
        debug!(tab_id = %id, "tab opened");
        Tab {
            local: self.local.view(id.clone()),
            id: Arc::from(id),
            memory: Arc::new(MemoryStore::new()),
            session: Arc::new(MemoryStore::new()),
            hub: self.hub.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn local_store(&self) -> &SharedStore {
        &self.local
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}

/// One tab's view of the browser
#[derive(Debug, Clone)]
pub struct Tab {
    id: Arc<str>,
    memory: Arc<MemoryStore>,
    session: Arc<MemoryStore>,
    local: StoreView,
    hub: BroadcastHub,
    clock: Arc<dyn Clock>,
}

impl Tab {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Store that lives as long as the page
    pub fn memory_store(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// Store that survives reloads of this tab only
    pub fn session_store(&self) -> &Arc<MemoryStore> {
        &self.session
    }

    /// Store shared with every tab
    pub fn local_store(&self) -> &StoreView {
        &self.local
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The same tab after a full page load: session store kept, memory lost
    #[must_use]
    pub fn reload(&self) -> Tab {
        Tab { memory: Arc::new(MemoryStore::new()), ..self.clone() }
    }
}
