//! Tab sync bus
//!
//! Every broadcast goes out twice: on the named channel and as a write of
//! the envelope to the shared `auth:bc` key, whose change event only other
//! tabs observe. Receivers drop their own messages and the second copy of
//! anything already seen, keyed by `(from, type, at, seq)`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use authlab_common::storage::{KeyValueStore, StoreView};
use authlab_common::time::Clock;
use authlab_domain::constants::TAB_SYNC_STORAGE_KEY;
use authlab_domain::{Result, TabMessage, TabMessageKind, TabSyncConfig};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::browser::{ChannelPort, Tab};

const SEEN_CAPACITY: usize = 64;
const DELIVERY_CAPACITY: usize = 64;

/// Which transport delivered a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Channel,
    StorageEvent,
}

struct BusInner {
    tab_id: String,
    port: ChannelPort,
    local: StoreView,
    clock: Arc<dyn Clock>,
    capacity: usize,
    recent: Mutex<VecDeque<TabMessage>>,
    seen: Mutex<VecDeque<(String, TabMessageKind, i64, u64)>>,
    next_seq: AtomicU64,
    delivered: broadcast::Sender<TabMessage>,
    cancel: CancellationToken,
}

impl Drop for BusInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl BusInner {
    fn record(&self, message: &TabMessage) {
        let mut recent = self.recent.lock();
        recent.push_back(message.clone());
        while recent.len() > self.capacity {
            recent.pop_front();
        }
    }

    fn accept(&self, raw: &str, via: Transport) {
        let message: TabMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(err) => {
                debug!(tab_id = %self.tab_id, ?via, error = %err, "ignoring malformed tab message");
                return;
            }
        };
        if message.from == self.tab_id {
            return;
        }

        {
            let key = message.dedupe_key();
            let mut seen = self.seen.lock();
            if seen.contains(&key) {
                return;
            }
            seen.push_back(key);
            while seen.len() > SEEN_CAPACITY {
                seen.pop_front();
            }
        }

        debug!(tab_id = %self.tab_id, from = %message.from, kind = %message.kind, ?via, "tab message received");
        self.record(&message);
        let _ = self.delivered.send(message);
    }
}

/// Cross-tab message bus for one tab, cheap to clone
#[derive(Clone)]
pub struct TabSyncBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for TabSyncBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabSyncBus").field("tab_id", &self.inner.tab_id).finish_non_exhaustive()
    }
}

/// Keeps an [`TabSyncBus::on_message`] handler alive; dropping it stops the
/// handler
#[must_use = "the handler stops when the subscription is dropped"]
#[derive(Debug)]
pub struct Subscription {
    _guard: DropGuard,
}

impl TabSyncBus {
    /// Join the bus and start listening on both transports
    ///
    /// Must be called inside a tokio runtime; both listeners are spawned
    /// tasks.
    pub fn start(tab: &Tab, config: &TabSyncConfig) -> Self {
        let (delivered, _) = broadcast::channel(DELIVERY_CAPACITY);
        let inner = Arc::new(BusInner {
            tab_id: tab.id().to_string(),
            port: tab.hub().channel(&config.channel, tab.id()),
            local: tab.local_store().clone(),
            clock: tab.clock().clone(),
            capacity: config.recent_capacity.max(1),
            recent: Mutex::new(VecDeque::new()),
            seen: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(1),
            delivered,
            cancel: CancellationToken::new(),
        });

        Self::spawn_channel_listener(&inner);
        Self::spawn_storage_listener(&inner);
        debug!(tab_id = %inner.tab_id, channel = %config.channel, "tab sync bus started");

        Self { inner }
    }

    fn spawn_channel_listener(inner: &Arc<BusInner>) {
        let mut listener = inner.port.listen();
        let cancel = inner.cancel.clone();
        let weak: Weak<BusInner> = Arc::downgrade(inner);
        tokio::spawn(async move {
            loop {
                let raw = tokio::select! {
                    () = cancel.cancelled() => break,
                    raw = listener.recv() => raw,
                };
                let Some(raw) = raw else { break };
                let Some(inner) = weak.upgrade() else { break };
                inner.accept(&raw, Transport::Channel);
            }
        });
    }

    fn spawn_storage_listener(inner: &Arc<BusInner>) {
        let mut events = inner.local.foreign_events();
        let cancel = inner.cancel.clone();
        let weak: Weak<BusInner> = Arc::downgrade(inner);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                let Some(event) = event else { break };
                if event.key != TAB_SYNC_STORAGE_KEY {
                    continue;
                }
                let Some(raw) = event.new_value else { continue };
                let Some(inner) = weak.upgrade() else { break };
                inner.accept(&raw, Transport::StorageEvent);
            }
        });
    }

    pub fn tab_id(&self) -> &str {
        &self.inner.tab_id
    }

    /// Send a message to every other tab
    ///
    /// The storage write is the fallback transport; its failure is returned
    /// after the channel post has already gone out.
    pub fn broadcast(&self, kind: TabMessageKind, payload: Value) -> Result<TabMessage> {
        let message = TabMessage {
            from: self.inner.tab_id.clone(),
            kind,
            payload,
            at: self.inner.clock.now_millis(),
            seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        let raw = serde_json::to_string(&message)?;

        let listeners = self.inner.port.post(&raw);
        debug!(tab_id = %self.inner.tab_id, %kind, listeners, "tab message sent");
        self.inner.record(&message);
        self.inner.local.set(TAB_SYNC_STORAGE_KEY, &raw)?;
        Ok(message)
    }

    /// Broadcast a logout
    pub fn broadcast_logout(&self) -> Result<TabMessage> {
        self.broadcast(TabMessageKind::Logout, Value::Null)
    }

    /// Broadcast a refreshed access token
    pub fn broadcast_refresh(&self, access: &str) -> Result<TabMessage> {
        self.broadcast(TabMessageKind::Refresh, serde_json::json!({ "access": access }))
    }

    /// Raw feed of accepted foreign messages
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TabMessage> {
        self.inner.delivered.subscribe()
    }

    /// Run `handler` for each accepted foreign message
    pub fn on_message<F>(&self, handler: F) -> Subscription
    where
        F: Fn(TabMessage) + Send + Sync + 'static,
    {
        let mut rx = self.inner.delivered.subscribe();
        let token = self.inner.cancel.child_token();
        let cancel = token.clone();
        let tab_id = self.inner.tab_id.clone();
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    () = cancel.cancelled() => break,
                    next = rx.recv() => next,
                };
                match next {
                    Ok(message) => handler(message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(tab_id = %tab_id, skipped, "tab message handler lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription { _guard: token.drop_guard() }
    }

    /// Most recent messages, oldest first
    #[must_use]
    pub fn recent(&self) -> Vec<TabMessage> {
        self.inner.recent.lock().iter().cloned().collect()
    }

    /// Stop both listeners and every handler
    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }
}
