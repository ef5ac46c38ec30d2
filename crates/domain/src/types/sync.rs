//! Tab sync wire messages

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::impl_domain_status_conversions;

/// Message type on the tab sync bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabMessageKind {
    Logout,
    Refresh,
    Ping,
}

impl_domain_status_conversions!(TabMessageKind {
    Logout => "logout",
    Refresh => "refresh",
    Ping => "ping",
});

/// Envelope exchanged between tabs: `{from, type, payload, at, seq}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabMessage {
    /// Sender tab id
    pub from: String,
    #[serde(rename = "type")]
    pub kind: TabMessageKind,
    #[serde(default)]
    pub payload: Value,
    /// Epoch milliseconds at send time
    pub at: i64,
    /// Per-sender counter; separates messages sent in the same millisecond
    #[serde(default)]
    pub seq: u64,
}

impl TabMessage {
    pub fn logout(from: impl Into<String>, at: i64) -> Self {
        Self { from: from.into(), kind: TabMessageKind::Logout, payload: Value::Null, at, seq: 0 }
    }

    /// Refresh announcement carrying the new access token
    pub fn refresh(from: impl Into<String>, access: &str, at: i64) -> Self {
        Self {
            from: from.into(),
            kind: TabMessageKind::Refresh,
            payload: json!({ "access": access }),
            at,
            seq: 0,
        }
    }

    pub fn ping(from: impl Into<String>, at: i64) -> Self {
        Self { from: from.into(), kind: TabMessageKind::Ping, payload: Value::Null, at, seq: 0 }
    }

    #[must_use]
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// `payload.access` for refresh messages
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.payload.get("access").and_then(Value::as_str)
    }

    /// Identity used to drop the copy that arrives over the second transport
    #[must_use]
    pub fn dedupe_key(&self) -> (String, TabMessageKind, i64, u64) {
        (self.from.clone(), self.kind, self.at, self.seq)
    }
}
