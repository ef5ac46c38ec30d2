//! Idle tracking types

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Idle monitor phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdlePhase {
    #[default]
    Disabled,
    Armed,
    Warning,
    Expired,
}

impl_domain_status_conversions!(IdlePhase {
    Disabled => "disabled",
    Armed => "armed",
    Warning => "warning",
    Expired => "expired",
});

/// IdleState - countdown since the last activity signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdleState {
    pub phase: IdlePhase,
    pub last_activity_ms: i64, // Epoch ms of the last activity signal
    pub remaining_secs: u64,
    pub timeout_secs: u64,
}

impl IdleState {
    /// Fresh countdown
    #[must_use]
    pub fn armed(now_ms: i64, timeout_secs: u64) -> Self {
        Self {
            phase: IdlePhase::Armed,
            last_activity_ms: now_ms,
            remaining_secs: timeout_secs,
            timeout_secs,
        }
    }

    /// Phase for a given remaining time
    #[must_use]
    pub fn phase_for(remaining_secs: u64, warning_secs: u64) -> IdlePhase {
        if remaining_secs == 0 {
            IdlePhase::Expired
        } else if remaining_secs <= warning_secs {
            IdlePhase::Warning
        } else {
            IdlePhase::Armed
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.phase == IdlePhase::Expired
    }
}
