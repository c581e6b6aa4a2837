//! Events emitted by the failover services.

use dispatch_resilience_core::{DispatchError, ResilienceEvent};
use std::time::Instant;

/// Events emitted by [`RoundRobinFailover`](crate::RoundRobinFailover) and
/// [`ThresholdFailover`](crate::ThresholdFailover).
#[derive(Debug, Clone)]
pub enum FailoverEvent {
    /// A backend accepted the dispatch.
    Succeeded {
        /// Name of the failover instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Index of the backend that succeeded.
        backend: usize,
        /// Attempts made in this call, including the successful one.
        attempts: usize,
    },

    /// A backend failed with an error that does not end the call's budget.
    AttemptFailed {
        /// Name of the failover instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Index of the failing backend.
        backend: usize,
        /// The backend's error.
        error: DispatchError,
    },

    /// The cursor moved to another backend.
    CursorAdvanced {
        /// Name of the failover instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Backend the cursor moved away from.
        from: usize,
        /// Backend the cursor now points to.
        to: usize,
    },

    /// A timeout was counted against the active backend.
    TimeoutRecorded {
        /// Name of the failover instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Index of the backend that timed out.
        backend: usize,
        /// Consecutive timeouts after this one.
        consecutive: usize,
    },

    /// The caller's context was cancelled or expired; the call stopped.
    BudgetExhausted {
        /// Name of the failover instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Backend in flight when the budget ran out.
        backend: usize,
    },

    /// A round-robin sweep tried every backend without success.
    AllBackendsFailed {
        /// Name of the failover instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Backends attempted.
        attempts: usize,
    },

    /// A recovery task was spawned after a threshold failover.
    RecoverySpawned {
        /// Name of the failover instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Backend index the failover moved to.
        failed_over_to: usize,
    },
}

impl ResilienceEvent for FailoverEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::AttemptFailed { .. } => "attempt_failed",
            Self::CursorAdvanced { .. } => "cursor_advanced",
            Self::TimeoutRecorded { .. } => "timeout_recorded",
            Self::BudgetExhausted { .. } => "budget_exhausted",
            Self::AllBackendsFailed { .. } => "all_backends_failed",
            Self::RecoverySpawned { .. } => "recovery_spawned",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Succeeded { timestamp, .. }
            | Self::AttemptFailed { timestamp, .. }
            | Self::CursorAdvanced { timestamp, .. }
            | Self::TimeoutRecorded { timestamp, .. }
            | Self::BudgetExhausted { timestamp, .. }
            | Self::AllBackendsFailed { timestamp, .. }
            | Self::RecoverySpawned { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::Succeeded { pattern_name, .. }
            | Self::AttemptFailed { pattern_name, .. }
            | Self::CursorAdvanced { pattern_name, .. }
            | Self::TimeoutRecorded { pattern_name, .. }
            | Self::BudgetExhausted { pattern_name, .. }
            | Self::AllBackendsFailed { pattern_name, .. }
            | Self::RecoverySpawned { pattern_name, .. } => pattern_name,
        }
    }
}
