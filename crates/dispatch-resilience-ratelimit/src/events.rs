use dispatch_resilience_core::ResilienceEvent;
use std::time::Instant;

/// Events emitted by the rate-limit gate.
#[derive(Debug, Clone)]
pub enum RateLimitEvent {
    /// The limiter allowed the dispatch.
    Permitted {
        pattern_name: String,
        timestamp: Instant,
        key: String,
    },
    /// The limiter rejected the dispatch.
    Limited {
        pattern_name: String,
        timestamp: Instant,
        key: String,
    },
    /// The limiter itself failed; the dispatch was not sent.
    LimiterFailed {
        pattern_name: String,
        timestamp: Instant,
        key: String,
        error: String,
    },
}

impl ResilienceEvent for RateLimitEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimitEvent::Permitted { .. } => "permitted",
            RateLimitEvent::Limited { .. } => "limited",
            RateLimitEvent::LimiterFailed { .. } => "limiter_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimitEvent::Permitted { timestamp, .. }
            | RateLimitEvent::Limited { timestamp, .. }
            | RateLimitEvent::LimiterFailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RateLimitEvent::Permitted { pattern_name, .. }
            | RateLimitEvent::Limited { pattern_name, .. }
            | RateLimitEvent::LimiterFailed { pattern_name, .. } => pattern_name,
        }
    }
}
