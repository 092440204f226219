//! In-process security event log.
//!
//! A bounded, append-only buffer of security-relevant outcomes (auth
//! failures, rejected bodies, rate-limit hits). Events are mirrored to
//! `tracing` for the operational log; the buffer exists so the ops endpoint
//! can show recent history and evaluate the alert threshold without a log
//! aggregator. State is process-local and lost on restart.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::metrics;

/// Hard cap on buffered events. When exceeded the oldest half is dropped
/// in bulk, keeping truncation off the per-event hot path.
const MAX_EVENTS: usize = 1000;
const KEEP_ON_TRUNCATE: usize = MAX_EVENTS / 2;

/// Trailing window consulted by [`SecurityLog::should_alert`].
const ALERT_WINDOW_MINUTES: i64 = 15;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A single recorded security event. Never mutated after insertion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Bounded security event buffer.
///
/// Constructed once by the composition root and shared via `Arc`; not a
/// module global, so tests get isolated instances.
pub struct SecurityLog {
    enabled: bool,
    alert_threshold: usize,
    events: Mutex<Vec<SecurityEvent>>,
}

impl SecurityLog {
    pub fn new(enabled: bool, alert_threshold: usize) -> Self {
        Self {
            enabled,
            alert_threshold,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Append an event with the current timestamp. No-op when monitoring
    /// is disabled.
    pub fn record(
        &self,
        severity: Severity,
        message: impl Into<String>,
        ip: Option<&str>,
        user_agent: Option<&str>,
        detail: Option<String>,
    ) {
        if !self.enabled {
            return;
        }

        let message = message.into();
        match severity {
            Severity::Info => {
                tracing::info!(ip = ip.unwrap_or("-"), "{message}");
            }
            Severity::Warning => {
                tracing::warn!(ip = ip.unwrap_or("-"), detail = ?detail, "{message}");
            }
            Severity::Error => {
                tracing::error!(ip = ip.unwrap_or("-"), detail = ?detail, "{message}");
            }
        }
        metrics::record_security_event(severity.as_str());

        let event = SecurityEvent {
            timestamp: Utc::now(),
            severity,
            message,
            ip: ip.map(str::to_string),
            user_agent: user_agent.map(str::to_string),
            detail,
        };

        let mut events = self.events.lock();
        events.push(event);
        if events.len() > MAX_EVENTS {
            let drop = events.len() - KEEP_ON_TRUNCATE;
            events.drain(..drop);
        }
    }

    /// The most recent `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<SecurityEvent> {
        let events = self.events.lock();
        let start = events.len().saturating_sub(limit);
        events[start..].to_vec()
    }

    /// Count of warning/error events within the trailing window.
    pub fn failed_attempts(&self, window: Duration) -> usize {
        let cutoff = Utc::now() - window;
        self.events
            .lock()
            .iter()
            .filter(|e| e.severity != Severity::Info && e.timestamp >= cutoff)
            .count()
    }

    /// True when failures within the last 15 minutes exceed the threshold.
    pub fn should_alert(&self) -> bool {
        self.failed_attempts(Duration::minutes(ALERT_WINDOW_MINUTES)) > self.alert_threshold
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> SecurityLog {
        SecurityLog::new(true, 3)
    }

    #[test]
    fn disabled_log_records_nothing() {
        let log = SecurityLog::new(false, 3);
        log.record(Severity::Error, "boom", None, None, None);
        assert!(log.is_empty());
    }

    #[test]
    fn recent_returns_newest_events_oldest_first() {
        let log = log();
        for i in 0..5 {
            log.record(Severity::Info, format!("event {i}"), None, None, None);
        }
        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "event 3");
        assert_eq!(recent[1].message, "event 4");
    }

    #[test]
    fn buffer_truncates_to_recent_half() {
        let log = log();
        for i in 0..(MAX_EVENTS + 1) {
            log.record(Severity::Info, format!("event {i}"), None, None, None);
        }
        assert_eq!(log.len(), KEEP_ON_TRUNCATE);
        let recent = log.recent(1);
        assert_eq!(recent[0].message, format!("event {MAX_EVENTS}"));
    }

    #[test]
    fn failed_attempts_ignores_info() {
        let log = log();
        log.record(Severity::Info, "fine", None, None, None);
        log.record(Severity::Warning, "hmm", None, None, None);
        log.record(Severity::Error, "bad", None, None, None);
        assert_eq!(log.failed_attempts(Duration::minutes(5)), 2);
    }

    #[test]
    fn alert_requires_exceeding_threshold() {
        let log = log();
        for _ in 0..3 {
            log.record(Severity::Warning, "failure", None, None, None);
        }
        assert!(!log.should_alert());
        log.record(Severity::Warning, "failure", None, None, None);
        assert!(log.should_alert());
    }

    #[test]
    fn events_carry_context() {
        let log = log();
        log.record(
            Severity::Warning,
            "invalid key",
            Some("10.0.0.1"),
            Some("curl/8"),
            Some("key=abc".to_string()),
        );
        let events = log.recent(1);
        assert_eq!(events[0].ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(events[0].user_agent.as_deref(), Some("curl/8"));
        assert_eq!(events[0].detail.as_deref(), Some("key=abc"));
    }
}
