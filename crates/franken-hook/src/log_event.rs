//! Structured diagnostic events about the instrumentation itself.
//!
//! These are distinct from activity records: an activity record describes
//! what host code did, a `HookLogEvent` describes what the hook layer did
//! (installed, skipped, contained a failure).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Diagnostics kept per buffer. Once full, the oldest event is dropped.
pub const MAX_LOG_EVENTS: usize = 1024;

/// Structured log event emitted by the interceptor and the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookLogEvent {
    pub trace_id: String,
    pub component: String,
    pub event: String,
    pub outcome: String,
    pub error_code: Option<String>,
    pub detail: String,
}

impl HookLogEvent {
    pub fn new(
        trace_id: &str,
        component: &str,
        event: &str,
        outcome: &str,
        error_code: Option<&str>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            trace_id: trace_id.to_string(),
            component: component.to_string(),
            event: event.to_string(),
            outcome: outcome.to_string(),
            error_code: error_code.map(str::to_string),
            detail: detail.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error_code.is_some()
    }
}

/// Append `event`, evicting from the front past [`MAX_LOG_EVENTS`].
pub(crate) fn push_bounded(events: &mut VecDeque<HookLogEvent>, event: HookLogEvent) {
    while events.len() >= MAX_LOG_EVENTS {
        events.pop_front();
    }
    events.push_back(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_is_keyed_on_error_code() {
        let ok = HookLogEvent::new("t", "interceptor", "install", "installed", None, "Window#0.fetch");
        let failed = HookLogEvent::new(
            "t",
            "interceptor",
            "install",
            "rejected",
            Some("FE-HOOK-0001"),
            "Window#0.fetch",
        );
        assert!(!ok.is_failure());
        assert!(failed.is_failure());
    }

    #[test]
    fn serde_roundtrip() {
        let event = HookLogEvent::new("t", "recorder", "sink_failed", "fallback", Some("FE-HOOK-0202"), "x");
        let json = serde_json::to_string(&event).expect("serialize");
        let restored: HookLogEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(event, restored);
    }

    #[test]
    fn bounded_buffer_keeps_newest() {
        let mut events = VecDeque::new();
        for n in 0..MAX_LOG_EVENTS + 5 {
            push_bounded(
                &mut events,
                HookLogEvent::new("t", "interceptor", "cascade", "installed", None, n.to_string()),
            );
        }
        assert_eq!(events.len(), MAX_LOG_EVENTS);
        assert_eq!(events.front().unwrap().detail, "5");
        assert_eq!(events.back().unwrap().detail, (MAX_LOG_EVENTS + 4).to_string());
    }
}
