#![forbid(unsafe_code)]

use std::sync::Arc;

use frankenengine_hook::config::{HookConfig, HookSettings, Severity};
use frankenengine_hook::error::SinkError;
use frankenengine_hook::recorder::{
    ActivityRecord, Clock, EventRecorder, FixedClock, JsonPayload, NO_PAYLOAD, OpKind,
    RecordOutcome, SystemClock,
};
use frankenengine_hook::sink::{ActivitySink, MemorySink};

fn recorder(settings: &HookSettings) -> (EventRecorder, MemorySink, Arc<HookConfig>) {
    let config = HookConfig::shared(settings);
    let sink = MemorySink::new();
    let recorder = EventRecorder::new(Arc::clone(&config), Box::new(sink.clone()))
        .with_clock(Box::new(FixedClock("ts".to_string())));
    (recorder, sink, config)
}

struct ClosedSink;

impl ActivitySink for ClosedSink {
    fn name(&self) -> &str {
        "closed"
    }

    fn emit(&mut self, _severity: Severity, _record: &ActivityRecord) -> Result<(), SinkError> {
        Err(SinkError::Write("pipe closed".to_string()))
    }
}

#[test]
fn severity_change_applies_to_next_emission() {
    let (mut recorder, sink, config) = recorder(&HookSettings::default());
    recorder.record(OpKind::Get, "Screen", "width", None);
    config.set_severity(Severity::Warn);
    recorder.record(OpKind::Get, "Screen", "height", None);

    let severities: Vec<_> = sink.entries().into_iter().map(|e| e.severity).collect();
    assert_eq!(severities, vec![Severity::Info, Severity::Warn]);
}

#[test]
fn disabled_window_leaves_baseline_in_place() {
    let (mut recorder, sink, config) = recorder(&HookSettings::default());
    let args = serde_json::json!(["a"]);
    assert_eq!(
        recorder.record(OpKind::Call, "Window", "fetch", Some(&args)),
        RecordOutcome::Emitted
    );

    config.set_logging_enabled(false);
    let other = serde_json::json!(["b"]);
    assert_eq!(
        recorder.record(OpKind::Call, "Window", "fetch", Some(&other)),
        RecordOutcome::Disabled
    );

    config.set_logging_enabled(true);
    assert_eq!(
        recorder.record(OpKind::Call, "Window", "fetch", Some(&args)),
        RecordOutcome::Suppressed
    );
    assert_eq!(sink.len(), 1);
}

#[test]
fn settings_loaded_from_json_drive_the_recorder() {
    let settings = HookSettings::from_json_str(r#"{"logging_enabled": false}"#).unwrap();
    let (mut recorder, sink, config) = recorder(&settings);
    assert_eq!(
        recorder.record(OpKind::Get, "Navigator", "language", None),
        RecordOutcome::Disabled
    );
    assert!(sink.is_empty());
    assert_eq!(config.snapshot(), settings);
}

#[test]
fn failing_sink_never_propagates() {
    let config = HookConfig::shared(&HookSettings::default());
    let mut recorder = EventRecorder::new(config, Box::new(ClosedSink));
    for member in ["a", "b", "c"] {
        assert_eq!(
            recorder.record(OpKind::Set, "HTMLDocument", member, None),
            RecordOutcome::Emitted
        );
    }
    assert_eq!(recorder.stats().sink_failures, 3);
    assert!(recorder
        .log_events()
        .iter()
        .all(|e| e.error_code.as_deref() == Some("FE-HOOK-0202")));
}

#[test]
fn serializable_structs_render_as_json() {
    #[derive(serde::Serialize)]
    struct Message {
        kind: &'static str,
        id: u32,
    }
    let (mut recorder, sink, _) = recorder(&HookSettings::default());
    let message = Message { kind: "ping", id: 7 };
    recorder.record(OpKind::Call, "Window", "postMessage", Some(&JsonPayload(&message)));
    assert_eq!(sink.records()[0].payload, r#"{"kind":"ping","id":7}"#);
}

#[test]
fn reset_baseline_shows_next_repeat() {
    let (mut recorder, sink, _) = recorder(&HookSettings::default());
    recorder.record(OpKind::Get, "Location", "href", None);
    recorder.reset_baseline();
    recorder.record(OpKind::Get, "Location", "href", None);
    assert_eq!(sink.len(), 2);
    assert_eq!(sink.records()[1].payload, NO_PAYLOAD);
}

#[test]
fn system_clock_stamp_has_wallclock_and_monotonic_parts() {
    let stamp = SystemClock::default().stamp();
    let (wall, monotonic) = stamp.split_once("Z+").expect("separator");
    assert!(chrono::DateTime::parse_from_rfc3339(&format!("{wall}Z")).is_ok());
    let (_, fraction) = monotonic.split_once('.').expect("decimal point");
    assert_eq!(fraction.len(), 3);
}
