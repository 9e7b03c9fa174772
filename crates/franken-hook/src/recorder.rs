//! Event recorder: builds, deduplicates, and routes activity records.
//!
//! Every observed operation goes through [`EventRecorder::record`]:
//!
//! 1. Logging disabled: nothing is rendered, compared, or emitted, and the
//!    dedup baseline is left as it was.
//! 2. The payload renders to canonical JSON. No payload renders as
//!    [`NO_PAYLOAD`]; a payload that cannot render becomes
//!    [`UNSERIALIZABLE_PAYLOAD`].
//! 3. Content equal to the baseline (the last *emitted* content) is
//!    suppressed. Anything else is stamped, emitted at the live severity,
//!    and becomes the new baseline.
//! 4. With `debugger_on_event` set, the breakpoint handler fires after the
//!    decision, for duplicates and disabled logging alike.
//!
//! `record` has no error path. Serialization and sink failures are
//! recovered here and surface only as stats and [`HookLogEvent`]s.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{HookConfig, Severity};
use crate::error::SerializationError;
use crate::log_event::{HookLogEvent, push_bounded};
use crate::sink::ActivitySink;

const COMPONENT: &str = "event_recorder";

/// Default trace id for diagnostics.
pub const DEFAULT_TRACE_ID: &str = "franken-hook";

/// Rendered payload of an operation that carries none.
pub const NO_PAYLOAD: &str = "<none>";

/// Rendered payload when rendering failed.
pub const UNSERIALIZABLE_PAYLOAD: &str = "<unserializable>";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Kind of observed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Get,
    Set,
    Call,
}

impl OpKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Call => "call",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record content without its timestamp; the dedup baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordContent {
    pub op: OpKind,
    pub target: String,
    pub member: String,
    pub payload: String,
}

/// One emitted observation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub timestamp: String,
    pub op: OpKind,
    pub target: String,
    pub member: String,
    pub payload: String,
}

impl ActivityRecord {
    fn stamped(timestamp: String, content: &RecordContent) -> Self {
        Self {
            timestamp,
            op: content.op,
            target: content.target.clone(),
            member: content.member.clone(),
            payload: content.payload.clone(),
        }
    }

    pub fn content(&self) -> RecordContent {
        RecordContent {
            op: self.op,
            target: self.target.clone(),
            member: self.member.clone(),
            payload: self.payload.clone(),
        }
    }

    /// Unformatted single-line rendering.
    pub fn plain_line(&self) -> String {
        format!(
            "[{}] {} {}.{} {}",
            self.timestamp, self.op, self.target, self.member, self.payload
        )
    }
}

/// What `record` did with an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Emitted,
    Suppressed,
    Disabled,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Something that renders to a canonical log string.
pub trait PayloadRender {
    fn render(&self) -> Result<String, SerializationError>;
}

impl PayloadRender for serde_json::Value {
    fn render(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Renders any `Serialize` value as JSON.
pub struct JsonPayload<'a, T: Serialize + ?Sized>(pub &'a T);

impl<T: Serialize + ?Sized> PayloadRender for JsonPayload<'_, T> {
    fn render(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(self.0)?)
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of record timestamps.
pub trait Clock {
    fn stamp(&self) -> String;
}

/// Wallclock RFC 3339 UTC plus monotonic milliseconds since creation,
/// e.g. `2026-10-14T08:00:00.000Z+12.345`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn stamp(&self) -> String {
        let wall = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let monotonic_ms = self.origin.elapsed().as_secs_f64() * 1000.0;
        format!("{wall}+{monotonic_ms:.3}")
    }
}

/// Constant timestamp for deterministic tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedClock(pub String);

impl Clock for FixedClock {
    fn stamp(&self) -> String {
        self.0.clone()
    }
}

// ---------------------------------------------------------------------------
// Breakpoints
// ---------------------------------------------------------------------------

/// Interactive break requested on an observed operation.
pub trait BreakpointHandler {
    fn trigger(&mut self, op: OpKind, target: &str, member: &str);
}

/// Default handler: announces the break on the `tracing` stream so an
/// attached debugger or operator can act on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBreakpoint;

impl BreakpointHandler for LogBreakpoint {
    fn trigger(&mut self, op: OpKind, target: &str, member: &str) {
        tracing::warn!(
            target: "franken_hook::breakpoint",
            op = op.as_str(),
            target_label = target,
            member,
            "breakpoint requested"
        );
    }
}

// ---------------------------------------------------------------------------
// EventRecorder
// ---------------------------------------------------------------------------

/// Counters over the recorder's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderStats {
    pub emitted: u64,
    pub suppressed: u64,
    pub disabled: u64,
    pub serialization_failures: u64,
    pub sink_failures: u64,
    pub breakpoints: u64,
}

/// Timestamps, deduplicates, and routes activity records.
pub struct EventRecorder {
    config: Arc<HookConfig>,
    sink: Box<dyn ActivitySink>,
    clock: Box<dyn Clock>,
    breakpoint: Box<dyn BreakpointHandler>,
    baseline: Option<RecordContent>,
    stats: RecorderStats,
    log_events: VecDeque<HookLogEvent>,
    trace_id: String,
}

impl fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecorder")
            .field("config", &self.config)
            .field("sink", &self.sink.name())
            .field("baseline", &self.baseline)
            .field("stats", &self.stats)
            .field("trace_id", &self.trace_id)
            .finish_non_exhaustive()
    }
}

impl EventRecorder {
    pub fn new(config: Arc<HookConfig>, sink: Box<dyn ActivitySink>) -> Self {
        Self {
            config,
            sink,
            clock: Box::new(SystemClock::default()),
            breakpoint: Box::new(LogBreakpoint),
            baseline: None,
            stats: RecorderStats::default(),
            log_events: VecDeque::new(),
            trace_id: DEFAULT_TRACE_ID.to_string(),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_breakpoint(mut self, breakpoint: Box<dyn BreakpointHandler>) -> Self {
        self.breakpoint = breakpoint;
        self
    }

    pub fn with_trace_id(mut self, trace_id: &str) -> Self {
        self.trace_id = trace_id.to_string();
        self
    }

    /// Observe one operation.
    pub fn record(
        &mut self,
        op: OpKind,
        target: &str,
        member: &str,
        payload: Option<&dyn PayloadRender>,
    ) -> RecordOutcome {
        let outcome = if self.config.logging_enabled() {
            let content = RecordContent {
                op,
                target: target.to_string(),
                member: member.to_string(),
                payload: self.render_payload(target, member, payload),
            };
            if self.baseline.as_ref() == Some(&content) {
                self.stats.suppressed += 1;
                RecordOutcome::Suppressed
            } else {
                let record = ActivityRecord::stamped(self.clock.stamp(), &content);
                self.deliver(self.config.severity(), &record);
                self.baseline = Some(content);
                RecordOutcome::Emitted
            }
        } else {
            self.stats.disabled += 1;
            RecordOutcome::Disabled
        };

        if self.config.debugger_on_event() {
            self.stats.breakpoints += 1;
            self.breakpoint.trigger(op, target, member);
        }
        outcome
    }

    fn render_payload(
        &mut self,
        target: &str,
        member: &str,
        payload: Option<&dyn PayloadRender>,
    ) -> String {
        let Some(payload) = payload else {
            return NO_PAYLOAD.to_string();
        };
        match payload.render() {
            Ok(rendered) => rendered,
            Err(error) => {
                self.stats.serialization_failures += 1;
                self.push_log(
                    "serialization_failed",
                    "marker_substituted",
                    Some(error.stable_code()),
                    format!("{target}.{member}: {error}"),
                );
                UNSERIALIZABLE_PAYLOAD.to_string()
            }
        }
    }

    fn deliver(&mut self, severity: Severity, record: &ActivityRecord) {
        self.stats.emitted += 1;
        if let Err(error) = self.sink.emit(severity, record) {
            self.stats.sink_failures += 1;
            eprintln!("{severity} {}", record.plain_line());
            let detail = format!("{}: {error}", self.sink.name());
            self.push_log("sink_failed", "fallback_printed", Some(error.stable_code()), detail);
        }
    }

    fn push_log(&mut self, event: &str, outcome: &str, error_code: Option<&str>, detail: String) {
        let event =
            HookLogEvent::new(&self.trace_id, COMPONENT, event, outcome, error_code, detail);
        push_bounded(&mut self.log_events, event);
    }

    pub fn config(&self) -> &Arc<HookConfig> {
        &self.config
    }

    pub fn stats(&self) -> &RecorderStats {
        &self.stats
    }

    /// The dedup baseline: content of the last emitted record.
    pub fn last_content(&self) -> Option<&RecordContent> {
        self.baseline.as_ref()
    }

    /// Forget the baseline so the next record is emitted even if it repeats.
    pub fn reset_baseline(&mut self) {
        self.baseline = None;
    }

    /// Recorder diagnostics, oldest first.
    pub fn log_events(&self) -> &VecDeque<HookLogEvent> {
        &self.log_events
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }
}
