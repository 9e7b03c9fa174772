//! Activity sinks.
//!
//! A sink performs presentation and transport of emitted records. The core
//! only relies on `emit` returning; an `Err` is contained by the recorder,
//! which falls back to a plain stderr line.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::config::Severity;
use crate::error::SinkError;
use crate::recorder::ActivityRecord;

/// Destination for emitted activity records.
pub trait ActivitySink {
    /// Stable sink name for diagnostics.
    fn name(&self) -> &str;

    fn emit(&mut self, severity: Severity, record: &ActivityRecord) -> Result<(), SinkError>;
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// One record as received by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedRecord {
    pub severity: Severity,
    pub record: ActivityRecord,
}

/// In-process sink; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Rc<RefCell<Vec<EmittedRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<EmittedRecord> {
        self.entries.borrow().clone()
    }

    pub fn records(&self) -> Vec<ActivityRecord> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| entry.record.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl ActivitySink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn emit(&mut self, severity: Severity, record: &ActivityRecord) -> Result<(), SinkError> {
        self.entries
            .try_borrow_mut()
            .map_err(|_| SinkError::Unavailable {
                sink: "memory".to_string(),
                detail: "buffer is borrowed".to_string(),
            })?
            .push(EmittedRecord {
                severity,
                record: record.clone(),
            });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConsoleSink
// ---------------------------------------------------------------------------

/// Console routing: `info` to the standard stream, `warn` and `error` to
/// the diagnostic stream, one line per record.
pub struct ConsoleSink {
    out: Box<dyn Write>,
    err: Box<dyn Write>,
}

impl ConsoleSink {
    pub fn stdio() -> Self {
        Self::with_writers(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    pub fn with_writers(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self { out, err }
    }
}

impl std::fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSink").finish_non_exhaustive()
    }
}

impl ActivitySink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn emit(&mut self, severity: Severity, record: &ActivityRecord) -> Result<(), SinkError> {
        let stream = match severity {
            Severity::Info => &mut self.out,
            Severity::Warn | Severity::Error => &mut self.err,
        };
        writeln!(stream, "{severity:<5} {}", record.plain_line())
            .and_then(|()| stream.flush())
            .map_err(|error| SinkError::Write(error.to_string()))
    }
}

// ---------------------------------------------------------------------------
// TracingSink
// ---------------------------------------------------------------------------

/// Routes records into `tracing` at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ActivitySink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn emit(&mut self, severity: Severity, record: &ActivityRecord) -> Result<(), SinkError> {
        let op = record.op.as_str();
        match severity {
            Severity::Info => tracing::info!(
                target: "franken_hook::activity",
                timestamp = %record.timestamp,
                op,
                target_label = %record.target,
                member = %record.member,
                payload = %record.payload,
            ),
            Severity::Warn => tracing::warn!(
                target: "franken_hook::activity",
                timestamp = %record.timestamp,
                op,
                target_label = %record.target,
                member = %record.member,
                payload = %record.payload,
            ),
            Severity::Error => tracing::error!(
                target: "franken_hook::activity",
                timestamp = %record.timestamp,
                op,
                target_label = %record.target,
                member = %record.member,
                payload = %record.payload,
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::OpKind;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record() -> ActivityRecord {
        ActivityRecord {
            timestamp: "2026-10-14T08:00:00.000Z+1.000".to_string(),
            op: OpKind::Call,
            target: "Window".to_string(),
            member: "fetch".to_string(),
            payload: r#"["/api"]"#.to_string(),
        }
    }

    #[test]
    fn memory_sink_clones_share_buffer() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.emit(Severity::Warn, &record()).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.entries()[0].severity, Severity::Warn);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn console_sink_routes_by_severity() {
        let out = SharedBuf::default();
        let err = SharedBuf::default();
        let mut sink = ConsoleSink::with_writers(Box::new(out.clone()), Box::new(err.clone()));
        sink.emit(Severity::Info, &record()).unwrap();
        sink.emit(Severity::Error, &record()).unwrap();
        assert_eq!(out.text().lines().count(), 1);
        assert_eq!(err.text().lines().count(), 1);
        assert!(out.text().contains("Window.fetch"));
        assert!(err.text().starts_with("error"));
    }

    #[test]
    fn console_sink_reports_write_failure() {
        let mut sink = ConsoleSink::with_writers(Box::new(BrokenWriter), Box::new(BrokenWriter));
        let err = sink.emit(Severity::Info, &record()).unwrap_err();
        assert!(matches!(err, SinkError::Write(_)));
    }

    #[test]
    fn tracing_sink_never_fails() {
        let mut sink = TracingSink;
        for severity in [Severity::Info, Severity::Warn, Severity::Error] {
            assert!(sink.emit(severity, &record()).is_ok());
        }
    }
}
