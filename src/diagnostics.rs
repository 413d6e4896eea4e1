//! User-facing diagnostic streams.
//!
//! The dispatcher writes two optional streams: a trace of each request line
//! (verbose mode) and the response bodies (dry-run mode). Both are injected as
//! [`DiagnosticSink`]s so the caller decides where they go. Writes are
//! best-effort and never fail an iteration.
//!
//! These are separate from `tracing` logs, which stay operator-facing.

use std::io::Write;
use std::sync::Mutex;

pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Writes each line to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl DiagnosticSink for StdoutSink {
    fn emit(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
    }
}

/// Writes each line to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&self, line: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", line);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _line: &str) {}
}

/// Keeps lines in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticSink for BufferSink {
    fn emit(&self, line: &str) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_sink_collects_in_order() {
        let sink = BufferSink::new();
        sink.emit("GET http://a/");
        sink.emit("GET http://b/");
        assert_eq!(sink.lines(), vec!["GET http://a/", "GET http://b/"]);
    }

    #[test]
    fn test_sinks_are_object_safe() {
        let sinks: Vec<Box<dyn DiagnosticSink>> =
            vec![Box::new(StdoutSink), Box::new(StderrSink), Box::new(NullSink)];
        for sink in &sinks {
            sink.emit("diagnostic line");
        }
    }
}
