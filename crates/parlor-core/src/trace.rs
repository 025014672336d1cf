//! Diagnostic event sinks.
//!
//! A [`Tracer`] receives one event per call and writes it as one line. Rooms
//! take a tracer at construction and default to [`off`], which does nothing.
//! Write failures are swallowed; tracing never affects the caller.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Something capable of recording trace events.
pub trait Tracer: Send + Sync {
    /// Record one event.
    fn trace(&self, event: fmt::Arguments<'_>);
}

/// Create a tracer writing lines to `out`.
pub fn new<W>(out: W) -> Arc<dyn Tracer>
where
    W: Write + Send + 'static,
{
    Arc::new(WriterTracer::new(out))
}

/// Create a tracer that ignores every event.
#[must_use]
pub fn off() -> Arc<dyn Tracer> {
    Arc::new(Off)
}

/// Writes each event as a line to an output stream.
pub struct WriterTracer<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriterTracer<W> {
    /// Wrap an output stream.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the output stream.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> Tracer for WriterTracer<W> {
    fn trace(&self, event: fmt::Arguments<'_>) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        let _ = out.write_fmt(event);
        let _ = out.write_all(b"\n");
    }
}

/// The no-op tracer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Off;

impl Tracer for Off {
    #[inline]
    fn trace(&self, _event: fmt::Arguments<'_>) {}
}

/// Forwards events to the `tracing` subscriber at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn trace(&self, event: fmt::Arguments<'_>) {
        tracing::debug!(target: "parlor::trace", "{}", event);
    }
}

/// Keeps events in memory, mostly for assertions in tests.
#[derive(Debug, Default)]
pub struct MemoryTracer {
    lines: Mutex<Vec<String>>,
}

impl MemoryTracer {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl Tracer for MemoryTracer {
    fn trace(&self, event: fmt::Arguments<'_>) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(event.to_string());
        }
    }
}
