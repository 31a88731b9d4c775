//! Progress logging sinks
//!
//! A probe reports progress as a short list of message parts, the way a
//! variadic console logger would receive them. The default sink discards
//! everything, so log sites never branch on whether a logger is present.

use std::fmt;
use std::sync::Arc;

/// A sink for probe progress messages
pub trait ProbeLogger: Send + Sync {
    /// Receive one message made of one or more parts
    fn log(&self, parts: &[&str]);
}

impl<F> ProbeLogger for F
where
    F: Fn(&[&str]) + Send + Sync,
{
    fn log(&self, parts: &[&str]) {
        self(parts)
    }
}

/// Discards every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl ProbeLogger for NoopLogger {
    fn log(&self, _parts: &[&str]) {}
}

/// Forwards messages to `tracing` at info level, parts joined by spaces
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ProbeLogger for TracingLogger {
    fn log(&self, parts: &[&str]) {
        tracing::info!(target: "vm_ready::probe", "{}", parts.join(" "));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoggerKind {
    Noop,
    Tracing,
    Custom,
}

/// Shared handle to the logger a probe reports through
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn ProbeLogger>,
    kind: LoggerKind,
}

impl Logger {
    /// A logger that discards everything
    pub fn noop() -> Self {
        Self {
            sink: Arc::new(NoopLogger),
            kind: LoggerKind::Noop,
        }
    }

    /// A logger that forwards to `tracing`
    pub fn tracing() -> Self {
        Self {
            sink: Arc::new(TracingLogger),
            kind: LoggerKind::Tracing,
        }
    }

    /// Wrap any sink
    pub fn new(sink: impl ProbeLogger + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            kind: LoggerKind::Custom,
        }
    }

    /// Forward one message to the sink
    pub fn log(&self, parts: &[&str]) {
        self.sink.log(parts);
    }

    /// Whether this is the built-in discarding logger
    pub fn is_noop(&self) -> bool {
        self.kind == LoggerKind::Noop
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Logger").field(&self.kind).finish()
    }
}

impl<F> From<F> for Logger
where
    F: Fn(&[&str]) + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self::new(f)
    }
}
