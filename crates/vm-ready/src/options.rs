//! Builder argument types
//!
//! Statically typed arguments are converted with `From`. Dynamic arguments
//! arrive as `serde_json::Value` and are validated here, which is the only
//! place an [`ProbeError::InvalidArgument`] can originate for a probe.

use crate::error::{ProbeError, Result};
use crate::logger::Logger;
use crate::truthy::is_falsey;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// The view-model field a probe writes readiness into, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flag(Option<String>);

impl Flag {
    /// No flag is written
    pub fn disabled() -> Self {
        Self(None)
    }

    /// Flag field name, when enabled
    pub fn field(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// Validate a dynamic flag argument
    ///
    /// Strings name the field; any falsey value disables the flag.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Self::from(s.as_str())),
            v if is_falsey(Some(v)) => Ok(Self::disabled()),
            _ => Err(ProbeError::invalid_argument("flag", "string")),
        }
    }
}

impl From<&str> for Flag {
    fn from(field: &str) -> Self {
        Self::from(field.to_string())
    }
}

impl From<String> for Flag {
    fn from(field: String) -> Self {
        if field.is_empty() {
            Self::disabled()
        } else {
            Self(Some(field))
        }
    }
}

impl From<Option<&str>> for Flag {
    fn from(field: Option<&str>) -> Self {
        field.map(Self::from).unwrap_or_default()
    }
}

impl From<Option<String>> for Flag {
    fn from(field: Option<String>) -> Self {
        field.map(Self::from).unwrap_or_default()
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(field) => write!(f, "{}", field),
            None => write!(f, "<disabled>"),
        }
    }
}

/// Delay before a flag write
///
/// `Synchronous` means the write happens before `check()` returns. It is
/// what negative and NaN millisecond values normalize to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Delay {
    #[default]
    Synchronous,
    After(Duration),
}

impl Delay {
    /// Normalize a millisecond value
    pub fn from_millis(ms: f64) -> Self {
        if ms.is_nan() || ms < 0.0 {
            return Delay::Synchronous;
        }
        let nanos = (ms * 1_000_000.0).round();
        if nanos >= u64::MAX as f64 {
            Delay::After(Duration::MAX)
        } else {
            Delay::After(Duration::from_nanos(nanos as u64))
        }
    }

    /// Validate a dynamic delay argument, which must be a number
    pub fn from_value(value: &Value, argument: &'static str) -> Result<Self> {
        value
            .as_f64()
            .map(Self::from_millis)
            .ok_or_else(|| ProbeError::invalid_argument(argument, "number"))
    }

    pub fn is_synchronous(&self) -> bool {
        matches!(self, Delay::Synchronous)
    }

    /// The deferral, or `None` when synchronous
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Delay::Synchronous => None,
            Delay::After(d) => Some(*d),
        }
    }

    /// Milliseconds for log output; NaN when synchronous
    pub fn as_millis_f64(&self) -> f64 {
        self.as_duration()
            .map_or(f64::NAN, |d| d.as_secs_f64() * 1000.0)
    }
}

impl From<f64> for Delay {
    fn from(ms: f64) -> Self {
        Self::from_millis(ms)
    }
}

impl From<Duration> for Delay {
    fn from(delay: Duration) -> Self {
        Delay::After(delay)
    }
}

/// Validate a dynamic logger argument
///
/// Falsey values clear the logger and `"tracing"` selects the tracing sink.
/// A dynamic value can never be callable, so anything else is rejected.
pub fn logger_from_value(value: &Value) -> Result<Logger> {
    match value {
        Value::String(s) if s == "tracing" => Ok(Logger::tracing()),
        v if is_falsey(Some(v)) => Ok(Logger::noop()),
        _ => Err(ProbeError::invalid_argument("logger", "function")),
    }
}
