//! View-model access for the readiness probe
//!
//! The probe never owns the observed data. It holds a cloneable handle
//! through which it reads watched fields and writes the optional flag field.

use crate::error::{ProbeError, Result};
use crate::truthy::is_truthy;
use serde_json::{Map, Value};
use std::sync::{Arc, PoisonError, RwLock};

/// A handle onto an externally owned view-model
///
/// Implementations must be cheap to clone; every clone observes the same
/// underlying data. Delayed flag writes run on the scheduler, so handles
/// must be `Send + Sync`.
pub trait ViewModel: Clone + Send + Sync + 'static {
    /// Whether the named field currently holds a truthy value
    ///
    /// Absent fields are falsey.
    fn is_truthy(&self, field: &str) -> bool;

    /// Write a boolean into the named field
    fn set_flag(&self, field: &str, value: bool);
}

/// A JSON-object view-model shared between the caller and its probes
#[derive(Debug, Clone, Default)]
pub struct SharedViewModel {
    fields: Arc<RwLock<Map<String, Value>>>,
}

impl SharedViewModel {
    /// Create an empty view-model
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a view-model from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from(map)),
            Value::Null => Err(ProbeError::invalid_view_model("null")),
            Value::Bool(_) => Err(ProbeError::invalid_view_model("boolean")),
            Value::Number(_) => Err(ProbeError::invalid_view_model("number")),
            Value::String(_) => Err(ProbeError::invalid_view_model("string")),
            Value::Array(_) => Err(ProbeError::invalid_view_model("array")),
        }
    }

    /// Get a copy of a field's current value
    pub fn get(&self, field: &str) -> Option<Value> {
        self.fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(field)
            .cloned()
    }

    /// Set a field, returning the previous value
    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(field.into(), value.into())
    }

    /// Remove a field, returning its value
    pub fn remove(&self, field: &str) -> Option<Value> {
        self.fields
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(field)
    }

    /// Snapshot the whole view-model as a JSON object
    pub fn snapshot(&self) -> Value {
        Value::Object(
            self.fields
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        )
    }
}

impl From<Map<String, Value>> for SharedViewModel {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            fields: Arc::new(RwLock::new(map)),
        }
    }
}

impl ViewModel for SharedViewModel {
    fn is_truthy(&self, field: &str) -> bool {
        is_truthy(
            self.fields
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(field),
        )
    }

    fn set_flag(&self, field: &str, value: bool) {
        self.set(field, value);
    }
}
