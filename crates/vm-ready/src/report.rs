//! Partition of watched fields into obtained and waiting.

use crate::fields::FieldList;
use crate::view_model::ViewModel;
use serde::Serialize;

/// Which watched fields are truthy right now
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    obtained: Vec<String>,
    waiting: Vec<String>,
}

impl ReadinessReport {
    /// Read every watched field once, preserving field order
    pub fn evaluate<V: ViewModel>(view_model: &V, fields: &FieldList) -> Self {
        let (obtained, waiting) = fields
            .iter()
            .map(str::to_string)
            .partition(|field| view_model.is_truthy(field));
        Self { obtained, waiting }
    }

    /// Ready when nothing is still waiting; an empty field list is ready
    pub fn is_ready(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn obtained(&self) -> &[String] {
        &self.obtained
    }

    pub fn waiting(&self) -> &[String] {
        &self.waiting
    }

    /// The two parts of the progress message, or `None` when ready
    ///
    /// `["obtained \"a\" still waiting on", "\"b\", \"c\""]`
    pub fn progress_parts(&self) -> Option<[String; 2]> {
        if self.is_ready() {
            return None;
        }
        let lead = if self.obtained.is_empty() {
            "still waiting on".to_string()
        } else {
            format!("obtained {} still waiting on", quote_list(&self.obtained))
        };
        Some([lead, quote_list(&self.waiting)])
    }

    /// The progress message as one line
    pub fn progress_message(&self) -> Option<String> {
        self.progress_parts().map(|parts| parts.join(" "))
    }
}

fn quote_list(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| format!("\"{}\"", f))
        .collect::<Vec<_>>()
        .join(", ")
}
