//! Divergence records and the shadow-side collector.

use crate::value::lock;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

/// Provider operation kinds that are recorded and replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Close,
    Input,
    Validate,
    Configure,
    ValidateResource,
    Apply,
    Diff,
    Refresh,
    ImportState,
    ValidateDataSource,
    ReadDataDiff,
    ReadDataApply,
}

impl Operation {
    /// Returns the operation name.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Close => "close",
            Operation::Input => "input",
            Operation::Validate => "validate",
            Operation::Configure => "configure",
            Operation::ValidateResource => "validate_resource",
            Operation::Apply => "apply",
            Operation::Diff => "diff",
            Operation::Refresh => "refresh",
            Operation::ImportState => "import_state",
            Operation::ValidateDataSource => "validate_data_source",
            Operation::ReadDataDiff => "read_data_diff",
            Operation::ReadDataApply => "read_data_apply",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A mismatch between a shadow call and the recorded real call.
///
/// Never fatal: collected and surfaced once the shadow walk is over.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Divergence {
    /// The shadow made a call the real side never recorded
    #[error("unknown '{operation}' call for key {key}:\n\n{shadow}")]
    UnknownCall {
        operation: Operation,
        key: String,
        shadow: String,
    },

    /// The shadow's inputs differ from the recorded inputs
    #[error("'{operation}' {key} had unequal {field} (real, then shadow):\n\n{real}\n\n{shadow}")]
    Mismatch {
        operation: Operation,
        key: String,
        field: &'static str,
        real: String,
        shadow: String,
    },
}

impl Divergence {
    /// Creates an unknown-call divergence, rendering the shadow's inputs.
    pub fn unknown_call(operation: Operation, key: &str, shadow: &impl std::fmt::Debug) -> Self {
        Self::UnknownCall {
            operation,
            key: key.to_string(),
            shadow: format!("{:#?}", shadow),
        }
    }

    /// Creates a mismatch divergence, rendering both sides.
    pub fn mismatch<V: std::fmt::Debug + ?Sized>(
        operation: Operation,
        key: &str,
        field: &'static str,
        real: &V,
        shadow: &V,
    ) -> Self {
        Self::Mismatch {
            operation,
            key: key.to_string(),
            field,
            real: format!("{:#?}", real),
            shadow: format!("{:#?}", shadow),
        }
    }

    /// Returns the operation this divergence was detected on.
    pub fn operation(&self) -> Operation {
        match self {
            Divergence::UnknownCall { operation, .. } | Divergence::Mismatch { operation, .. } => {
                *operation
            }
        }
    }

    /// Returns the key of the diverging call.
    pub fn key(&self) -> &str {
        match self {
            Divergence::UnknownCall { key, .. } | Divergence::Mismatch { key, .. } => key,
        }
    }
}

/// All divergences found on a shadow walk, combined into one error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} shadow divergence(s) occurred:{}", .0.len(), render(.0))]
pub struct ShadowError(Vec<Divergence>);

impl ShadowError {
    /// Returns the individual divergences, in detection order.
    pub fn divergences(&self) -> &[Divergence] {
        &self.0
    }

    /// Consumes the error, returning the divergences.
    pub fn into_divergences(self) -> Vec<Divergence> {
        self.0
    }
}

fn render(divergences: &[Divergence]) -> String {
    divergences
        .iter()
        .map(|d| format!("\n\n* {}", d.to_string().replace('\n', "\n  ")))
        .collect()
}

/// Thread-safe accumulator for divergences.
///
/// Every comparison site on the shadow side pushes here; nothing is ever
/// raised to the caller of the provider operation.
#[derive(Debug, Default)]
pub struct Divergences {
    records: Mutex<Vec<Divergence>>,
}

impl Divergences {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a divergence.
    pub fn push(&self, divergence: Divergence) {
        tracing::warn!(
            operation = %divergence.operation(),
            key = divergence.key(),
            "shadow divergence detected"
        );
        lock(&self.records).push(divergence);
    }

    /// Number of divergences recorded so far.
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    /// Returns true if nothing diverged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the combined error, or `None` if nothing diverged.
    pub fn error(&self) -> Option<ShadowError> {
        let records = lock(&self.records);
        if records.is_empty() {
            None
        } else {
            Some(ShadowError(records.clone()))
        }
    }
}
