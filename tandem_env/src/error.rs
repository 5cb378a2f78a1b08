//! Error types for the provider capability contract.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by a provider operation itself.
///
/// These are capability errors: the real proxy passes them through
/// unchanged and records them so the shadow can hand back the exact same
/// error. That is why the type is `Clone` and comparable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProviderError {
    /// The remote API call failed
    #[error("Remote API error: {0}")]
    Remote(String),

    /// The addressed object does not exist remotely
    #[error("Not found: {0}")]
    NotFound(String),

    /// A configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The provider does not manage this resource or data-source kind
    #[error("Unsupported kind: {0}")]
    UnsupportedType(String),

    /// Anything else the provider wants to report
    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Creates a remote error.
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    /// Creates a not-found error.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Creates an invalid-configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates an unsupported-kind error.
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedType(kind.into())
    }
}
