//! Errors raised by the harness itself, as opposed to provider results.

use tandem_env::ProviderError;
use thiserror::Error;

/// Why a scenario could not be run to completion.
#[derive(Debug, Error)]
pub enum SimError {
    /// The real provider rejected its own configuration
    #[error("Provider setup failed: {0}")]
    Setup(#[from] ProviderError),

    /// A walk task panicked or was cancelled
    #[error("Walk task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The async runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}
