//! Tandem Provider Contract
//!
//! This crate defines the capability contract every resource provider
//! exposes, and the data model flowing through it. It owns no I/O: the
//! concrete create/read/update/delete logic lives in provider
//! implementations, and the real/shadow verification lives in
//! `tandem_core`.
//!
//! # Core Concept: One Contract, Two Executions
//!
//! The same evaluator drives two objects implementing [`ResourceProvider`]:
//! - **Real**: performs genuine side-effecting calls
//! - **Shadow**: performs none, and must reproduce the real results
//!
//! Because both sides speak this one trait, the evaluator cannot tell them
//! apart.
//!
//! # Example
//!
//! ```ignore
//! use tandem_env::{InstanceInfo, ProviderError, ResourceConfig, ResourceProvider};
//!
//! async fn create<P: ResourceProvider>(
//!     p: &P,
//!     info: &InstanceInfo,
//!     desired: &ResourceConfig,
//! ) -> Result<(), ProviderError> {
//!     if let Some(diff) = p.diff(info, None, desired).await? {
//!         p.apply(info, None, &diff).await?;
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod provider;
mod types;

pub use error::ProviderError;
pub use provider::{DefaultInput, ResourceProvider, UiInput};
pub use types::{
    DataSource, InputOpts, InstanceDiff, InstanceInfo, InstanceState, ResourceAttrDiff,
    ResourceConfig, ResourceType, Validation, ROOT_MODULE,
};
