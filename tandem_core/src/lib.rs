//! Tandem Core - Real/Shadow Provider Verification
//!
//! Runs the same provider operations twice: once for real, once as a
//! shadow that performs no side effects and must reproduce the real call
//! sequence, parameters and results by observing what the real side did.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐        ┌──────────────────┐        ┌──────────────────┐
//! │   RealProvider   │ write  │   SharedState    │  read  │  ShadowProvider  │
//! │ (wraps genuine   │───────►│  Value cells     │───────►│ (compares inputs,│
//! │  provider)       │        │  KeyedValue maps │        │  replays outputs)│
//! └──────────────────┘        └──────────────────┘        └────────┬─────────┘
//!                                                                  │
//!                                                         ┌────────▼─────────┐
//!                                                         │   Divergences    │
//!                                                         └──────────────────┘
//! ```
//!
//! Data flows one way, real to shadow. The shadow may run ahead of the real
//! side: keyed lookups suspend until the real call is published or the
//! shared state is closed. Nothing on the shadow side can fail or block the
//! real side.
//!
//! # Usage
//!
//! ```ignore
//! use tandem_core::{new_shadow_provider, Shadow};
//!
//! let (real, shadow) = new_shadow_provider(provider);
//! // drive `real` and `shadow` from two concurrent walks ...
//! shadow.close_shadow();
//! if let Some(err) = shadow.shadow_error() {
//!     eprintln!("{err}");
//! }
//! ```

pub mod divergence;
pub mod keyed;
pub mod record;
pub mod value;

mod real;
mod shadow;
mod shared;

#[cfg(test)]
mod fixtures;

pub use divergence::{Divergence, Divergences, Operation, ShadowError};
pub use keyed::{Change, KeyedValue, Snapshot};
pub use real::RealProvider;
pub use shadow::{new_shadow_provider, Shadow, ShadowProvider, PROVIDER_KEY};
pub use shared::SharedState;
pub use value::Value;
