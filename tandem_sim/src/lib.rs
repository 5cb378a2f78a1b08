//! Tandem Deterministic Dual-Walk Harness
//!
//! Runs a real walk and a shadow walk over the same seeded world and
//! checks that the shadow reproduces every real output without touching
//! the provider, and reports exactly the divergences a scenario provokes.
//!
//! # Determinism
//!
//! Everything derives from a single 64-bit seed:
//! - **World**: resource kinds, attributes and module nesting
//! - **Ids**: remote ids created by the in-memory provider
//! - **Order**: the interleaving of each walk's steps
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │                                                             │
//! │  ┌──────────────┐   SimWorld / WalkPlan   ┌──────────────┐  │
//! │  │  real Walk   │◄───────────────────────►│ shadow Walk  │  │
//! │  └──────┬───────┘                         └──────┬───────┘  │
//! │         │                                        │          │
//! │  ┌──────▼───────┐      ┌──────────────┐   ┌──────▼───────┐  │
//! │  │ RealProvider │─────►│ SharedState  │──►│ShadowProvider│  │
//! │  └──────┬───────┘      └──────────────┘   └──────────────┘  │
//! │         │                                                   │
//! │  ┌──────▼───────────┐                                       │
//! │  │ InMemoryProvider │                                       │
//! │  └──────────────────┘                                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use tandem_sim::{ScenarioRunner, ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 6).run(ScenarioId::ShadowFirst);
//! assert!(result.passed);
//! ```

mod error;
mod ids;
mod provider;
mod runner;
pub mod scenarios;
pub mod walk;
mod world;

pub use error::SimError;
pub use ids::DeterministicIds;
pub use provider::{InMemoryProvider, BUCKET_KIND, IMAGE_KIND, INSTANCE_KIND};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use walk::{Step, StepOutput, Walk, WalkPlan, WalkTrace};
pub use world::{DataSourceSpec, ResourceSpec, SimConfig, SimWorld};
