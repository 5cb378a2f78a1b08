//! Linear walks over a provider.
//!
//! A walk drives one provider through the calls a graph evaluator would
//! make: a provider phase (input, validate, configure) followed by a
//! resource phase in which every resource and data source runs its own
//! chain of steps. Chains are interleaved in a seeded order that keeps
//! each chain's steps in sequence, and may be split across concurrent
//! lanes. Every output is captured in a [`WalkTrace`] so two walks can be
//! compared afterwards.

use crate::error::SimError;
use crate::world::{DataSourceSpec, ResourceSpec, SimWorld};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tandem_env::{
    InstanceDiff, InstanceState, ProviderError, ResourceConfig, ResourceProvider, UiInput,
    Validation,
};
use tracing::{debug, trace};

/// Attribute the drifting walk injects into state before each refresh.
pub const DRIFT_ATTRIBUTE: &str = "drift";

/// One step of a resource or data-source chain.
///
/// Indices point into [`WalkPlan::resources`] or [`WalkPlan::data_sources`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    ValidateResource(usize),
    Diff(usize),
    Apply(usize),
    Refresh(usize),
    Import(usize),
    ValidateDataSource(usize),
    ReadDataDiff(usize),
    ReadDataApply(usize),
}

/// The object a step works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Target {
    Resource(usize),
    DataSource(usize),
}

impl Step {
    /// Returns the operation name.
    pub fn name(&self) -> &'static str {
        match self {
            Step::ValidateResource(_) => "validate_resource",
            Step::Diff(_) => "diff",
            Step::Apply(_) => "apply",
            Step::Refresh(_) => "refresh",
            Step::Import(_) => "import_state",
            Step::ValidateDataSource(_) => "validate_data_source",
            Step::ReadDataDiff(_) => "read_data_diff",
            Step::ReadDataApply(_) => "read_data_apply",
        }
    }

    fn target(&self) -> Target {
        match *self {
            Step::ValidateResource(i)
            | Step::Diff(i)
            | Step::Apply(i)
            | Step::Refresh(i)
            | Step::Import(i) => Target::Resource(i),
            Step::ValidateDataSource(j) | Step::ReadDataDiff(j) | Step::ReadDataApply(j) => {
                Target::DataSource(j)
            }
        }
    }
}

/// What a walk will do.
#[derive(Debug, Clone, Default)]
pub struct WalkPlan {
    /// Provider configuration passed to `input`
    pub provider_config: ResourceConfig,

    pub resources: Vec<ResourceSpec>,
    pub data_sources: Vec<DataSourceSpec>,
}

impl WalkPlan {
    /// Plans a walk over every object in `world`.
    pub fn from_world(world: &SimWorld) -> Self {
        Self {
            provider_config: ResourceConfig::new(),
            resources: world.resources.clone(),
            data_sources: world.data_sources.clone(),
        }
    }

    /// Adds a resource to the plan.
    pub fn with_resource(mut self, resource: ResourceSpec) -> Self {
        self.resources.push(resource);
        self
    }

    /// Returns one chain per resource, then one per data source.
    pub fn chains(&self) -> Vec<Vec<Step>> {
        let resources = self.resources.iter().enumerate().map(|(i, r)| {
            let mut chain = vec![
                Step::ValidateResource(i),
                Step::Diff(i),
                Step::Apply(i),
                Step::Refresh(i),
            ];
            if r.import {
                chain.push(Step::Import(i));
            }
            chain
        });
        let data_sources = (0..self.data_sources.len()).map(|j| {
            vec![
                Step::ValidateDataSource(j),
                Step::ReadDataDiff(j),
                Step::ReadDataApply(j),
            ]
        });
        resources.chain(data_sources).collect()
    }

    /// Total number of resource-phase steps.
    pub fn step_count(&self) -> usize {
        self.chains().iter().map(Vec::len).sum()
    }

    /// Trace label of a step: operation name and the object's human id.
    pub fn label(&self, step: Step) -> String {
        let subject = match step.target() {
            Target::Resource(i) => self.resources[i].info.human_id(),
            Target::DataSource(j) => self.data_sources[j].info.human_id(),
        };
        format!("{} {}", step.name(), subject)
    }
}

/// Interleaves `chains` in a seeded order, keeping each chain in sequence.
pub fn interleave(chains: &[Vec<Step>], order_seed: u64) -> Vec<Step> {
    let mut slots: Vec<usize> = chains
        .iter()
        .enumerate()
        .flat_map(|(c, chain)| std::iter::repeat(c).take(chain.len()))
        .collect();
    slots.shuffle(&mut ChaCha8Rng::seed_from_u64(order_seed));

    let mut cursors = vec![0usize; chains.len()];
    slots
        .into_iter()
        .map(|c| {
            let step = chains[c][cursors[c]];
            cursors[c] += 1;
            step
        })
        .collect()
}

/// Output of one walk step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    Config(Result<ResourceConfig, ProviderError>),
    Configured(Result<(), ProviderError>),
    Validation(Validation),
    Diff(Result<Option<InstanceDiff>, ProviderError>),
    State(Result<Option<InstanceState>, ProviderError>),
    Imported(Result<Vec<InstanceState>, ProviderError>),

    /// The step had nothing to work on, e.g. apply without a diff
    Skipped,
}

/// Every output of a walk, by step label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkTrace {
    outputs: BTreeMap<String, StepOutput>,
}

impl WalkTrace {
    fn record(&mut self, label: String, output: StepOutput) {
        trace!(step = %label, "step finished");
        self.outputs.insert(label, output);
    }

    fn merge(&mut self, other: WalkTrace) {
        self.outputs.extend(other.outputs);
    }

    /// Returns the output recorded under `label`.
    pub fn get(&self, label: &str) -> Option<&StepOutput> {
        self.outputs.get(label)
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Labels recorded here whose output in `other` is missing or different.
    pub fn mismatches(&self, other: &WalkTrace) -> Vec<String> {
        self.outputs
            .iter()
            .filter(|(label, output)| other.outputs.get(*label) != Some(*output))
            .map(|(label, _)| label.clone())
            .collect()
    }
}

impl fmt::Display for WalkTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, output) in &self.outputs {
            writeln!(f, "{}: {:?}", label, output)?;
        }
        Ok(())
    }
}

/// Labels of the provider phase.
pub const INPUT_LABEL: &str = "input provider";
pub const VALIDATE_LABEL: &str = "validate provider";
pub const CONFIGURE_LABEL: &str = "configure provider";

/// Per-object progress along its chain.
#[derive(Debug, Default)]
struct Progress {
    state: Option<InstanceState>,
    diff: Option<InstanceDiff>,
}

/// Drives a provider through a [`WalkPlan`].
pub struct Walk<P> {
    provider: Arc<P>,
    plan: Arc<WalkPlan>,
    order_seed: u64,
    lanes: usize,
    drift: bool,
}

impl<P: ResourceProvider> Walk<P> {
    /// Creates a single-lane walk with order seed 0.
    pub fn new(provider: Arc<P>, plan: Arc<WalkPlan>) -> Self {
        Self {
            provider,
            plan,
            order_seed: 0,
            lanes: 1,
            drift: false,
        }
    }

    /// Sets the seed of the step interleaving.
    pub fn with_order_seed(mut self, seed: u64) -> Self {
        self.order_seed = seed;
        self
    }

    /// Splits the chains across `lanes` concurrent tasks.
    pub fn with_lanes(mut self, lanes: usize) -> Self {
        self.lanes = lanes.max(1);
        self
    }

    /// Makes the walk tamper with state before every refresh.
    pub fn with_drift(mut self, drift: bool) -> Self {
        self.drift = drift;
        self
    }

    /// Runs input, validate and configure in order.
    ///
    /// Returns the trace together with the completed configuration, or
    /// the first error from `input` or `configure`.
    pub async fn provider_phase(
        &self,
        input: &dyn UiInput,
    ) -> Result<(WalkTrace, ResourceConfig), ProviderError> {
        let mut trace = WalkTrace::default();

        let completed = self.provider.input(input, &self.plan.provider_config).await;
        trace.record(INPUT_LABEL.to_string(), StepOutput::Config(completed.clone()));
        let completed = completed?;

        let validation = self.provider.validate(&completed).await;
        trace.record(VALIDATE_LABEL.to_string(), StepOutput::Validation(validation));

        let configured = self.provider.configure(&completed).await;
        trace.record(CONFIGURE_LABEL.to_string(), StepOutput::Configured(configured.clone()));
        configured?;

        Ok((trace, completed))
    }

    /// Runs the resource phase and returns its trace.
    pub async fn run(self) -> Result<WalkTrace, SimError> {
        let chains = self.plan.chains();
        let lanes = self.lanes.min(chains.len()).max(1);

        let mut split: Vec<Vec<Vec<Step>>> = vec![Vec::new(); lanes];
        for (c, chain) in chains.into_iter().enumerate() {
            split[c % lanes].push(chain);
        }

        let handles: Vec<_> = split
            .into_iter()
            .enumerate()
            .map(|(lane, chains)| {
                let lane_walk = Lane {
                    provider: Arc::clone(&self.provider),
                    plan: Arc::clone(&self.plan),
                    drift: self.drift,
                };
                let seed = self.order_seed.wrapping_add(lane as u64);
                tokio::spawn(lane_walk.run(interleave(&chains, seed)))
            })
            .collect();

        let mut trace = WalkTrace::default();
        for handle in handles {
            trace.merge(handle.await?);
        }
        debug!(steps = trace.len(), lanes, "walk finished");
        Ok(trace)
    }
}

/// One sequential strand of a walk.
struct Lane<P> {
    provider: Arc<P>,
    plan: Arc<WalkPlan>,
    drift: bool,
}

impl<P: ResourceProvider> Lane<P> {
    async fn run(self, order: Vec<Step>) -> WalkTrace {
        let mut trace = WalkTrace::default();
        let mut progress: HashMap<Target, Progress> = HashMap::new();

        for step in order {
            let entry = progress.entry(step.target()).or_default();
            let output = self.execute(step, entry).await;
            trace.record(self.plan.label(step), output);
            // Let other lanes and the opposite walk make progress
            tokio::task::yield_now().await;
        }
        trace
    }

    async fn execute(&self, step: Step, progress: &mut Progress) -> StepOutput {
        let provider = &self.provider;
        match step {
            Step::ValidateResource(i) => {
                let r = &self.plan.resources[i];
                StepOutput::Validation(
                    provider.validate_resource(&r.info.resource_type, &r.config).await,
                )
            }
            Step::Diff(i) => {
                let r = &self.plan.resources[i];
                let result = provider.diff(&r.info, progress.state.as_ref(), &r.config).await;
                progress.diff = result.clone().ok().flatten();
                StepOutput::Diff(result)
            }
            Step::Apply(i) => {
                let Some(diff) = progress.diff.take() else {
                    return StepOutput::Skipped;
                };
                let r = &self.plan.resources[i];
                let result = provider.apply(&r.info, progress.state.as_ref(), &diff).await;
                if let Ok(next) = &result {
                    progress.state = next.clone();
                }
                StepOutput::State(result)
            }
            Step::Refresh(i) => {
                let Some(mut state) = progress.state.clone() else {
                    return StepOutput::Skipped;
                };
                if self.drift {
                    state
                        .attributes
                        .insert(DRIFT_ATTRIBUTE.to_string(), "shadow".to_string());
                }
                let r = &self.plan.resources[i];
                let result = provider.refresh(&r.info, &state).await;
                if let Ok(next) = &result {
                    progress.state = next.clone();
                }
                StepOutput::State(result)
            }
            Step::Import(i) => {
                let Some(state) = &progress.state else {
                    return StepOutput::Skipped;
                };
                let r = &self.plan.resources[i];
                StepOutput::Imported(provider.import_state(&r.info, &state.id).await)
            }
            Step::ValidateDataSource(j) => {
                let d = &self.plan.data_sources[j];
                StepOutput::Validation(
                    provider
                        .validate_data_source(&d.info.resource_type, &d.config)
                        .await,
                )
            }
            Step::ReadDataDiff(j) => {
                let d = &self.plan.data_sources[j];
                let result = provider.read_data_diff(&d.info, &d.config).await;
                progress.diff = result.clone().ok().flatten();
                StepOutput::Diff(result)
            }
            Step::ReadDataApply(j) => {
                let Some(diff) = progress.diff.take() else {
                    return StepOutput::Skipped;
                };
                let d = &self.plan.data_sources[j];
                StepOutput::State(provider.read_data_apply(&d.info, &diff).await)
            }
        }
    }
}
