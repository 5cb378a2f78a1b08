//! Scenario runner - drives a real walk and a shadow walk side by side.

use crate::error::SimError;
use crate::provider::InMemoryProvider;
use crate::scenarios::ScenarioId;
use crate::walk::{Walk, WalkPlan};
use crate::world::{SimConfig, SimWorld};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{new_shadow_provider, Divergence, Operation, Shadow, ShadowError};
use tandem_env::{DefaultInput, ResourceProvider};
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Rendered divergences reported by the shadow
    pub divergences: Vec<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

impl ScenarioResult {
    fn failed(scenario: ScenarioId, seed: u64, reason: String) -> Self {
        Self {
            scenario,
            seed,
            passed: false,
            failure_reason: Some(reason),
            divergences: Vec::new(),
            metrics: ScenarioMetrics::default(),
        }
    }
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Resource-phase steps taken by the real walk
    pub real_steps: usize,

    /// Resource-phase steps taken by the shadow walk
    pub shadow_steps: usize,

    /// Keys with a recorded call in the shared state
    pub recorded_keys: usize,

    /// Divergences the scenario expects
    pub expected_divergences: usize,

    /// Objects left in the in-memory remote
    pub remote_objects: usize,

    /// Time both walks took together
    pub elapsed_ms: u64,
}

/// Runs dual-walk scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Number of managed resources per walk
    num_resources: usize,

    /// Head start the shadow gets in `shadow_first`
    real_delay: Duration,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_resources: usize) -> Self {
        Self {
            seed,
            num_resources,
            real_delay: Duration::from_millis(20),
        }
    }

    /// Sets how long the real walk waits in `shadow_first`.
    pub fn with_real_delay(mut self, delay: Duration) -> Self {
        self.real_delay = delay;
        self
    }

    /// Returns the world configuration for `scenario`.
    pub fn config_for(&self, scenario: ScenarioId) -> SimConfig {
        let base = SimConfig {
            seed: self.seed,
            num_resources: self.num_resources,
            ..SimConfig::default()
        };
        match scenario {
            ScenarioId::DataSources => SimConfig {
                num_data_sources: (self.num_resources / 2).max(2),
                ..base
            },
            ScenarioId::ShadowFirst => SimConfig {
                real_delay: self.real_delay,
                ..base
            },
            ScenarioId::Swarm => SimConfig {
                num_resources: self.num_resources * 4,
                num_data_sources: self.num_resources,
                lanes: 4,
                ..base
            },
            _ => base,
        }
    }

    /// Runs a scenario on a fresh runtime and returns the result.
    ///
    /// Must not be called from inside a tokio runtime.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let outcome = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(SimError::from)
            .and_then(|runtime| runtime.block_on(self.run_walks(scenario)));

        match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!("{} could not run: {}", scenario.name(), e);
                ScenarioResult::failed(scenario, self.seed, e.to_string())
            }
        }
    }

    async fn run_walks(&self, scenario: ScenarioId) -> Result<ScenarioResult, SimError> {
        let config = self.config_for(scenario);
        let world = SimWorld::new(config.clone());
        let plan = Arc::new(WalkPlan::from_world(&world));
        let shadow_plan = match scenario {
            ScenarioId::OrphanCall => Arc::new(plan.as_ref().clone().with_resource(SimWorld::orphan())),
            _ => Arc::clone(&plan),
        };
        let shadow_seed = match scenario {
            ScenarioId::ReorderedValidation | ScenarioId::Swarm => self.seed ^ 0x5bd1e995,
            _ => self.seed,
        };

        let (real, shadow) = new_shadow_provider(InMemoryProvider::new(self.seed));
        let real = Arc::new(real);
        let shadow = Arc::new(shadow);

        let real_walk = Walk::new(Arc::clone(&real), Arc::clone(&plan))
            .with_order_seed(self.seed)
            .with_lanes(config.lanes);
        let shadow_walk = Walk::new(Arc::clone(&shadow), shadow_plan)
            .with_order_seed(shadow_seed)
            .with_lanes(config.lanes)
            .with_drift(scenario == ScenarioId::DriftedState);

        let started = std::time::Instant::now();

        // Provider-level calls are read once, so the real side goes first
        let (real_setup, _) = real_walk.provider_phase(&DefaultInput).await?;
        let (shadow_setup, _) = shadow_walk.provider_phase(&DefaultInput).await?;

        let delay = config.real_delay;
        let real_task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            real_walk.run().await
        });
        let shadow_task = tokio::spawn(shadow_walk.run());

        let real_trace = real_task.await??;
        let real_close = real.close().await;

        // Releases shadow calls the real walk never answered
        shadow.close_shadow();
        let shadow_trace = shadow_task.await??;
        let shadow_close = shadow.close().await;

        let elapsed_ms = started.elapsed().as_millis() as u64;

        let divergences = shadow
            .shadow_error()
            .map(ShadowError::into_divergences)
            .unwrap_or_default();
        let expected = match scenario {
            ScenarioId::DriftedState => plan.resources.len(),
            // validate_resource and diff; apply and refresh are skipped
            ScenarioId::OrphanCall => 2,
            _ => 0,
        };

        let mut failures = Vec::new();

        let mut mismatched = real_setup.mismatches(&shadow_setup);
        mismatched.extend(real_trace.mismatches(&shadow_trace));
        if !mismatched.is_empty() {
            failures.push(format!(
                "{} shadow outputs differ from real: {}",
                mismatched.len(),
                mismatched.join(", ")
            ));
        }
        if real_close != shadow_close {
            failures.push(format!("close returned {:?} vs {:?}", real_close, shadow_close));
        }
        if divergences.len() != expected {
            failures.push(format!(
                "expected {} divergences, got {}",
                expected,
                divergences.len()
            ));
        }
        if let Some(unexpected) = divergences.iter().find(|d| !is_expected(scenario, d)) {
            failures.push(format!("unexpected divergence: {}", unexpected));
        }

        let inner = real.inner();
        if inner.close_count() != 1 {
            failures.push(format!("provider closed {} times", inner.close_count()));
        }
        if inner.remote_len() != plan.resources.len() {
            failures.push(format!(
                "{} remote objects for {} resources",
                inner.remote_len(),
                plan.resources.len()
            ));
        }

        let metrics = ScenarioMetrics {
            real_steps: real_trace.len(),
            shadow_steps: shadow_trace.len(),
            recorded_keys: real.shared().recorded_keys(),
            expected_divergences: expected,
            remote_objects: inner.remote_len(),
            elapsed_ms,
        };
        debug!(?metrics, "{} finished", scenario.name());

        let passed = failures.is_empty();
        if passed {
            info!(
                "✓ {} complete: {} steps, {} divergences",
                scenario.name(),
                metrics.real_steps,
                divergences.len()
            );
        }

        Ok(ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            failure_reason: (!passed).then(|| failures.join("; ")),
            divergences: divergences.iter().map(ToString::to_string).collect(),
            metrics,
        })
    }
}

/// Whether `divergence` is one `scenario` provokes on purpose.
fn is_expected(scenario: ScenarioId, divergence: &Divergence) -> bool {
    match scenario {
        ScenarioId::DriftedState => matches!(
            divergence,
            Divergence::Mismatch {
                operation: Operation::Refresh,
                field: "state",
                ..
            }
        ),
        ScenarioId::OrphanCall => {
            matches!(divergence, Divergence::UnknownCall { .. })
                && (divergence.key() == SimWorld::orphan().info.resource_type
                    || divergence.key() == SimWorld::orphan().info.human_id())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_faithful_scenario() {
        let result = ScenarioRunner::new(42, 6).run(ScenarioId::Faithful);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.divergences.is_empty());
        assert_eq!(result.metrics.real_steps, result.metrics.shadow_steps);
        assert_eq!(result.metrics.remote_objects, 6);
    }

    #[test]
    fn test_drifted_state_reports_each_refresh() {
        let result = ScenarioRunner::new(42, 5).run(ScenarioId::DriftedState);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.divergences.len(), 5);
        assert!(result.divergences[0].contains("'refresh'"));
        assert!(result.divergences[0].contains("drift"));
    }

    #[test]
    fn test_orphan_call_is_unknown() {
        let result = ScenarioRunner::new(7, 3).run(ScenarioId::OrphanCall);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.expected_divergences, 2);
        assert!(result.divergences.iter().all(|d| d.starts_with("unknown")));
        // Extra shadow steps for the orphan chain
        assert_eq!(result.metrics.shadow_steps, result.metrics.real_steps + 4);
    }

    #[test]
    fn test_shadow_first_waits_for_real() {
        let result = ScenarioRunner::new(42, 4)
            .with_real_delay(Duration::from_millis(30))
            .run(ScenarioId::ShadowFirst);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.elapsed_ms >= 30);
    }

    #[test]
    fn test_remaining_scenarios_pass() {
        let runner = ScenarioRunner::new(42, 6);
        for scenario in [
            ScenarioId::ReorderedValidation,
            ScenarioId::DataSources,
            ScenarioId::Swarm,
        ] {
            let result = runner.run(scenario);
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
        }
    }

    #[test]
    fn test_swarm_scales_world() {
        let config = ScenarioRunner::new(1, 5).config_for(ScenarioId::Swarm);
        assert_eq!(config.num_resources, 20);
        assert_eq!(config.lanes, 4);
    }

    #[test]
    fn test_same_seed_same_result() {
        let a = ScenarioRunner::new(99, 6).run(ScenarioId::ReorderedValidation);
        let b = ScenarioRunner::new(99, 6).run(ScenarioId::ReorderedValidation);
        assert_eq!(a.metrics.recorded_keys, b.metrics.recorded_keys);
        assert_eq!(a.divergences, b.divergences);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_every_scenario_passes(seed in any::<u64>(), resources in 1usize..8) {
            let runner = ScenarioRunner::new(seed, resources).with_real_delay(Duration::from_millis(2));
            for scenario in ScenarioId::all() {
                let result = runner.run(scenario);
                prop_assert!(result.passed, "{} seed={}: {:?}", scenario, seed, result.failure_reason);
            }
        }
    }
}
