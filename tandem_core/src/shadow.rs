//! The shadow side of a provider pair.
//!
//! The shadow never calls a genuine provider. For every operation it
//! resolves what the real side recorded, compares its own inputs with the
//! recorded ones, and returns the recorded outputs. Mismatches are
//! collected as divergences; they never reach the caller and never panic.
//!
//! Resolution depends on the operation:
//!
//! | operations | store | on missing record |
//! |---|---|---|
//! | close, input, validate, configure | single-slot cell, read once | neutral result, nothing to compare |
//! | apply, diff, refresh, import, data reads | keyed by human id, waits for the key | unknown call once the state closes |
//! | validate_resource, validate_data_source | append list keyed by kind, waits for a matching config | unknown call once the state closes |

use crate::divergence::{Divergence, Divergences, Operation, ShadowError};
use crate::keyed::{Change, KeyedValue, Snapshot};
use crate::real::RealProvider;
use crate::record::ValidateKindCall;
use crate::shared::SharedState;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tandem_env::{
    DataSource, InstanceDiff, InstanceInfo, InstanceState, ProviderError, ResourceConfig,
    ResourceProvider, ResourceType, UiInput, Validation,
};

/// Key reported for operations made once per provider instance.
pub const PROVIDER_KEY: &str = "provider";

/// Lifecycle hooks specific to a shadow provider.
pub trait Shadow {
    /// Closes the shared state, releasing every waiting shadow call.
    ///
    /// Returns `false` if it was already closed.
    fn close_shadow(&self) -> bool;

    /// Returns every divergence found so far, or `None` if there were none.
    fn shadow_error(&self) -> Option<ShadowError>;
}

/// Creates a real/shadow pair around `provider`.
///
/// The real half forwards to `provider` and records every call; the shadow
/// half replays them. `provider.resources()` and
/// `provider.data_sources()` are queried once here and cached by the
/// shadow, which assumes they do not change during the run.
pub fn new_shadow_provider<P: ResourceProvider>(provider: P) -> (RealProvider<P>, ShadowProvider) {
    let shared = SharedState::shared();
    let shadow = ShadowProvider::new(
        Arc::clone(&shared),
        provider.resources(),
        provider.data_sources(),
    );
    let real = RealProvider::new(provider, shared);
    (real, shadow)
}

/// Replays a real provider's recorded calls without side effects.
pub struct ShadowProvider {
    shared: Arc<SharedState>,

    // Static metadata cached from the real provider
    resources: Vec<ResourceType>,
    data_sources: Vec<DataSource>,

    divergences: Divergences,
}

impl ShadowProvider {
    /// Creates a shadow reading from `shared`.
    ///
    /// # Precondition
    ///
    /// `resources` and `data_sources` must be the real provider's static
    /// metadata, and that metadata must not change for the rest of the run.
    /// They are returned verbatim and never compared.
    pub fn new(
        shared: Arc<SharedState>,
        resources: Vec<ResourceType>,
        data_sources: Vec<DataSource>,
    ) -> Self {
        Self {
            shared,
            resources,
            data_sources,
            divergences: Divergences::new(),
        }
    }

    /// Returns the state this shadow reads from.
    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Returns the divergence collector.
    pub fn divergences(&self) -> &Divergences {
        &self.divergences
    }

    fn compare<V>(&self, operation: Operation, key: &str, field: &'static str, real: &V, shadow: &V)
    where
        V: PartialEq + Debug + ?Sized,
    {
        if real != shadow {
            self.divergences
                .push(Divergence::mismatch(operation, key, field, real, shadow));
        }
    }

    fn unknown_call(&self, operation: Operation, key: &str, shadow: &impl Debug) {
        self.divergences
            .push(Divergence::unknown_call(operation, key, shadow));
    }
}

/// Waits until `key` has a published value or the store closes.
async fn resolve<T: Clone>(store: &KeyedValue<T>, key: &str) -> Option<T> {
    let Snapshot { version, value } = store.snapshot(key);
    if value.is_some() {
        return value;
    }
    match store.wait_for_change(key, version).await {
        Change::Changed { value, .. } => Some(value),
        Change::Closed => None,
    }
}

/// Scans the append list under `key` for a call with an equal config,
/// waiting for more calls until one matches or the store closes.
async fn resolve_matching(
    store: &KeyedValue<Vec<Arc<ValidateKindCall>>>,
    key: &str,
    config: &ResourceConfig,
) -> Option<Arc<ValidateKindCall>> {
    let Snapshot {
        mut version,
        mut value,
    } = store.snapshot(key);

    loop {
        let found = value
            .iter()
            .flatten()
            .find(|call| call.config == *config)
            .cloned();
        if found.is_some() {
            return found;
        }

        match store.wait_for_change(key, version).await {
            Change::Changed {
                version: next,
                value: calls,
            } => {
                version = next;
                value = Some(calls);
            }
            Change::Closed => return None,
        }
    }
}

impl Shadow for ShadowProvider {
    fn close_shadow(&self) -> bool {
        self.shared.close()
    }

    fn shadow_error(&self) -> Option<ShadowError> {
        self.divergences.error()
    }
}

#[async_trait]
impl ResourceProvider for ShadowProvider {
    async fn input(
        &self,
        _input: &dyn UiInput,
        config: &ResourceConfig,
    ) -> Result<ResourceConfig, ProviderError> {
        let Some(call) = self.shared.input.value() else {
            return Ok(ResourceConfig::default());
        };
        self.compare(Operation::Input, PROVIDER_KEY, "config", &call.config, config);
        call.result.clone()
    }

    async fn validate(&self, config: &ResourceConfig) -> Validation {
        let Some(call) = self.shared.validate.value() else {
            return Validation::default();
        };
        self.compare(Operation::Validate, PROVIDER_KEY, "config", &call.config, config);
        call.result.clone()
    }

    async fn configure(&self, config: &ResourceConfig) -> Result<(), ProviderError> {
        let Some(call) = self.shared.configure.value() else {
            return Ok(());
        };
        self.compare(Operation::Configure, PROVIDER_KEY, "config", &call.config, config);
        call.result.clone()
    }

    async fn validate_resource(&self, type_name: &str, config: &ResourceConfig) -> Validation {
        match resolve_matching(&self.shared.validate_resource, type_name, config).await {
            Some(call) => call.result.clone(),
            None => {
                self.unknown_call(Operation::ValidateResource, type_name, config);
                Validation::default()
            }
        }
    }

    async fn apply(
        &self,
        info: &InstanceInfo,
        state: Option<&InstanceState>,
        diff: &InstanceDiff,
    ) -> Result<Option<InstanceState>, ProviderError> {
        let key = info.human_id();
        let Some(call) = resolve(&self.shared.apply, &key).await else {
            self.unknown_call(Operation::Apply, &key, &(state, diff));
            return Ok(None);
        };
        self.compare(Operation::Apply, &key, "state", &call.state.as_ref(), &state);
        self.compare(Operation::Apply, &key, "diff", &call.diff, diff);
        call.result.clone()
    }

    async fn diff(
        &self,
        info: &InstanceInfo,
        state: Option<&InstanceState>,
        desired: &ResourceConfig,
    ) -> Result<Option<InstanceDiff>, ProviderError> {
        let key = info.human_id();
        let Some(call) = resolve(&self.shared.diff, &key).await else {
            self.unknown_call(Operation::Diff, &key, &(state, desired));
            return Ok(None);
        };
        self.compare(Operation::Diff, &key, "state", &call.state.as_ref(), &state);
        self.compare(Operation::Diff, &key, "desired config", &call.desired, desired);
        call.result.clone()
    }

    async fn refresh(
        &self,
        info: &InstanceInfo,
        state: &InstanceState,
    ) -> Result<Option<InstanceState>, ProviderError> {
        let key = info.human_id();
        let Some(call) = resolve(&self.shared.refresh, &key).await else {
            self.unknown_call(Operation::Refresh, &key, state);
            return Ok(None);
        };
        self.compare(Operation::Refresh, &key, "state", &call.state, state);
        call.result.clone()
    }

    async fn import_state(
        &self,
        info: &InstanceInfo,
        id: &str,
    ) -> Result<Vec<InstanceState>, ProviderError> {
        let key = info.human_id();
        let Some(call) = resolve(&self.shared.import_state, &key).await else {
            self.unknown_call(Operation::ImportState, &key, &id);
            return Ok(Vec::new());
        };
        self.compare(Operation::ImportState, &key, "id", call.id.as_str(), id);
        call.result.clone()
    }

    async fn validate_data_source(&self, type_name: &str, config: &ResourceConfig) -> Validation {
        match resolve_matching(&self.shared.validate_data_source, type_name, config).await {
            Some(call) => call.result.clone(),
            None => {
                self.unknown_call(Operation::ValidateDataSource, type_name, config);
                Validation::default()
            }
        }
    }

    async fn read_data_diff(
        &self,
        info: &InstanceInfo,
        desired: &ResourceConfig,
    ) -> Result<Option<InstanceDiff>, ProviderError> {
        let key = info.human_id();
        let Some(call) = resolve(&self.shared.read_data_diff, &key).await else {
            self.unknown_call(Operation::ReadDataDiff, &key, desired);
            return Ok(None);
        };
        self.compare(Operation::ReadDataDiff, &key, "desired config", &call.desired, desired);
        call.result.clone()
    }

    async fn read_data_apply(
        &self,
        info: &InstanceInfo,
        diff: &InstanceDiff,
    ) -> Result<Option<InstanceState>, ProviderError> {
        let key = info.human_id();
        let Some(call) = resolve(&self.shared.read_data_apply, &key).await else {
            self.unknown_call(Operation::ReadDataApply, &key, diff);
            return Ok(None);
        };
        self.compare(Operation::ReadDataApply, &key, "diff", &call.diff, diff);
        call.result.clone()
    }

    fn resources(&self) -> Vec<ResourceType> {
        self.resources.clone()
    }

    fn data_sources(&self) -> Vec<DataSource> {
        self.data_sources.clone()
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.shared.close.value().unwrap_or(Ok(()))
    }
}
