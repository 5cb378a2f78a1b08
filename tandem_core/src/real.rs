//! The real side of a provider pair.

use crate::record::{
    ApplyCall, ConfigureCall, DiffCall, ImportCall, InputCall, ReadDataApplyCall,
    ReadDataDiffCall, RefreshCall, ValidateCall, ValidateKindCall,
};
use crate::shared::SharedState;
use async_trait::async_trait;
use std::sync::Arc;
use tandem_env::{
    DataSource, InstanceDiff, InstanceInfo, InstanceState, ProviderError, ResourceConfig,
    ResourceProvider, ResourceType, UiInput, Validation,
};
use tracing::debug;

/// Wraps a genuine provider and records every call for the shadow.
///
/// Each operation runs the wrapped provider, publishes a copy of the
/// inputs together with the outputs into the shared state, and returns the
/// genuine result untouched. Side effects are exactly those of the wrapped
/// provider.
pub struct RealProvider<P> {
    inner: P,
    shared: Arc<SharedState>,
}

impl<P: ResourceProvider> RealProvider<P> {
    /// Wraps `inner`, recording into `shared`.
    pub fn new(inner: P, shared: Arc<SharedState>) -> Self {
        Self { inner, shared }
    }

    /// Returns the wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Returns the state this proxy records into.
    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }
}

#[async_trait]
impl<P: ResourceProvider> ResourceProvider for RealProvider<P> {
    async fn input(
        &self,
        input: &dyn UiInput,
        config: &ResourceConfig,
    ) -> Result<ResourceConfig, ProviderError> {
        let result = self.inner.input(input, config).await;
        self.shared.input.set_value(Arc::new(InputCall {
            config: config.clone(),
            result: result.clone(),
        }));
        debug!("recorded input");
        result
    }

    async fn validate(&self, config: &ResourceConfig) -> Validation {
        let result = self.inner.validate(config).await;
        self.shared.validate.set_value(Arc::new(ValidateCall {
            config: config.clone(),
            result: result.clone(),
        }));
        debug!(warnings = result.warnings.len(), errors = result.errors.len(), "recorded validate");
        result
    }

    async fn configure(&self, config: &ResourceConfig) -> Result<(), ProviderError> {
        let result = self.inner.configure(config).await;
        self.shared.configure.set_value(Arc::new(ConfigureCall {
            config: config.clone(),
            result: result.clone(),
        }));
        debug!(ok = result.is_ok(), "recorded configure");
        result
    }

    async fn validate_resource(&self, type_name: &str, config: &ResourceConfig) -> Validation {
        let result = self.inner.validate_resource(type_name, config).await;
        let calls = self.shared.validate_resource.append(
            type_name,
            Arc::new(ValidateKindCall {
                config: config.clone(),
                result: result.clone(),
            }),
        );
        debug!(kind = type_name, calls, "recorded validate_resource");
        result
    }

    async fn apply(
        &self,
        info: &InstanceInfo,
        state: Option<&InstanceState>,
        diff: &InstanceDiff,
    ) -> Result<Option<InstanceState>, ProviderError> {
        let result = self.inner.apply(info, state, diff).await;
        let key = info.human_id();
        self.shared.apply.set_value(
            &key,
            Arc::new(ApplyCall {
                state: state.cloned(),
                diff: diff.clone(),
                result: result.clone(),
            }),
        );
        debug!(key = %key, ok = result.is_ok(), "recorded apply");
        result
    }

    async fn diff(
        &self,
        info: &InstanceInfo,
        state: Option<&InstanceState>,
        desired: &ResourceConfig,
    ) -> Result<Option<InstanceDiff>, ProviderError> {
        let result = self.inner.diff(info, state, desired).await;
        let key = info.human_id();
        self.shared.diff.set_value(
            &key,
            Arc::new(DiffCall {
                state: state.cloned(),
                desired: desired.clone(),
                result: result.clone(),
            }),
        );
        debug!(key = %key, ok = result.is_ok(), "recorded diff");
        result
    }

    async fn refresh(
        &self,
        info: &InstanceInfo,
        state: &InstanceState,
    ) -> Result<Option<InstanceState>, ProviderError> {
        let result = self.inner.refresh(info, state).await;
        let key = info.human_id();
        self.shared.refresh.set_value(
            &key,
            Arc::new(RefreshCall {
                state: state.clone(),
                result: result.clone(),
            }),
        );
        debug!(key = %key, ok = result.is_ok(), "recorded refresh");
        result
    }

    async fn import_state(
        &self,
        info: &InstanceInfo,
        id: &str,
    ) -> Result<Vec<InstanceState>, ProviderError> {
        let result = self.inner.import_state(info, id).await;
        let key = info.human_id();
        self.shared.import_state.set_value(
            &key,
            Arc::new(ImportCall {
                id: id.to_string(),
                result: result.clone(),
            }),
        );
        debug!(key = %key, id, "recorded import_state");
        result
    }

    async fn validate_data_source(&self, type_name: &str, config: &ResourceConfig) -> Validation {
        let result = self.inner.validate_data_source(type_name, config).await;
        let calls = self.shared.validate_data_source.append(
            type_name,
            Arc::new(ValidateKindCall {
                config: config.clone(),
                result: result.clone(),
            }),
        );
        debug!(kind = type_name, calls, "recorded validate_data_source");
        result
    }

    async fn read_data_diff(
        &self,
        info: &InstanceInfo,
        desired: &ResourceConfig,
    ) -> Result<Option<InstanceDiff>, ProviderError> {
        let result = self.inner.read_data_diff(info, desired).await;
        let key = info.human_id();
        self.shared.read_data_diff.set_value(
            &key,
            Arc::new(ReadDataDiffCall {
                desired: desired.clone(),
                result: result.clone(),
            }),
        );
        debug!(key = %key, "recorded read_data_diff");
        result
    }

    async fn read_data_apply(
        &self,
        info: &InstanceInfo,
        diff: &InstanceDiff,
    ) -> Result<Option<InstanceState>, ProviderError> {
        let result = self.inner.read_data_apply(info, diff).await;
        let key = info.human_id();
        self.shared.read_data_apply.set_value(
            &key,
            Arc::new(ReadDataApplyCall {
                diff: diff.clone(),
                result: result.clone(),
            }),
        );
        debug!(key = %key, "recorded read_data_apply");
        result
    }

    // Static metadata is not recorded: the shadow caches it at construction.
    fn resources(&self) -> Vec<ResourceType> {
        self.inner.resources()
    }

    fn data_sources(&self) -> Vec<DataSource> {
        self.inner.data_sources()
    }

    async fn close(&self) -> Result<(), ProviderError> {
        let result = self.inner.close().await;
        self.shared.close.set_value(result.clone());
        debug!(ok = result.is_ok(), "recorded close");
        result
    }
}
