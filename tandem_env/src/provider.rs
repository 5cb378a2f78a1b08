//! The provider capability contract.

use crate::error::ProviderError;
use crate::types::{
    DataSource, InputOpts, InstanceDiff, InstanceInfo, InstanceState, ResourceConfig,
    ResourceType, Validation,
};
use async_trait::async_trait;

/// The fixed set of operations any resource provider exposes.
///
/// # Implementations
///
/// - **Real**: a provider talking to a remote API, optionally wrapped in
///   `tandem_core::RealProvider` to record its calls
/// - **Shadow**: `tandem_core::ShadowProvider`, which never performs side
///   effects and replays what the real side recorded
///
/// The graph evaluator drives both through this trait without knowing
/// which one it holds.
#[async_trait]
pub trait ResourceProvider: Send + Sync + 'static {
    /// Asks the user for missing provider configuration.
    ///
    /// Returns the configuration completed with any answers.
    async fn input(
        &self,
        input: &dyn UiInput,
        config: &ResourceConfig,
    ) -> Result<ResourceConfig, ProviderError>;

    /// Validates the provider configuration itself.
    async fn validate(&self, config: &ResourceConfig) -> Validation;

    /// Configures the provider. Called once per provider instance.
    async fn configure(&self, config: &ResourceConfig) -> Result<(), ProviderError>;

    /// Validates the configuration of one resource of kind `type_name`.
    ///
    /// May be called many times per kind with different configurations.
    async fn validate_resource(&self, type_name: &str, config: &ResourceConfig) -> Validation;

    /// Applies a diff to an instance.
    ///
    /// `state` is `None` for instances that do not exist yet. Returns `None`
    /// when the instance was destroyed.
    async fn apply(
        &self,
        info: &InstanceInfo,
        state: Option<&InstanceState>,
        diff: &InstanceDiff,
    ) -> Result<Option<InstanceState>, ProviderError>;

    /// Computes the changes needed to bring `state` to `desired`.
    ///
    /// Returns `None` when nothing changes.
    async fn diff(
        &self,
        info: &InstanceInfo,
        state: Option<&InstanceState>,
        desired: &ResourceConfig,
    ) -> Result<Option<InstanceDiff>, ProviderError>;

    /// Reads the current remote state of an instance.
    ///
    /// Returns `None` when the instance no longer exists.
    async fn refresh(
        &self,
        info: &InstanceInfo,
        state: &InstanceState,
    ) -> Result<Option<InstanceState>, ProviderError>;

    /// Imports an existing remote object by id.
    async fn import_state(
        &self,
        info: &InstanceInfo,
        id: &str,
    ) -> Result<Vec<InstanceState>, ProviderError>;

    /// Validates the configuration of one data source of kind `type_name`.
    async fn validate_data_source(&self, type_name: &str, config: &ResourceConfig) -> Validation;

    /// Computes the diff for reading a data source.
    async fn read_data_diff(
        &self,
        info: &InstanceInfo,
        desired: &ResourceConfig,
    ) -> Result<Option<InstanceDiff>, ProviderError>;

    /// Reads a data source according to its diff.
    async fn read_data_apply(
        &self,
        info: &InstanceInfo,
        diff: &InstanceDiff,
    ) -> Result<Option<InstanceState>, ProviderError>;

    /// Returns the resource kinds this provider supports.
    fn resources(&self) -> Vec<ResourceType>;

    /// Returns the data-source kinds this provider supports.
    fn data_sources(&self) -> Vec<DataSource>;

    /// Releases provider resources.
    ///
    /// Providers with nothing to release keep the default.
    async fn close(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Prompts the user for a single value.
pub trait UiInput: Send + Sync {
    /// Asks the question described by `opts` and returns the answer.
    fn input(&self, opts: &InputOpts) -> Result<String, ProviderError>;
}

/// Answers every prompt with its default value.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInput;

impl UiInput for DefaultInput {
    fn input(&self, opts: &InputOpts) -> Result<String, ProviderError> {
        Ok(opts.default.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal provider that supports nothing.
    struct NullProvider;

    #[async_trait]
    impl ResourceProvider for NullProvider {
        async fn input(
            &self,
            input: &dyn UiInput,
            config: &ResourceConfig,
        ) -> Result<ResourceConfig, ProviderError> {
            let answer = input.input(&InputOpts {
                id: "region".into(),
                default: "us-east-1".into(),
                ..InputOpts::default()
            })?;
            Ok(config.clone().with("region", answer))
        }

        async fn validate(&self, _config: &ResourceConfig) -> Validation {
            Validation::default()
        }

        async fn configure(&self, _config: &ResourceConfig) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn validate_resource(&self, type_name: &str, _config: &ResourceConfig) -> Validation {
            let mut v = Validation::default();
            v.fail(ProviderError::unsupported(type_name));
            v
        }

        async fn apply(
            &self,
            info: &InstanceInfo,
            _state: Option<&InstanceState>,
            _diff: &InstanceDiff,
        ) -> Result<Option<InstanceState>, ProviderError> {
            Err(ProviderError::unsupported(&info.resource_type))
        }

        async fn diff(
            &self,
            _info: &InstanceInfo,
            _state: Option<&InstanceState>,
            _desired: &ResourceConfig,
        ) -> Result<Option<InstanceDiff>, ProviderError> {
            Ok(None)
        }

        async fn refresh(
            &self,
            _info: &InstanceInfo,
            _state: &InstanceState,
        ) -> Result<Option<InstanceState>, ProviderError> {
            Ok(None)
        }

        async fn import_state(
            &self,
            _info: &InstanceInfo,
            id: &str,
        ) -> Result<Vec<InstanceState>, ProviderError> {
            Err(ProviderError::not_found(id))
        }

        async fn validate_data_source(&self, _type_name: &str, _config: &ResourceConfig) -> Validation {
            Validation::default()
        }

        async fn read_data_diff(
            &self,
            _info: &InstanceInfo,
            _desired: &ResourceConfig,
        ) -> Result<Option<InstanceDiff>, ProviderError> {
            Ok(None)
        }

        async fn read_data_apply(
            &self,
            _info: &InstanceInfo,
            _diff: &InstanceDiff,
        ) -> Result<Option<InstanceState>, ProviderError> {
            Ok(None)
        }

        fn resources(&self) -> Vec<ResourceType> {
            Vec::new()
        }

        fn data_sources(&self) -> Vec<DataSource> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_default_close_is_ok() {
        assert_eq!(NullProvider.close().await, Ok(()));
    }

    #[tokio::test]
    async fn test_input_uses_prompt_default() {
        let config = NullProvider
            .input(&DefaultInput, &ResourceConfig::new())
            .await
            .unwrap();
        assert_eq!(config.get_str("region"), Some("us-east-1"));
    }

    #[tokio::test]
    async fn test_provider_is_object_safe() {
        let provider: Box<dyn ResourceProvider> = Box::new(NullProvider);
        let v = provider
            .validate_resource("aws_instance", &ResourceConfig::new())
            .await;
        assert_eq!(v.errors, vec![ProviderError::unsupported("aws_instance")]);
    }
}
