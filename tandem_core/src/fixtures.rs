//! Deterministic provider used by the proxy tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tandem_env::{
    DataSource, InputOpts, InstanceDiff, InstanceInfo, InstanceState, ProviderError,
    ResourceAttrDiff, ResourceConfig, ResourceProvider, ResourceType, UiInput, Validation,
};

/// Provider whose outputs are pure functions of its inputs.
#[derive(Default)]
pub(crate) struct FixtureProvider {
    pub calls: AtomicUsize,
    pub fail_apply: bool,
    pub close_error: Option<ProviderError>,
}

impl FixtureProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn config(name: &str) -> ResourceConfig {
    ResourceConfig::new().with("name", name)
}

fn diff_from(desired: &ResourceConfig) -> InstanceDiff {
    let mut diff = InstanceDiff::default();
    for (key, value) in &desired.raw {
        let new = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
        diff.attributes.insert(key.clone(), ResourceAttrDiff::change("", new));
    }
    diff
}

#[async_trait]
impl ResourceProvider for FixtureProvider {
    async fn input(
        &self,
        input: &dyn UiInput,
        config: &ResourceConfig,
    ) -> Result<ResourceConfig, ProviderError> {
        self.tick();
        let region = input.input(&InputOpts {
            id: "region".into(),
            default: "eu-west-1".into(),
            ..InputOpts::default()
        })?;
        Ok(config.clone().with("region", region))
    }

    async fn validate(&self, config: &ResourceConfig) -> Validation {
        self.tick();
        let mut v = Validation::default();
        if config.get("region").is_none() {
            v.warn("region not set");
        }
        v
    }

    async fn configure(&self, config: &ResourceConfig) -> Result<(), ProviderError> {
        self.tick();
        match config.get("broken") {
            Some(_) => Err(ProviderError::invalid_config("broken provider config")),
            None => Ok(()),
        }
    }

    async fn validate_resource(&self, type_name: &str, config: &ResourceConfig) -> Validation {
        self.tick();
        let mut v = Validation::default();
        v.warn(format!(
            "{}: checked {}",
            type_name,
            config.get_str("name").unwrap_or("?")
        ));
        v
    }

    async fn apply(
        &self,
        info: &InstanceInfo,
        state: Option<&InstanceState>,
        diff: &InstanceDiff,
    ) -> Result<Option<InstanceState>, ProviderError> {
        self.tick();
        if self.fail_apply {
            return Err(ProviderError::remote("apply rejected"));
        }
        let mut next = state
            .cloned()
            .unwrap_or_else(|| InstanceState::new(format!("i-{}", info.id)));
        for (key, attr) in &diff.attributes {
            next.attributes.insert(key.clone(), attr.new.clone());
        }
        Ok(Some(next))
    }

    async fn diff(
        &self,
        _info: &InstanceInfo,
        _state: Option<&InstanceState>,
        desired: &ResourceConfig,
    ) -> Result<Option<InstanceDiff>, ProviderError> {
        self.tick();
        Ok(Some(diff_from(desired)))
    }

    async fn refresh(
        &self,
        _info: &InstanceInfo,
        state: &InstanceState,
    ) -> Result<Option<InstanceState>, ProviderError> {
        self.tick();
        Ok(Some(state.clone().with_attribute("refreshed", "true")))
    }

    async fn import_state(
        &self,
        _info: &InstanceInfo,
        id: &str,
    ) -> Result<Vec<InstanceState>, ProviderError> {
        self.tick();
        Ok(vec![InstanceState::new(id)])
    }

    async fn validate_data_source(&self, type_name: &str, config: &ResourceConfig) -> Validation {
        self.validate_resource(type_name, config).await
    }

    async fn read_data_diff(
        &self,
        _info: &InstanceInfo,
        desired: &ResourceConfig,
    ) -> Result<Option<InstanceDiff>, ProviderError> {
        self.tick();
        Ok(Some(diff_from(desired)))
    }

    async fn read_data_apply(
        &self,
        info: &InstanceInfo,
        diff: &InstanceDiff,
    ) -> Result<Option<InstanceState>, ProviderError> {
        self.apply(info, None, diff).await
    }

    fn resources(&self) -> Vec<ResourceType> {
        vec![ResourceType {
            name: "aws_instance".into(),
            importable: true,
        }]
    }

    fn data_sources(&self) -> Vec<DataSource> {
        vec![DataSource {
            name: "aws_ami".into(),
        }]
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.tick();
        match &self.close_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
