//! In-memory provider implementing the capability contract for simulation.

use crate::ids::DeterministicIds;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tandem_env::{
    DataSource, InputOpts, InstanceDiff, InstanceInfo, InstanceState, ProviderError,
    ResourceAttrDiff, ResourceConfig, ResourceProvider, ResourceType, UiInput, Validation,
};

/// Resource kind with a `size` attribute.
pub const INSTANCE_KIND: &str = "mock_instance";

/// Resource kind with a `versioning` attribute. Not importable.
pub const BUCKET_KIND: &str = "mock_bucket";

/// Data-source kind resolving an image id.
pub const IMAGE_KIND: &str = "mock_image";

/// Provider backed by a map instead of a remote API.
///
/// This is the "real" provider of a simulation run:
/// - A remote object map keyed by instance human id
/// - Remote ids derived deterministically from the master seed
/// - Validation rules that depend on the configuration, so different
///   configurations of one kind produce different warnings
pub struct InMemoryProvider {
    /// Id source for created objects
    ids: DeterministicIds,

    /// Remote objects by human id
    remote: Mutex<HashMap<String, InstanceState>>,

    /// Region set by `configure`
    region: Mutex<Option<String>>,

    /// Number of `close` calls
    closes: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn attr_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl InMemoryProvider {
    /// Creates an empty provider with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            ids: DeterministicIds::new(seed),
            remote: Mutex::new(HashMap::new()),
            region: Mutex::new(None),
            closes: AtomicUsize::new(0),
        }
    }

    /// Returns the remote object stored under `human_id`.
    pub fn remote_state(&self, human_id: &str) -> Option<InstanceState> {
        lock(&self.remote).get(human_id).cloned()
    }

    /// Number of remote objects.
    pub fn remote_len(&self) -> usize {
        lock(&self.remote).len()
    }

    /// Number of times `close` was called.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn configured_region(&self) -> Result<String, ProviderError> {
        lock(&self.region)
            .clone()
            .ok_or_else(|| ProviderError::Other("provider not configured".to_string()))
    }
}

#[async_trait]
impl ResourceProvider for InMemoryProvider {
    async fn input(
        &self,
        input: &dyn UiInput,
        config: &ResourceConfig,
    ) -> Result<ResourceConfig, ProviderError> {
        if config.get("region").is_some() {
            return Ok(config.clone());
        }
        let region = input.input(&InputOpts {
            id: "region".to_string(),
            query: "provider.mock.region".to_string(),
            description: "Region to provision into".to_string(),
            default: "us-east-1".to_string(),
        })?;
        Ok(config.clone().with("region", region))
    }

    async fn validate(&self, config: &ResourceConfig) -> Validation {
        let mut v = Validation::default();
        if config.get_str("region").is_none() {
            v.fail(ProviderError::invalid_config("region is required"));
        }
        if config.get("profile").is_none() {
            v.warn("no profile set, using default credentials");
        }
        v
    }

    async fn configure(&self, config: &ResourceConfig) -> Result<(), ProviderError> {
        let region = config
            .get_str("region")
            .ok_or_else(|| ProviderError::invalid_config("region is required"))?;
        *lock(&self.region) = Some(region.to_string());
        Ok(())
    }

    async fn validate_resource(&self, type_name: &str, config: &ResourceConfig) -> Validation {
        let mut v = Validation::default();
        if type_name != INSTANCE_KIND && type_name != BUCKET_KIND {
            v.fail(ProviderError::unsupported(type_name));
            return v;
        }

        let Some(name) = config.get_str("name") else {
            v.fail(ProviderError::invalid_config(format!("{}: name is required", type_name)));
            return v;
        };

        if type_name == INSTANCE_KIND && config.get("size").is_none() {
            v.warn(format!("{} {}: size not set, defaulting to small", type_name, name));
        }
        if type_name == BUCKET_KIND && config.get("versioning").is_none() {
            v.warn(format!("{} {}: versioning disabled", type_name, name));
        }
        v
    }

    async fn apply(
        &self,
        info: &InstanceInfo,
        state: Option<&InstanceState>,
        diff: &InstanceDiff,
    ) -> Result<Option<InstanceState>, ProviderError> {
        let region = self.configured_region()?;
        let key = info.human_id();

        if diff.destroy {
            lock(&self.remote).remove(&key);
            return Ok(None);
        }

        let prior = if diff.requires_new() { None } else { state.cloned() };
        let mut next = prior.unwrap_or_default();
        if next.id.is_empty() {
            next.id = self.ids.instance_id(&key);
        }

        for (attr, change) in &diff.attributes {
            if change.new_removed {
                next.attributes.remove(attr);
            } else if !change.new_computed {
                next.attributes.insert(attr.clone(), change.new.clone());
            }
        }
        next.attributes.insert("id".to_string(), next.id.clone());
        next.meta.insert("region".to_string(), Value::String(region));
        next.tainted = false;

        lock(&self.remote).insert(key, next.clone());
        Ok(Some(next))
    }

    async fn diff(
        &self,
        _info: &InstanceInfo,
        state: Option<&InstanceState>,
        desired: &ResourceConfig,
    ) -> Result<Option<InstanceDiff>, ProviderError> {
        self.configured_region()?;
        let mut diff = InstanceDiff::default();

        for (attr, value) in &desired.raw {
            let new = attr_string(value);
            let old = state
                .and_then(|s| s.attributes.get(attr))
                .cloned()
                .unwrap_or_default();
            if old != new {
                let mut change = ResourceAttrDiff::change(old, new);
                change.requires_new = attr == "name" && state.is_some();
                diff.attributes.insert(attr.clone(), change);
            }
        }

        match state {
            Some(state) => {
                for (attr, old) in &state.attributes {
                    if attr != "id" && !desired.raw.contains_key(attr) {
                        diff.attributes.insert(
                            attr.clone(),
                            ResourceAttrDiff {
                                old: old.clone(),
                                new_removed: true,
                                ..ResourceAttrDiff::default()
                            },
                        );
                    }
                }
                diff.destroy_tainted = state.tainted;
            }
            None => {
                diff.attributes
                    .insert("id".to_string(), ResourceAttrDiff::computed(""));
            }
        }

        Ok(if diff.is_empty() { None } else { Some(diff) })
    }

    async fn refresh(
        &self,
        info: &InstanceInfo,
        _state: &InstanceState,
    ) -> Result<Option<InstanceState>, ProviderError> {
        Ok(self.remote_state(&info.human_id()))
    }

    async fn import_state(
        &self,
        info: &InstanceInfo,
        id: &str,
    ) -> Result<Vec<InstanceState>, ProviderError> {
        if info.resource_type == BUCKET_KIND {
            return Err(ProviderError::unsupported(format!("{} import", BUCKET_KIND)));
        }
        lock(&self.remote)
            .values()
            .find(|state| state.id == id)
            .map(|state| vec![state.clone()])
            .ok_or_else(|| ProviderError::not_found(id))
    }

    async fn validate_data_source(&self, type_name: &str, config: &ResourceConfig) -> Validation {
        let mut v = Validation::default();
        if type_name != IMAGE_KIND {
            v.fail(ProviderError::unsupported(type_name));
        } else if config.get("filter").is_none() {
            v.warn(format!(
                "{} {}: no filter, selecting the most recent image",
                type_name,
                config.get_str("name").unwrap_or("?")
            ));
        }
        v
    }

    async fn read_data_diff(
        &self,
        _info: &InstanceInfo,
        desired: &ResourceConfig,
    ) -> Result<Option<InstanceDiff>, ProviderError> {
        let mut diff = InstanceDiff::default();
        for (attr, value) in &desired.raw {
            diff.attributes
                .insert(attr.clone(), ResourceAttrDiff::change("", attr_string(value)));
        }
        diff.attributes
            .insert("image_id".to_string(), ResourceAttrDiff::computed(""));
        Ok(Some(diff))
    }

    async fn read_data_apply(
        &self,
        info: &InstanceInfo,
        diff: &InstanceDiff,
    ) -> Result<Option<InstanceState>, ProviderError> {
        let image_id = self.ids.image_id(&info.human_id());
        let mut state = InstanceState::new(image_id.clone());
        for (attr, change) in &diff.attributes {
            if !change.new_computed {
                state.attributes.insert(attr.clone(), change.new.clone());
            }
        }
        state.attributes.insert("image_id".to_string(), image_id);
        Ok(Some(state))
    }

    fn resources(&self) -> Vec<ResourceType> {
        vec![
            ResourceType {
                name: INSTANCE_KIND.to_string(),
                importable: true,
            },
            ResourceType {
                name: BUCKET_KIND.to_string(),
                importable: false,
            },
        ]
    }

    fn data_sources(&self) -> Vec<DataSource> {
        vec![DataSource {
            name: IMAGE_KIND.to_string(),
        }]
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_env::DefaultInput;

    async fn configured(seed: u64) -> InMemoryProvider {
        let provider = InMemoryProvider::new(seed);
        let config = provider
            .input(&DefaultInput, &ResourceConfig::new())
            .await
            .unwrap();
        provider.configure(&config).await.unwrap();
        provider
    }

    #[tokio::test]
    async fn test_input_fills_region_default() {
        let provider = InMemoryProvider::new(1);
        let config = provider
            .input(&DefaultInput, &ResourceConfig::new())
            .await
            .unwrap();
        assert_eq!(config.get_str("region"), Some("us-east-1"));

        let validation = provider.validate(&config).await;
        assert!(validation.is_ok());
        assert_eq!(validation.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_rejects_diff() {
        let provider = InMemoryProvider::new(1);
        let info = InstanceInfo::new(INSTANCE_KIND, "mock_instance.web");
        let result = provider.diff(&info, None, &ResourceConfig::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_validate_resource_warnings_depend_on_config() {
        let provider = InMemoryProvider::new(1);
        let web = ResourceConfig::new().with("name", "web");
        let db = ResourceConfig::new().with("name", "db");
        let sized = ResourceConfig::new().with("name", "big").with("size", "large");

        let w_web = provider.validate_resource(INSTANCE_KIND, &web).await;
        let w_db = provider.validate_resource(INSTANCE_KIND, &db).await;
        assert_ne!(w_web, w_db);
        assert!(provider.validate_resource(INSTANCE_KIND, &sized).await.warnings.is_empty());

        let unknown = provider.validate_resource("mock_queue", &web).await;
        assert_eq!(unknown.errors, vec![ProviderError::unsupported("mock_queue")]);

        let unnamed = provider.validate_resource(BUCKET_KIND, &ResourceConfig::new()).await;
        assert!(!unnamed.is_ok());
    }

    #[tokio::test]
    async fn test_create_refresh_update_destroy() {
        let provider = configured(42).await;
        let info = InstanceInfo::new(INSTANCE_KIND, "mock_instance.web");
        let desired = ResourceConfig::new().with("name", "web").with("size", "small");

        let create = provider.diff(&info, None, &desired).await.unwrap().unwrap();
        assert!(create.attributes["id"].new_computed);
        let created = provider.apply(&info, None, &create).await.unwrap().unwrap();
        assert!(created.id.starts_with("i-"));
        assert_eq!(created.attributes["size"], "small");

        let refreshed = provider.refresh(&info, &created).await.unwrap();
        assert_eq!(refreshed.as_ref(), Some(&created));
        assert_eq!(provider.diff(&info, Some(&created), &desired).await.unwrap(), None);

        let resized = desired.clone().with("size", "large");
        let update = provider.diff(&info, Some(&created), &resized).await.unwrap().unwrap();
        assert!(!update.requires_new());
        let updated = provider.apply(&info, Some(&created), &update).await.unwrap().unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.attributes["size"], "large");

        let destroy = InstanceDiff {
            destroy: true,
            ..InstanceDiff::default()
        };
        assert_eq!(provider.apply(&info, Some(&updated), &destroy).await.unwrap(), None);
        assert_eq!(provider.refresh(&info, &updated).await.unwrap(), None);
        assert_eq!(provider.remote_len(), 0);
    }

    #[tokio::test]
    async fn test_rename_requires_new() {
        let provider = configured(42).await;
        let info = InstanceInfo::new(INSTANCE_KIND, "mock_instance.web");
        let desired = ResourceConfig::new().with("name", "web");

        let create = provider.diff(&info, None, &desired).await.unwrap().unwrap();
        let created = provider.apply(&info, None, &create).await.unwrap().unwrap();

        let renamed = ResourceConfig::new().with("name", "web2");
        let diff = provider.diff(&info, Some(&created), &renamed).await.unwrap().unwrap();
        assert!(diff.requires_new());
    }

    #[tokio::test]
    async fn test_ids_are_deterministic_per_seed() {
        let a = configured(7).await;
        let b = configured(7).await;
        let info = InstanceInfo::new(INSTANCE_KIND, "mock_instance.web").in_module(["app"]);
        let desired = ResourceConfig::new().with("name", "web");

        let diff = a.diff(&info, None, &desired).await.unwrap().unwrap();
        let sa = a.apply(&info, None, &diff).await.unwrap().unwrap();
        let sb = b.apply(&info, None, &diff).await.unwrap().unwrap();
        assert_eq!(sa, sb);
        assert!(a.remote_state("module.app.mock_instance.web").is_some());
    }

    #[tokio::test]
    async fn test_import_finds_by_remote_id() {
        let provider = configured(3).await;
        let info = InstanceInfo::new(INSTANCE_KIND, "mock_instance.web");
        let desired = ResourceConfig::new().with("name", "web");

        let diff = provider.diff(&info, None, &desired).await.unwrap().unwrap();
        let created = provider.apply(&info, None, &diff).await.unwrap().unwrap();

        let imported = provider.import_state(&info, &created.id).await.unwrap();
        assert_eq!(imported, vec![created]);
        assert_eq!(
            provider.import_state(&info, "i-missing").await,
            Err(ProviderError::not_found("i-missing"))
        );
    }

    #[tokio::test]
    async fn test_data_source_read() {
        let provider = InMemoryProvider::new(9);
        let info = InstanceInfo::new(IMAGE_KIND, "data.mock_image.base");
        let desired = ResourceConfig::new().with("name", "ubuntu");

        assert_eq!(provider.validate_data_source(IMAGE_KIND, &desired).await.warnings.len(), 1);
        let diff = provider.read_data_diff(&info, &desired).await.unwrap().unwrap();
        let state = provider.read_data_apply(&info, &diff).await.unwrap().unwrap();
        assert!(state.id.starts_with("img-"));
        assert_eq!(state.attributes["name"], "ubuntu");
        assert_eq!(state.attributes["image_id"], state.id);
    }

    #[tokio::test]
    async fn test_close_is_counted() {
        let provider = InMemoryProvider::new(1);
        provider.close().await.unwrap();
        provider.close().await.unwrap();
        assert_eq!(provider.close_count(), 2);
    }
}
