//! Common types for the provider capability contract.
//!
//! Every type owns its data, so `Clone` is a deep copy. Equality is the
//! semantic equality the shadow uses when comparing its inputs against the
//! recorded real-side inputs.

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Name of the implicit root module in a module path.
pub const ROOT_MODULE: &str = "root";

/// Configuration handed to a provider or one of its resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Raw attribute values as written in configuration
    pub raw: BTreeMap<String, Value>,

    /// Attribute keys whose values are not known until apply
    pub computed_keys: Vec<String>,
}

impl ResourceConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.raw.insert(key.into(), value.into());
        self
    }

    /// Marks a key as computed.
    pub fn with_computed(mut self, key: impl Into<String>) -> Self {
        self.computed_keys.push(key.into());
        self
    }

    /// Returns the raw value for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// Returns the value for a key if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.raw.get(key).and_then(Value::as_str)
    }

    /// Sets a raw value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.raw.insert(key.into(), value.into());
    }

    /// Returns true if the key is computed.
    pub fn is_computed(&self, key: &str) -> bool {
        self.computed_keys.iter().any(|k| k == key)
    }

    fn sorted_computed(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.computed_keys.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }
}

// Computed keys are a set; the order they were collected in carries no meaning.
impl PartialEq for ResourceConfig {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.sorted_computed() == other.sorted_computed()
    }
}

/// Identifies one resource instance within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceInfo {
    /// Instance id within its module, e.g. `aws_instance.foo`
    pub id: String,

    /// Module path, always starting with `root`
    pub module_path: Vec<String>,

    /// Resource kind name
    pub resource_type: String,
}

impl InstanceInfo {
    /// Creates info for an instance in the root module.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            module_path: vec![ROOT_MODULE.to_string()],
            resource_type: resource_type.into(),
        }
    }

    /// Moves the instance into a nested module path (below root).
    pub fn in_module<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.module_path = std::iter::once(ROOT_MODULE.to_string())
            .chain(path.into_iter().map(Into::into))
            .collect();
        self
    }

    /// Human-readable identifier, unique within a run.
    ///
    /// Root instances use their bare id; nested ones are prefixed with
    /// `module.<path>.`.
    pub fn human_id(&self) -> String {
        if self.module_path.len() <= 1 {
            return self.id.clone();
        }
        format!("module.{}.{}", self.module_path[1..].join("."), self.id)
    }
}

/// Known state of a resource instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    /// Remote id, empty until created
    pub id: String,

    /// Flattened attribute values
    pub attributes: BTreeMap<String, String>,

    /// Provider-private metadata
    pub meta: BTreeMap<String, Value>,

    /// Instance must be replaced on next apply
    pub tainted: bool,
}

impl InstanceState {
    /// Creates a state with the given remote id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Change to a single attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAttrDiff {
    pub old: String,
    pub new: String,
    pub new_computed: bool,
    pub new_removed: bool,
    pub requires_new: bool,
}

impl ResourceAttrDiff {
    /// An attribute changing from `old` to `new`.
    pub fn change(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            ..Self::default()
        }
    }

    /// An attribute whose new value is only known after apply.
    pub fn computed(old: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new_computed: true,
            ..Self::default()
        }
    }
}

/// Planned changes to one resource instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDiff {
    pub attributes: BTreeMap<String, ResourceAttrDiff>,
    pub destroy: bool,
    pub destroy_tainted: bool,
}

impl InstanceDiff {
    /// Returns true if the diff changes nothing.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && !self.destroy && !self.destroy_tainted
    }

    /// Returns true if any attribute forces replacement.
    pub fn requires_new(&self) -> bool {
        self.attributes.values().any(|a| a.requires_new)
    }
}

/// A resource kind the provider supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    pub name: String,
    pub importable: bool,
}

/// A data-source kind the provider supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,
}

/// Warnings and errors returned by the validation operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub warnings: Vec<String>,
    pub errors: Vec<ProviderError>,
}

impl Validation {
    /// Appends a warning.
    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Appends an error.
    pub fn fail(&mut self, err: ProviderError) {
        self.errors.push(err);
    }

    /// Returns true if no errors were reported.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A prompt issued through [`UiInput`](crate::UiInput).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputOpts {
    /// Stable identifier of the value being asked for
    pub id: String,

    /// Short question shown to the user
    pub query: String,

    /// Longer explanation
    pub description: String,

    /// Value used when the user gives none
    pub default: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_id_root_module() {
        let info = InstanceInfo::new("aws_instance", "aws_instance.foo");
        assert_eq!(info.human_id(), "aws_instance.foo");
    }

    #[test]
    fn test_human_id_nested_module() {
        let info = InstanceInfo::new("aws_instance", "aws_instance.foo").in_module(["net", "edge"]);
        assert_eq!(info.module_path, vec!["root", "net", "edge"]);
        assert_eq!(info.human_id(), "module.net.edge.aws_instance.foo");
    }

    #[test]
    fn test_config_equality_ignores_computed_order() {
        let a = ResourceConfig::new()
            .with("ami", "ami-123")
            .with_computed("id")
            .with_computed("arn");
        let b = ResourceConfig::new()
            .with("ami", "ami-123")
            .with_computed("arn")
            .with_computed("id");
        assert_eq!(a, b);
    }

    #[test]
    fn test_config_equality_is_structural_on_values() {
        let a = ResourceConfig::new().with("tags", serde_json::json!({"env": "prod"}));
        let b = ResourceConfig::new().with("tags", serde_json::json!({"env": "prod"}));
        let c = ResourceConfig::new().with("tags", serde_json::json!({"env": "dev"}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_clone_is_deep() {
        let original = ResourceConfig::new().with("name", "web");
        let mut copy = original.clone();
        copy.set("name", "db");

        assert_eq!(original.get_str("name"), Some("web"));
        assert_eq!(copy.get_str("name"), Some("db"));
    }

    #[test]
    fn test_empty_diff() {
        let mut diff = InstanceDiff::default();
        assert!(diff.is_empty());

        diff.attributes.insert("ami".into(), ResourceAttrDiff::change("a", "b"));
        assert!(!diff.is_empty());
        assert!(!diff.requires_new());

        if let Some(attr) = diff.attributes.get_mut("ami") {
            attr.requires_new = true;
        }
        assert!(diff.requires_new());
    }
}
