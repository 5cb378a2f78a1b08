//! Records that carry one real call across to the shadow side.
//!
//! Each operation kind has its own record type, and each store in
//! [`SharedState`](crate::SharedState) is typed to exactly one of them, so
//! the shadow can never read back a payload of the wrong kind. Inputs are
//! owned clones taken at call time; later mutation by the caller cannot
//! reach them.

use tandem_env::{InstanceDiff, InstanceState, ProviderError, ResourceConfig, Validation};

#[derive(Debug, Clone, PartialEq)]
pub struct InputCall {
    pub config: ResourceConfig,
    pub result: Result<ResourceConfig, ProviderError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidateCall {
    pub config: ResourceConfig,
    pub result: Validation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigureCall {
    pub config: ResourceConfig,
    pub result: Result<(), ProviderError>,
}

/// One validation of a resource or data-source kind.
///
/// Stored in append lists keyed by kind name, since a kind is validated
/// once per configuration that uses it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidateKindCall {
    pub config: ResourceConfig,
    pub result: Validation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyCall {
    pub state: Option<InstanceState>,
    pub diff: InstanceDiff,
    pub result: Result<Option<InstanceState>, ProviderError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffCall {
    pub state: Option<InstanceState>,
    pub desired: ResourceConfig,
    pub result: Result<Option<InstanceDiff>, ProviderError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshCall {
    pub state: InstanceState,
    pub result: Result<Option<InstanceState>, ProviderError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportCall {
    pub id: String,
    pub result: Result<Vec<InstanceState>, ProviderError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadDataDiffCall {
    pub desired: ResourceConfig,
    pub result: Result<Option<InstanceDiff>, ProviderError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadDataApplyCall {
    pub diff: InstanceDiff,
    pub result: Result<Option<InstanceState>, ProviderError>,
}
