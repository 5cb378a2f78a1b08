//! State shared by one real/shadow provider pair.

use crate::keyed::KeyedValue;
use crate::record::{
    ApplyCall, ConfigureCall, DiffCall, ImportCall, InputCall, ReadDataApplyCall,
    ReadDataDiffCall, RefreshCall, ValidateCall, ValidateKindCall,
};
use crate::value::Value;
use std::sync::Arc;
use tandem_env::ProviderError;

/// Every store the real side writes and the shadow side reads.
///
/// Created once per provider pair and referenced by both proxies. Its
/// lifetime is one provisioning run; [`close`](SharedState::close) must be
/// called once the run is torn down so no shadow call waits forever.
///
/// Single-slot cells hold calls made once per provider instance. Keyed
/// stores are keyed by instance human id, except the validation lists,
/// which are keyed by kind name and append one record per call.
pub struct SharedState {
    pub(crate) close: Value<Result<(), ProviderError>>,
    pub(crate) input: Value<Arc<InputCall>>,
    pub(crate) validate: Value<Arc<ValidateCall>>,
    pub(crate) configure: Value<Arc<ConfigureCall>>,
    pub(crate) validate_resource: KeyedValue<Vec<Arc<ValidateKindCall>>>,
    pub(crate) apply: KeyedValue<Arc<ApplyCall>>,
    pub(crate) diff: KeyedValue<Arc<DiffCall>>,
    pub(crate) refresh: KeyedValue<Arc<RefreshCall>>,
    pub(crate) import_state: KeyedValue<Arc<ImportCall>>,
    pub(crate) validate_data_source: KeyedValue<Vec<Arc<ValidateKindCall>>>,
    pub(crate) read_data_diff: KeyedValue<Arc<ReadDataDiffCall>>,
    pub(crate) read_data_apply: KeyedValue<Arc<ReadDataApplyCall>>,
}

impl SharedState {
    /// Creates an empty, open state.
    pub fn new() -> Self {
        Self {
            close: Value::new(),
            input: Value::new(),
            validate: Value::new(),
            configure: Value::new(),
            validate_resource: KeyedValue::new(),
            apply: KeyedValue::new(),
            diff: KeyedValue::new(),
            refresh: KeyedValue::new(),
            import_state: KeyedValue::new(),
            validate_data_source: KeyedValue::new(),
            read_data_diff: KeyedValue::new(),
            read_data_apply: KeyedValue::new(),
        }
    }

    /// Creates an Arc-wrapped state for sharing between the two proxies.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Closes every store, releasing all waiting shadow calls.
    ///
    /// Idempotent and safe while proxies are mid-call. Returns `false` if
    /// the state was already closed.
    ///
    /// NOTE: a store added to this struct must be closed here too.
    pub fn close(&self) -> bool {
        let first = self.close.close();
        self.input.close();
        self.validate.close();
        self.configure.close();
        self.validate_resource.close();
        self.apply.close();
        self.diff.close();
        self.refresh.close();
        self.import_state.close();
        self.validate_data_source.close();
        self.read_data_diff.close();
        self.read_data_apply.close();

        if first {
            tracing::debug!(keys = self.recorded_keys(), "shared shadow state closed");
        }
        first
    }

    /// Returns true once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.close.is_closed()
    }

    /// Number of keys and single-slot cells holding a recorded call.
    pub fn recorded_keys(&self) -> usize {
        let cells = [
            self.close.value().is_some(),
            self.input.value().is_some(),
            self.validate.value().is_some(),
            self.configure.value().is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();

        cells
            + self.validate_resource.len()
            + self.apply.len()
            + self.diff.len()
            + self.refresh.len()
            + self.import_state.len()
            + self.validate_data_source.len()
            + self.read_data_diff.len()
            + self.read_data_apply.len()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
