//! Dual-walk scenarios.

use serde::Serialize;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// Both walks issue the same calls in the same order
    Faithful,

    /// The shadow walk tampers with state before each refresh
    DriftedState,

    /// The shadow walk visits objects in a different order
    ReorderedValidation,

    /// The real walk starts late, so the shadow waits on every call
    ShadowFirst,

    /// The shadow walk touches a resource the real walk never does
    OrphanCall,

    /// Data-source reads alongside managed resources
    DataSources,

    /// Many resources split across concurrent lanes on both sides
    Swarm,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Faithful,
            ScenarioId::DriftedState,
            ScenarioId::ReorderedValidation,
            ScenarioId::ShadowFirst,
            ScenarioId::OrphanCall,
            ScenarioId::DataSources,
            ScenarioId::Swarm,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Faithful => "faithful",
            ScenarioId::DriftedState => "drifted_state",
            ScenarioId::ReorderedValidation => "reordered_validation",
            ScenarioId::ShadowFirst => "shadow_first",
            ScenarioId::OrphanCall => "orphan_call",
            ScenarioId::DataSources => "data_sources",
            ScenarioId::Swarm => "swarm",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Faithful => "identical walks, expect zero divergences",
            ScenarioId::DriftedState => "shadow state drifts before refresh, one divergence per resource",
            ScenarioId::ReorderedValidation => "shadow walk in another order, matched by config",
            ScenarioId::ShadowFirst => "real walk delayed, shadow blocks until each call is published",
            ScenarioId::OrphanCall => "extra shadow resource, reported as unknown calls at close",
            ScenarioId::DataSources => "data-source validation and reads replayed",
            ScenarioId::Swarm => "4x resources across 4 concurrent lanes per walk",
        }
    }

    /// Returns true if the shadow walk is expected to diverge.
    pub fn expects_divergence(&self) -> bool {
        matches!(self, ScenarioId::DriftedState | ScenarioId::OrphanCall)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "faithful" => Ok(ScenarioId::Faithful),
            "drifted_state" | "drift" => Ok(ScenarioId::DriftedState),
            "reordered_validation" | "reordered" => Ok(ScenarioId::ReorderedValidation),
            "shadow_first" => Ok(ScenarioId::ShadowFirst),
            "orphan_call" | "orphan" => Ok(ScenarioId::OrphanCall),
            "data_sources" => Ok(ScenarioId::DataSources),
            "swarm" => Ok(ScenarioId::Swarm),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
            assert_eq!(scenario.to_string(), scenario.name());
        }
        assert_eq!("Shadow-First".parse::<ScenarioId>(), Ok(ScenarioId::ShadowFirst));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_serializes_as_name() {
        let json = serde_json::to_string(&ScenarioId::OrphanCall).unwrap();
        assert_eq!(json, "\"orphan_call\"");
    }
}
