//! Queueing scenarios with known analytic answers.

use serde::{Deserialize, Serialize};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// Single server, unbounded queue
    Mm1,

    /// Parallel servers sharing one queue
    Mmc,

    /// Single server with a bounded waiting room; arrivals finding it full
    /// are turned away
    FiniteBuffer,

    /// Handling then restoring under one shared capacity
    TwoStage,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Mm1,
            ScenarioId::Mmc,
            ScenarioId::FiniteBuffer,
            ScenarioId::TwoStage,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Mm1 => "mm1",
            ScenarioId::Mmc => "mmc",
            ScenarioId::FiniteBuffer => "finite_buffer",
            ScenarioId::TwoStage => "two_stage",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Mm1 => "Generator -> queue -> 1 server, utilization vs λ·E[S]",
            ScenarioId::Mmc => "Generator -> queue -> c servers, utilization vs λ·E[S]/c",
            ScenarioId::FiniteBuffer => "M/M/1/K with turned-away arrivals, blocking vs closed form",
            ScenarioId::TwoStage => "Generator -> queue -> handling + restoring, shared capacity",
        }
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
        match s.to_lowercase().as_str() {
            "mm1" | "m/m/1" => Ok(ScenarioId::Mm1),
            "mmc" | "m/m/c" => Ok(ScenarioId::Mmc),
            "finite_buffer" | "finitebuffer" | "mm1k" | "m/m/1/k" => Ok(ScenarioId::FiniteBuffer),
            "two_stage" | "twostage" => Ok(ScenarioId::TwoStage),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>().unwrap(), id);
            assert!(!id.description().is_empty());
        }
        assert_eq!("M/M/1/K".parse::<ScenarioId>().unwrap(), ScenarioId::FiniteBuffer);
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
