//! Decision routing - the business-rule table over analyzer outcome and
//! query shape.
//!
//! The table is the complete transition function. Every defined row is
//! matched explicitly; anything else is an input-validation error, never
//! a default guess.

use serde::{Deserialize, Serialize};

use crate::engine::analyzer::EvaluationSummary;
use crate::engine::input::{EngineInput, QueryClassification, QueryMode, ResponseFraming};
use crate::error::{EngineError, EngineResult};

/// Rolled-up analyzer outcome. `Pass` means at least one candidate
/// configuration passed every junction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    pub fn from_summary(summary: &EvaluationSummary) -> Self {
        if summary.passing > 0 {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

/// Framing signal collapsed from the classifier's mode and tone.
/// Exploratory intent (including stack validation) dominates tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Exploratory,
    Confirmatory,
    Neutral,
}

impl Framing {
    pub fn from_classification(c: &QueryClassification) -> Self {
        match c.mode {
            QueryMode::Exploratory | QueryMode::Discovery | QueryMode::StackValidation => {
                Self::Exploratory
            }
            _ => match c.framing {
                ResponseFraming::Positive => Self::Confirmatory,
                ResponseFraming::Negative | ResponseFraming::Neutral => Self::Neutral,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exploratory => "exploratory",
            Self::Confirmatory => "confirmatory",
            Self::Neutral => "neutral",
        }
    }
}

/// What the router decided to do with the analyzer's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutedAction {
    /// Configuration result returned unchanged.
    ReturnAsIs,
    /// Full stack failed; localize with subset search.
    RunSubsetSearch,
    /// Two-device failure the user expected to pass; flag so the
    /// narrative layer softens phrasing.
    FlagGentleCorrection,
    /// Two-device failure, raw reason, no softening.
    ReturnFailure,
    /// Open category slot; route to discovery instead of generation.
    RunDiscovery,
}

/// A discovery-shaped query bypasses generation entirely: discovery
/// intent with exactly one open category slot to search. Exploratory
/// queries with category slots still go through generation, where the
/// cross-product machinery handles them.
pub fn is_discovery_query(input: &EngineInput) -> bool {
    input.classification.mode == QueryMode::Discovery && input.categories.len() == 1
}

/// The transition table. `device_count` is the number of devices per
/// candidate configuration (slot count).
pub fn route(outcome: Outcome, device_count: usize, framing: Framing) -> EngineResult<RoutedAction> {
    match (outcome, device_count, framing) {
        (Outcome::Pass, _, _) => Ok(RoutedAction::ReturnAsIs),
        (Outcome::Fail, n, Framing::Exploratory) if n >= 3 => Ok(RoutedAction::RunSubsetSearch),
        (Outcome::Fail, 2, Framing::Confirmatory) => Ok(RoutedAction::FlagGentleCorrection),
        (Outcome::Fail, 2, Framing::Neutral) => Ok(RoutedAction::ReturnFailure),
        (outcome, device_count, framing) => Err(EngineError::UnroutableDecision {
            outcome: outcome.as_str().to_string(),
            device_count,
            framing: framing.as_str().to_string(),
        }),
    }
}
