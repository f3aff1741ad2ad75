//! The single result envelope every pipeline path produces.
//!
//! The narrative collaborator downstream must never compute anything:
//! verdicts, margins, failure codes, exclusion notes, and the routed
//! action are all present as data.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::engine::analyzer::{ConfigurationResult, EvaluationSummary};
use crate::engine::decision::RoutedAction;
use crate::engine::discovery::DiscoveryItem;
use crate::engine::normalizer::FlatRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Complete,
    /// Candidate expansion was truncated; `dropped_candidates` says how
    /// much was cut.
    Partial,
    Error,
    NeedsClarification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    CompatibilityCheck,
    StackValidation,
    DeviceDiscovery,
}

/// The envelope. One shape regardless of which path produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope {
    pub status: Status,
    #[serde(rename = "resultType")]
    pub result_type: ResultType,
    pub configurations: Vec<ConfigurationResult>,
    /// Passing category members, present only for discovery queries.
    /// Each element is a device record plus its certification keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery: Option<Vec<DiscoveryItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_category: Option<String>,
    pub candidates_considered: usize,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<RoutedAction>,
    pub gentle_correction: bool,
    pub dropped_candidates: usize,
    pub unreachable: Vec<String>,
    pub warnings_present: bool,
    pub records: Vec<FlatRecord>,
    pub summary: EvaluationSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ResultEnvelope {
    pub fn empty(status: Status, result_type: ResultType, note: impl Into<String>) -> Self {
        Self {
            status,
            result_type,
            configurations: Vec::new(),
            discovery: None,
            discovery_category: None,
            candidates_considered: 0,
            confidence: 0.0,
            action: None,
            gentle_correction: false,
            dropped_candidates: 0,
            unreachable: Vec::new(),
            warnings_present: false,
            records: Vec::new(),
            summary: EvaluationSummary::default(),
            note: Some(note.into()),
        }
    }
}

/// Degrade the classifier's confidence for truncation and warn-band
/// clearances, clamped to [0, 1].
pub fn degraded_confidence(
    base: f64,
    truncated: bool,
    warnings_present: bool,
    config: &EngineConfig,
) -> f64 {
    let mut c = base;
    if truncated {
        c -= config.truncation_confidence_penalty;
    }
    if warnings_present {
        c -= config.warning_confidence_penalty;
    }
    c.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_degrades_and_clamps() {
        let cfg = EngineConfig::default();
        assert_eq!(degraded_confidence(0.9, false, false, &cfg), 0.9);
        assert!((degraded_confidence(0.9, true, false, &cfg) - 0.7).abs() < 1e-9);
        assert!((degraded_confidence(0.9, true, true, &cfg) - 0.65).abs() < 1e-9);
        assert_eq!(degraded_confidence(0.1, true, true, &cfg), 0.0);
    }

    #[test]
    fn test_wire_shape_matches_consumer_contract() {
        let env = ResultEnvelope::empty(
            Status::Error,
            ResultType::CompatibilityCheck,
            "cancelled before generation",
        );
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["resultType"], "compatibility_check");
        assert!(v["configurations"].as_array().unwrap().is_empty());
        assert!(v.get("discovery").is_none());
        assert_eq!(v["confidence"], 0.0);
    }
}
