//! Result normalization - shape validation and flattening.
//!
//! Runs after the analyzer and before the envelope. Two duties:
//!
//! 1. Quality invariant: every label the generator was asked to place is
//!    traceable into at least one junction or an explicit exclusion note,
//!    and every adjacent pair in every configuration has exactly one
//!    junction. A violation means the generator and analyzer disagree on
//!    configuration shape - an internal contract breach, fatal and
//!    distinct from any bad-input error.
//! 2. Flattening: uniform per-junction rows so the narrative collaborator
//!    never recomputes anything.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::engine::analyzer::ConfigurationResult;
use crate::engine::junction::{FailureCode, RuleApplied};
use crate::error::{EngineError, EngineResult};

/// One junction, flattened. The `path` is the full device sequence of the
/// configuration the junction belongs to, outermost first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatRecord {
    pub configuration: usize,
    pub path: Vec<String>,
    pub junction: usize,
    pub outer: String,
    pub inner: String,
    pub rule: RuleApplied,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin_mm: Option<f64>,
    pub passed: bool,
    pub warning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureCode>,
}

/// Normalizer output carried on the envelope.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedResults {
    pub records: Vec<FlatRecord>,
    /// Labels that reached no junction, each covered by an exclusion note
    /// from the generator (truncation or level collision).
    pub unreachable: Vec<String>,
}

fn check_shape(result: &ConfigurationResult) -> EngineResult<()> {
    let expected = result.devices.len().saturating_sub(1);
    if result.junctions.len() != expected {
        return Err(EngineError::InvariantViolation(format!(
            "configuration {} has {} devices but {} junctions",
            result.index,
            result.devices.len(),
            result.junctions.len()
        )));
    }
    for (i, junction) in result.junctions.iter().enumerate() {
        if junction.outer != result.devices[i] || junction.inner != result.devices[i + 1] {
            return Err(EngineError::InvariantViolation(format!(
                "configuration {} junction {} covers {}>{} but the device \
                 sequence has {}>{}",
                result.index,
                i,
                junction.outer,
                junction.inner,
                result.devices[i],
                result.devices[i + 1]
            )));
        }
    }
    Ok(())
}

/// Validate the result shape and flatten it.
///
/// `placed_labels` is the full universe the generator was asked to place;
/// `excluded_labels` are its explicit exclusion notes.
pub fn normalize(
    results: &[ConfigurationResult],
    placed_labels: &[String],
    excluded_labels: &[String],
) -> EngineResult<NormalizedResults> {
    let mut records = Vec::new();
    let mut traced: BTreeSet<&str> = BTreeSet::new();

    for result in results {
        check_shape(result).inspect_err(|e| error!(%e, "quality invariant violated"))?;
        for (i, junction) in result.junctions.iter().enumerate() {
            traced.insert(junction.outer.as_str());
            traced.insert(junction.inner.as_str());
            records.push(FlatRecord {
                configuration: result.index,
                path: result.devices.clone(),
                junction: i,
                outer: junction.outer.clone(),
                inner: junction.inner.clone(),
                rule: junction.rule,
                margin_mm: junction.margin_mm,
                passed: junction.passed,
                warning: junction.warning,
                failure: junction.failure,
            });
        }
    }

    let excluded: BTreeSet<&str> = excluded_labels.iter().map(String::as_str).collect();
    let mut unreachable = Vec::new();
    for label in placed_labels {
        if traced.contains(label.as_str()) {
            continue;
        }
        if excluded.contains(label.as_str()) {
            unreachable.push(label.clone());
        } else {
            let violation = EngineError::InvariantViolation(format!(
                "device '{label}' reached no junction and carries no exclusion note"
            ));
            error!(%violation, "quality invariant violated");
            return Err(violation);
        }
    }

    Ok(NormalizedResults { records, unreachable })
}
