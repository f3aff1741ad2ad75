//! Configuration analysis - junction rollup and subset search.
//!
//! A configuration passes iff every junction passes (exact logical AND).
//! When a configuration of three or more devices fails, subset search
//! removes one device at a time, re-closes the gap, and re-evaluates; the
//! search is depth-bounded to a single removal round. If no single
//! removal passes, the outcome is an explicit "no viable subset", never a
//! deeper power-set walk.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::generator::Configuration;
use crate::engine::junction::{evaluate_junction, JunctionResult};

/// Rollup for one candidate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationResult {
    pub index: usize,
    /// Device labels, outermost first.
    pub devices: Vec<String>,
    pub passed: bool,
    /// Any passing junction sits inside a warn band.
    pub warning: bool,
    pub junctions: Vec<JunctionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subset: Option<SubsetOutcome>,
}

/// Result of the bounded subset search on a failing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubsetOutcome {
    Found(SubsetResult),
    /// No single removal yields a passing sub-sequence.
    NoViableSubset,
}

/// The largest passing sub-sequence found (one removal in the bounded
/// base case).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsetResult {
    pub removed: Vec<String>,
    pub devices: Vec<String>,
    pub junctions: Vec<JunctionResult>,
}

/// Counts the decision router and the envelope work from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub total: usize,
    pub passing: usize,
    pub failing: usize,
    pub warnings: usize,
}

fn evaluate_junctions(
    devices: &[std::sync::Arc<crate::catalog::Device>],
    check_length: bool,
    config: &EngineConfig,
) -> Vec<JunctionResult> {
    devices
        .windows(2)
        .map(|pair| evaluate_junction(&pair[0], &pair[1], check_length, config))
        .collect()
}

/// Evaluate every junction of one configuration and roll up the verdict.
pub fn evaluate_configuration(
    configuration: &Configuration,
    check_length: bool,
    config: &EngineConfig,
) -> ConfigurationResult {
    let junctions = evaluate_junctions(&configuration.devices, check_length, config);
    let passed = junctions.iter().all(|j| j.passed);
    let warning = junctions.iter().any(|j| j.warning);
    ConfigurationResult {
        index: configuration.index,
        devices: configuration.labels(),
        passed,
        warning,
        junctions,
        subset: None,
    }
}

pub fn summarize(results: &[ConfigurationResult]) -> EvaluationSummary {
    EvaluationSummary {
        total: results.len(),
        passing: results.iter().filter(|r| r.passed).count(),
        failing: results.iter().filter(|r| !r.passed).count(),
        warnings: results.iter().filter(|r| r.warning).count(),
    }
}

/// Single-removal subset search over a failing configuration of three or
/// more devices.
///
/// Among passing single-removal subsets the choice prefers removing a
/// device that participated in a failing junction, innermost first
/// (clinical practice favors preserving outer access devices).
pub fn subset_search(
    configuration: &Configuration,
    full_result: &ConfigurationResult,
    check_length: bool,
    config: &EngineConfig,
) -> SubsetOutcome {
    debug_assert!(configuration.devices.len() >= 3);

    let failing_labels: Vec<&str> = full_result
        .junctions
        .iter()
        .filter(|j| !j.passed)
        .flat_map(|j| [j.outer.as_str(), j.inner.as_str()])
        .collect();

    struct Candidate {
        removed_at: usize,
        implicated: bool,
        junctions: Vec<JunctionResult>,
        devices: Vec<String>,
    }

    let mut passing: Vec<Candidate> = Vec::new();
    for removed_at in 0..configuration.devices.len() {
        let mut rest = configuration.devices.clone();
        let removed = rest.remove(removed_at);
        // Re-closing the gap: former neighbors of the removed device are
        // now directly adjacent in `rest`.
        let junctions = evaluate_junctions(&rest, check_length, config);
        if junctions.iter().all(|j| j.passed) {
            passing.push(Candidate {
                removed_at,
                implicated: failing_labels.contains(&removed.label()),
                junctions,
                devices: rest.iter().map(|d| d.label().to_string()).collect(),
            });
        }
    }

    // Innermost position is the highest index after the outermost-first
    // sort, so prefer implicated candidates, then the largest index.
    passing.sort_by_key(|c| (std::cmp::Reverse(c.implicated), std::cmp::Reverse(c.removed_at)));

    match passing.into_iter().next() {
        Some(best) => SubsetOutcome::Found(SubsetResult {
            removed: vec![configuration.devices[best.removed_at].label().to_string()],
            devices: best.devices,
            junctions: best.junctions,
        }),
        None => SubsetOutcome::NoViableSubset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        ConicalLevel, Device, FitLogic, Geometry, LogicCategory, Overrides, units,
    };
    use std::sync::Arc;

    fn device(id: &str, level: ConicalLevel, bore_in: Option<f64>, od_in: Option<f64>) -> Arc<Device> {
        Arc::new(Device {
            id: Some(id.to_string()),
            product_name: id.to_string(),
            device_name: id.to_string(),
            manufacturer: None,
            category_type: "test".to_string(),
            conical_level: level,
            fit_logic: FitLogic::OdId,
            logic_categories: vec![LogicCategory::Catheter],
            geometry: Geometry {
                inner_diameter_mm: bore_in.map(units::inches_to_mm),
                od_distal_mm: od_in.map(units::inches_to_mm),
                od_proximal_mm: None,
                working_length_mm: None,
            },
            overrides: Overrides::default(),
        })
    }

    fn config(devices: Vec<Arc<Device>>) -> Configuration {
        Configuration { index: 0, devices }
    }

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_verdict_is_exact_and_of_junctions() {
        // guide(0.070) > dac(0.060 bore / 0.068 od) > micro(0.027 od)
        let c = config(vec![
            device("guide", ConicalLevel::L1, Some(0.070), None),
            device("dac", ConicalLevel::L2, Some(0.060), Some(0.068)),
            device("micro", ConicalLevel::L3, Some(0.017), Some(0.027)),
        ]);
        let r = evaluate_configuration(&c, false, &cfg());
        assert_eq!(r.junctions.len(), 2);
        assert_eq!(r.passed, r.junctions.iter().all(|j| j.passed));
        assert!(r.passed);

        // Flip one junction: oversized middle device
        let c = config(vec![
            device("guide", ConicalLevel::L1, Some(0.070), None),
            device("dac", ConicalLevel::L2, Some(0.060), Some(0.074)),
            device("micro", ConicalLevel::L3, Some(0.017), Some(0.027)),
        ]);
        let r = evaluate_configuration(&c, false, &cfg());
        assert!(!r.passed);
        assert!(!r.junctions[0].passed);
        assert!(r.junctions[1].passed);
    }

    #[test]
    fn test_subset_search_removes_oversized_middle_device() {
        // Middle device is too fat for the guide but the micro fits the
        // guide directly once the gap is closed.
        let c = config(vec![
            device("guide", ConicalLevel::L1, Some(0.070), None),
            device("dac", ConicalLevel::L2, Some(0.060), Some(0.074)),
            device("micro", ConicalLevel::L3, Some(0.017), Some(0.027)),
        ]);
        let full = evaluate_configuration(&c, false, &cfg());
        assert!(!full.passed);

        match subset_search(&c, &full, false, &cfg()) {
            SubsetOutcome::Found(s) => {
                assert_eq!(s.removed, vec!["dac"]);
                assert_eq!(s.devices, vec!["guide", "micro"]);
                assert!(s.junctions.iter().all(|j| j.passed));
            }
            SubsetOutcome::NoViableSubset => panic!("expected a viable subset"),
        }
    }

    #[test]
    fn test_subset_search_never_returns_failing_subset() {
        // Every pair is incompatible; no single removal can pass.
        let c = config(vec![
            device("a", ConicalLevel::L1, Some(0.010), Some(0.090)),
            device("b", ConicalLevel::L2, Some(0.010), Some(0.090)),
            device("c", ConicalLevel::L3, Some(0.010), Some(0.090)),
        ]);
        let full = evaluate_configuration(&c, false, &cfg());
        assert!(matches!(
            subset_search(&c, &full, false, &cfg()),
            SubsetOutcome::NoViableSubset
        ));
    }

    #[test]
    fn test_subset_tie_prefers_innermost_implicated_device() {
        // Both the middle and the innermost device are implicated in the
        // failing junction between them, and removing either passes.
        // The innermost one must go.
        let c = config(vec![
            device("guide", ConicalLevel::L1, Some(0.070), None),
            device("dac", ConicalLevel::L2, Some(0.020), Some(0.068)),
            device("micro", ConicalLevel::L3, Some(0.017), Some(0.027)),
        ]);
        let full = evaluate_configuration(&c, false, &cfg());
        assert!(!full.passed); // micro (0.027) does not fit dac (0.020)

        match subset_search(&c, &full, false, &cfg()) {
            SubsetOutcome::Found(s) => assert_eq!(s.removed, vec!["micro"]),
            SubsetOutcome::NoViableSubset => panic!("expected a viable subset"),
        }
    }

    #[test]
    fn test_summary_counts() {
        let pass = config(vec![
            device("guide", ConicalLevel::L1, Some(0.070), None),
            device("micro", ConicalLevel::L3, Some(0.017), Some(0.027)),
        ]);
        let fail = config(vec![
            device("guide", ConicalLevel::L1, Some(0.070), None),
            device("fat", ConicalLevel::L3, Some(0.017), Some(0.074)),
        ]);
        let results = vec![
            evaluate_configuration(&pass, false, &cfg()),
            evaluate_configuration(&fail, false, &cfg()),
        ];
        let s = summarize(&results);
        assert_eq!((s.total, s.passing, s.failing), (2, 1, 1));
    }
}
