//! Discovery search - which category members fit the anchor devices.
//!
//! Expands the open category, applies any upstream candidate filters,
//! then certifies each candidate with the junction evaluator against
//! every anchor. Orientation per anchor follows conical level: the
//! deeper device is the inner one. The passing subset comes back ordered
//! ascending by the candidate's governing dimension, ties by catalog id,
//! so repeated queries are stable.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::catalog::{CatalogSnapshot, Device};
use crate::category::resolve_category;
use crate::config::EngineConfig;
use crate::engine::input::DiscoveryFilters;
use crate::engine::junction::{evaluate_junction, JunctionResult};
use crate::error::EngineResult;

/// One passing discovery candidate with its certification trail. The
/// device serializes flattened, so the envelope's `discovery` field is a
/// list of device records (with additive certification keys), not a list
/// of wrappers.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryItem {
    #[serde(flatten)]
    pub device: Arc<Device>,
    /// The dimension that decided fit for this candidate, in mm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub governing_dimension_mm: Option<f64>,
    pub junctions: Vec<JunctionResult>,
}

/// Discovery output before envelope assembly.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    pub category: String,
    pub candidates_considered: usize,
    pub matches: Vec<DiscoveryItem>,
}

fn passes_filters(device: &Device, filters: &DiscoveryFilters) -> bool {
    if let Some(wanted) = &filters.manufacturer {
        let found = device
            .manufacturer
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case(wanted));
        if !found {
            return false;
        }
    }
    if let Some(cap) = filters.max_od_mm {
        if !device.geometry.od_distal_mm.is_some_and(|od| od <= cap) {
            return false;
        }
    }
    if let Some(floor) = filters.min_id_mm {
        if !device.geometry.inner_diameter_mm.is_some_and(|id| id >= floor) {
            return false;
        }
    }
    if let Some(floor) = filters.min_length_mm {
        if !device
            .geometry
            .working_length_mm
            .is_some_and(|l| l >= floor)
        {
            return false;
        }
    }
    true
}

/// Evaluate one candidate against every anchor. A candidate at the same
/// conical level as an anchor cannot nest with it, so it fails outright.
fn certify(
    candidate: &Arc<Device>,
    anchors: &[Arc<Device>],
    check_length: bool,
    config: &EngineConfig,
) -> Option<(Vec<JunctionResult>, Option<f64>)> {
    let mut junctions = Vec::with_capacity(anchors.len());
    // The governing dimension is the candidate's side of the comparison
    // in its innermost orientation.
    let mut governing = None;
    for anchor in anchors {
        let result = match candidate.conical_level.cmp(&anchor.conical_level) {
            Ordering::Greater => {
                governing = governing.or(candidate.geometry.od_distal_mm);
                evaluate_junction(anchor, candidate, check_length, config)
            }
            Ordering::Less => {
                governing = governing.or(candidate.geometry.inner_diameter_mm);
                evaluate_junction(candidate, anchor, check_length, config)
            }
            Ordering::Equal => return None,
        };
        if !result.passed {
            return None;
        }
        junctions.push(result);
    }
    Some((junctions, governing))
}

/// Run discovery for one category token against the anchor devices.
///
/// Returns exactly the subset of the category's members the junction
/// evaluator certifies against every anchor. An unknown category
/// propagates as `UnknownCategory`; the pipeline degrades that to a
/// clarification envelope rather than a hard failure.
pub fn discover(
    category: &str,
    anchors: &[Arc<Device>],
    filters: &DiscoveryFilters,
    snapshot: &CatalogSnapshot,
    check_length: bool,
    config: &EngineConfig,
) -> EngineResult<DiscoveryResult> {
    let members = resolve_category(category, snapshot)?;
    let considered = members.len();

    let mut matches: Vec<DiscoveryItem> = members
        .into_iter()
        .filter(|d| passes_filters(d, filters))
        .filter_map(|candidate| {
            certify(&candidate, anchors, check_length, config).map(|(junctions, governing)| {
                DiscoveryItem {
                    device: candidate,
                    governing_dimension_mm: governing,
                    junctions,
                }
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        let dim = a
            .governing_dimension_mm
            .partial_cmp(&b.governing_dimension_mm)
            .unwrap_or(Ordering::Equal);
        dim.then_with(|| a.device.label().cmp(b.device.label()))
    });

    debug!(
        category,
        considered,
        matched = matches.len(),
        "discovery search finished"
    );

    Ok(DiscoveryResult {
        category: category.to_string(),
        candidates_considered: considered,
        matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ConicalLevel, FitLogic, Geometry, LogicCategory, Overrides, units};

    fn micro(id: &str, od_in: f64) -> Device {
        Device {
            id: Some(id.to_string()),
            product_name: id.to_string(),
            device_name: id.to_string(),
            manufacturer: Some("Vastra".to_string()),
            category_type: "microcatheter".to_string(),
            conical_level: ConicalLevel::L3,
            fit_logic: FitLogic::OdId,
            logic_categories: vec![LogicCategory::Catheter],
            geometry: Geometry {
                inner_diameter_mm: Some(units::inches_to_mm(0.017)),
                od_distal_mm: Some(units::inches_to_mm(od_in)),
                od_proximal_mm: None,
                working_length_mm: Some(1500.0),
            },
            overrides: Overrides::default(),
        }
    }

    fn anchor(bore_in: f64) -> Arc<Device> {
        Arc::new(Device {
            id: Some("anchor".to_string()),
            product_name: "anchor".to_string(),
            device_name: "anchor".to_string(),
            manufacturer: None,
            category_type: "guide_intermediate_catheter".to_string(),
            conical_level: ConicalLevel::L1,
            fit_logic: FitLogic::OdId,
            logic_categories: vec![LogicCategory::Guide],
            geometry: Geometry {
                inner_diameter_mm: Some(units::inches_to_mm(bore_in)),
                od_distal_mm: None,
                od_proximal_mm: None,
                working_length_mm: Some(900.0),
            },
            overrides: Overrides::default(),
        })
    }

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_discovery_returns_exact_passing_subset_sorted() {
        // 5 members, 3 with OD <= 0.070 in; ascending by OD.
        let snapshot = CatalogSnapshot::from_devices(vec![
            micro("m-big", 0.074),
            micro("m-mid", 0.053),
            micro("m-slim", 0.027),
            micro("m-huge", 0.090),
            micro("m-exact", 0.070),
        ]);
        let result = discover(
            "microcatheter",
            &[anchor(0.070)],
            &DiscoveryFilters::default(),
            &snapshot,
            false,
            &cfg(),
        )
        .unwrap();

        assert_eq!(result.candidates_considered, 5);
        let ids: Vec<_> = result.matches.iter().map(|m| m.device.label()).collect();
        assert_eq!(ids, vec!["m-slim", "m-mid", "m-exact"]);
        assert!(result
            .matches
            .iter()
            .all(|m| m.junctions.iter().all(|j| j.passed)));
    }

    #[test]
    fn test_ties_break_by_catalog_id() {
        let snapshot = CatalogSnapshot::from_devices(vec![
            micro("m-b", 0.053),
            micro("m-a", 0.053),
        ]);
        let result = discover(
            "microcatheter",
            &[anchor(0.070)],
            &DiscoveryFilters::default(),
            &snapshot,
            false,
            &cfg(),
        )
        .unwrap();
        let ids: Vec<_> = result.matches.iter().map(|m| m.device.label()).collect();
        assert_eq!(ids, vec!["m-a", "m-b"]);
    }

    #[test]
    fn test_filters_narrow_candidates() {
        let snapshot = CatalogSnapshot::from_devices(vec![
            micro("m-slim", 0.027),
            micro("m-mid", 0.053),
        ]);
        let filters = DiscoveryFilters {
            max_od_mm: Some(units::inches_to_mm(0.030)),
            ..DiscoveryFilters::default()
        };
        let result = discover(
            "microcatheter",
            &[anchor(0.070)],
            &filters,
            &snapshot,
            false,
            &cfg(),
        )
        .unwrap();
        let ids: Vec<_> = result.matches.iter().map(|m| m.device.label()).collect();
        assert_eq!(ids, vec!["m-slim"]);
    }

    #[test]
    fn test_manufacturer_filter_is_case_insensitive() {
        let snapshot = CatalogSnapshot::from_devices(vec![micro("m-slim", 0.027)]);
        let filters = DiscoveryFilters {
            manufacturer: Some("vastra".to_string()),
            ..DiscoveryFilters::default()
        };
        let result = discover(
            "microcatheter",
            &[anchor(0.070)],
            &filters,
            &snapshot,
            false,
            &cfg(),
        )
        .unwrap();
        assert_eq!(result.matches.len(), 1);

        let filters = DiscoveryFilters {
            manufacturer: Some("other".to_string()),
            ..DiscoveryFilters::default()
        };
        let result = discover(
            "microcatheter",
            &[anchor(0.070)],
            &filters,
            &snapshot,
            false,
            &cfg(),
        )
        .unwrap();
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_candidate_must_pass_every_anchor() {
        // Second anchor is deeper than the candidates: candidate becomes
        // the outer device and its bore (0.017 in) is too small for a
        // 0.027 in wire-level anchor.
        let deep_anchor = Arc::new(Device {
            conical_level: ConicalLevel::Lw,
            logic_categories: vec![LogicCategory::Wire],
            geometry: Geometry {
                inner_diameter_mm: None,
                od_distal_mm: Some(units::inches_to_mm(0.016)),
                od_proximal_mm: None,
                working_length_mm: Some(2000.0),
            },
            ..(*anchor(0.070)).clone()
        });
        let snapshot = CatalogSnapshot::from_devices(vec![micro("m-mid", 0.053)]);
        let result = discover(
            "microcatheter",
            &[anchor(0.070), deep_anchor],
            &DiscoveryFilters::default(),
            &snapshot,
            false,
            &cfg(),
        )
        .unwrap();
        // 0.016 wire fits the 0.017 bore, so the candidate passes both.
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].junctions.len(), 2);
    }

    #[test]
    fn test_unknown_category_propagates() {
        let snapshot = CatalogSnapshot::from_devices(vec![]);
        assert!(discover(
            "pacemaker lead",
            &[anchor(0.070)],
            &DiscoveryFilters::default(),
            &snapshot,
            false,
            &cfg(),
        )
        .is_err());
    }
}
