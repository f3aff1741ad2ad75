//! Engine input envelope - already-resolved structured references.
//!
//! No free text reaches this engine. The upstream extraction and
//! classification collaborators hand over catalog ids, category tokens,
//! generic geometry, and enumerated classification signals; this module
//! is just the typed shape of that handoff.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::units;
use crate::catalog::{ConicalLevel, Device, FitLogic, Geometry, Overrides};

/// Canonical engine input envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineInput {
    /// Display name -> resolved catalog reference. BTreeMap so slot
    /// construction order is deterministic across runs.
    #[serde(default)]
    pub devices: BTreeMap<String, ResolvedDeviceRef>,
    /// Open category slots, to be expanded against the snapshot.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Generic-specification slots: geometry with no catalog identity.
    #[serde(default)]
    pub generic_specs: Vec<GenericSpec>,
    /// Device ids from a prior filtering step, treated as one virtual
    /// category slot with pre-resolved members.
    #[serde(default)]
    pub prior_device_ids: Vec<String>,
    /// Query-shape signals from the external classifier.
    pub classification: QueryClassification,
    /// Require inner working length >= outer working length at every
    /// junction. Falls back to the engine config default when absent.
    #[serde(default)]
    pub check_length: Option<bool>,
    /// Optional candidate filters for discovery queries.
    #[serde(default)]
    pub discovery_filters: DiscoveryFilters,
}

/// One display name as resolved by the upstream name-resolution step.
/// Several catalog ids (product variants) expand branch-wise, exactly
/// like a small category.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedDeviceRef {
    pub catalog_ids: Vec<String>,
    #[serde(default)]
    pub category_hint: Option<String>,
}

/// Geometry-only slot: "any device with these dimensions". Carries its
/// own conical level because there is no catalog identity to infer one
/// from. Dimensions accepted in mm or inch; normalized on synthesis.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenericSpec {
    pub label: Option<String>,
    pub conical_level: Option<ConicalLevel>,
    pub inner_diameter_mm: Option<f64>,
    pub inner_diameter_in: Option<f64>,
    pub od_distal_mm: Option<f64>,
    pub od_distal_in: Option<f64>,
    pub od_proximal_mm: Option<f64>,
    pub od_proximal_in: Option<f64>,
    pub working_length_mm: Option<f64>,
    pub working_length_cm: Option<f64>,
}

impl GenericSpec {
    /// Synthesize the placeholder device: no identity, no overrides, only
    /// the supplied geometry. The evaluator treats it like any other
    /// device from here on.
    pub fn synthesize(&self, ordinal: usize, level: ConicalLevel) -> Device {
        let name = self
            .label
            .clone()
            .unwrap_or_else(|| format!("generic-spec-{}", ordinal + 1));
        Device {
            id: None,
            product_name: name.clone(),
            device_name: name,
            manufacturer: None,
            category_type: "generic".to_string(),
            conical_level: level,
            fit_logic: FitLogic::OdId,
            logic_categories: Vec::new(),
            geometry: Geometry {
                inner_diameter_mm: units::diameter_mm(
                    self.inner_diameter_mm,
                    self.inner_diameter_in,
                    None,
                ),
                od_distal_mm: units::diameter_mm(self.od_distal_mm, self.od_distal_in, None),
                od_proximal_mm: units::diameter_mm(self.od_proximal_mm, self.od_proximal_in, None),
                working_length_mm: units::length_mm(self.working_length_mm, self.working_length_cm),
            },
            overrides: Overrides::default(),
        }
    }
}

/// Optional discovery candidate filters supplied by an upstream
/// filtering step.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiscoveryFilters {
    pub manufacturer: Option<String>,
    pub max_od_mm: Option<f64>,
    pub min_id_mm: Option<f64>,
    pub min_length_mm: Option<f64>,
}

// ============================================================================
// Classification signals
// ============================================================================

/// What the user is trying to accomplish (classified upstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    Exploratory,
    Specific,
    Comparison,
    Discovery,
    StackValidation,
}

/// What tone the user expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFraming {
    Positive,
    Negative,
    Neutral,
}

/// What shape the input takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStructure {
    TwoDevice,
    MultiDevice,
    NamedPlusCategory,
    SingleDevice,
    CategoryOnly,
}

/// Classifier output consumed as data. This engine never interprets free
/// text; an unrecognized value fails deserialization upstream of the
/// pipeline, which is the intended input-validation behavior.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QueryClassification {
    pub mode: QueryMode,
    pub framing: ResponseFraming,
    pub structure: QueryStructure,
    pub confidence: f64,
}
