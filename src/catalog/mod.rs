//! Device catalog model and snapshot access.
//!
//! The catalog itself lives outside this engine (the Device Catalog
//! Accessor collaborator); this module defines the typed device record,
//! the immutable request-scoped snapshot the engine evaluates against,
//! and a JSON-file accessor used by the CLI harness and tests.
//!
//! All geometry is normalized to millimeters at load time (see `units`).

pub mod units;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, EngineResult};

// ============================================================================
// Hierarchy and classification
// ============================================================================

/// Ordinal rank in the nesting hierarchy. Lower is outermost; `LW` (wire)
/// is always innermost. The derived `Ord` follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConicalLevel {
    L0,
    L1,
    L2,
    L3,
    L4,
    L5,
    #[serde(rename = "LW")]
    Lw,
}

impl ConicalLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L0 => "L0",
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::L4 => "L4",
            Self::L5 => "L5",
            Self::Lw => "LW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "L0" => Some(Self::L0),
            "L1" => Some(Self::L1),
            "L2" => Some(Self::L2),
            "L3" => Some(Self::L3),
            "L4" => Some(Self::L4),
            "L5" => Some(Self::L5),
            "LW" => Some(Self::Lw),
            _ => None,
        }
    }

    pub fn is_wire(&self) -> bool {
        matches!(self, Self::Lw)
    }
}

impl std::fmt::Display for ConicalLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which comparison rule family applies to a device. Only OD/ID checking
/// exists today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitLogic {
    #[default]
    OdId,
}

/// Role the device plays when override fields are matched against it.
/// A device may carry several (e.g. a guide catheter is both guide and
/// catheter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicCategory {
    Wire,
    Catheter,
    Guide,
    Sheath,
}

impl LogicCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "wire" => Some(Self::Wire),
            "catheter" => Some(Self::Catheter),
            "guide" => Some(Self::Guide),
            "sheath" => Some(Self::Sheath),
            _ => None,
        }
    }
}

// ============================================================================
// Geometry and overrides
// ============================================================================

/// Device geometry, canonical millimeters. Any field may be unmeasured;
/// the junction evaluator turns that into a `missing-specification`
/// failure rather than an error.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub inner_diameter_mm: Option<f64>,
    pub od_distal_mm: Option<f64>,
    pub od_proximal_mm: Option<f64>,
    pub working_length_mm: Option<f64>,
}

/// Inclusive value span, used by the required-ID override (catalog data
/// encodes it as either an exact value or a "low-high" range).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpanMm {
    pub min: f64,
    pub max: f64,
}

impl SpanMm {
    pub fn exact(v: f64) -> Self {
        Self { min: v, max: v }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }
}

/// Device-declared exception values that supersede the generic OD/ID
/// comparison for a junction direction.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Overrides {
    /// Largest guidewire OD this device accepts inside it.
    pub wire_max_od_mm: Option<f64>,
    /// Largest catheter OD this device accepts inside it.
    pub catheter_max_od_mm: Option<f64>,
    /// ID the catheter outside this device must have (exact or range).
    pub required_catheter_id_mm: Option<SpanMm>,
    /// Smallest guide/sheath/catheter ID that can contain this device.
    pub container_min_id_mm: Option<f64>,
}

// ============================================================================
// Device
// ============================================================================

/// A catalog device record, or a generic-specification placeholder
/// (`id: None`) carrying only geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    pub product_name: String,
    pub device_name: String,
    pub manufacturer: Option<String>,
    pub category_type: String,
    pub conical_level: ConicalLevel,
    pub fit_logic: FitLogic,
    pub logic_categories: Vec<LogicCategory>,
    pub geometry: Geometry,
    pub overrides: Overrides,
}

impl Device {
    /// Stable label for results: catalog id, or the placeholder's name.
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.device_name)
    }

    pub fn is_generic(&self) -> bool {
        self.id.is_none()
    }

    pub fn has_logic_category(&self, cat: LogicCategory) -> bool {
        self.logic_categories.contains(&cat)
    }
}

// ============================================================================
// Raw records and loading
// ============================================================================

/// Exact value or "low-high" text, as stored in the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSpan {
    Number(f64),
    Text(String),
}

impl RawSpan {
    fn to_span(&self) -> Option<SpanMm> {
        match self {
            Self::Number(v) => Some(SpanMm::exact(*v)),
            Self::Text(s) => {
                let s = s.trim();
                if let Some((lo, hi)) = s.split_once('-') {
                    match (lo.trim().parse::<f64>(), hi.trim().parse::<f64>()) {
                        (Ok(lo), Ok(hi)) => return Some(SpanMm { min: lo, max: hi }),
                        _ => {}
                    }
                }
                s.parse::<f64>().ok().map(SpanMm::exact)
            }
        }
    }

    fn to_span_mm(&self, from_inches: bool) -> Option<SpanMm> {
        self.to_span().map(|s| {
            if from_inches {
                SpanMm {
                    min: units::inches_to_mm(s.min),
                    max: units::inches_to_mm(s.max),
                }
            } else {
                s
            }
        })
    }
}

/// One catalog document as serialized by the Device Catalog Accessor.
/// Dimensions come in up to three units; the loader normalizes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDeviceRecord {
    pub id: String,
    pub product_name: String,
    pub device_name: String,
    pub manufacturer: Option<String>,
    pub category_type: String,
    pub conical_category: String,
    pub fit_logic: Option<String>,
    /// Space-separated roles, e.g. "catheter guide".
    pub logic_category: Option<String>,

    pub id_in: Option<f64>,
    pub id_mm: Option<f64>,
    pub id_fr: Option<f64>,
    pub od_distal_in: Option<f64>,
    pub od_distal_mm: Option<f64>,
    pub od_distal_fr: Option<f64>,
    pub od_proximal_in: Option<f64>,
    pub od_proximal_mm: Option<f64>,
    pub od_proximal_fr: Option<f64>,
    pub length_cm: Option<f64>,
    pub length_mm: Option<f64>,

    pub wire_max_od_in: Option<f64>,
    pub wire_max_od_mm: Option<f64>,
    pub catheter_max_od_in: Option<f64>,
    pub catheter_max_od_mm: Option<f64>,
    pub catheter_required_id_in: Option<RawSpan>,
    pub catheter_required_id_mm: Option<RawSpan>,
    pub guide_min_id_in: Option<f64>,
    pub guide_min_id_mm: Option<f64>,
}

impl RawDeviceRecord {
    /// Normalize to the typed device. `None` when the record is unusable
    /// (unknown conical level); such records are skipped with a warning,
    /// not fatal.
    fn normalize(&self) -> Option<Device> {
        let conical_level = match ConicalLevel::parse(&self.conical_category) {
            Some(l) => l,
            None => {
                warn!(
                    id = %self.id,
                    level = %self.conical_category,
                    "skipping catalog record with unknown conical level"
                );
                return None;
            }
        };

        let logic_categories = match &self.logic_category {
            Some(raw) => raw
                .split_whitespace()
                .filter_map(LogicCategory::parse)
                .collect(),
            None => Vec::new(),
        };
        // Records without an explicit role default by hierarchy rank.
        let logic_categories = if logic_categories.is_empty() {
            if conical_level.is_wire() {
                vec![LogicCategory::Wire]
            } else {
                vec![LogicCategory::Catheter]
            }
        } else {
            logic_categories
        };

        let required_catheter_id_mm = self
            .catheter_required_id_mm
            .as_ref()
            .and_then(|s| s.to_span_mm(false))
            .or_else(|| {
                self.catheter_required_id_in
                    .as_ref()
                    .and_then(|s| s.to_span_mm(true))
            });

        Some(Device {
            id: Some(self.id.clone()),
            product_name: self.product_name.clone(),
            device_name: self.device_name.clone(),
            manufacturer: self.manufacturer.clone(),
            category_type: self.category_type.clone(),
            conical_level,
            fit_logic: FitLogic::OdId,
            logic_categories,
            geometry: Geometry {
                inner_diameter_mm: units::diameter_mm(self.id_mm, self.id_in, self.id_fr),
                od_distal_mm: units::diameter_mm(
                    self.od_distal_mm,
                    self.od_distal_in,
                    self.od_distal_fr,
                ),
                od_proximal_mm: units::diameter_mm(
                    self.od_proximal_mm,
                    self.od_proximal_in,
                    self.od_proximal_fr,
                ),
                working_length_mm: units::length_mm(self.length_mm, self.length_cm),
            },
            overrides: Overrides {
                wire_max_od_mm: units::diameter_mm(self.wire_max_od_mm, self.wire_max_od_in, None),
                catheter_max_od_mm: units::diameter_mm(
                    self.catheter_max_od_mm,
                    self.catheter_max_od_in,
                    None,
                ),
                required_catheter_id_mm,
                container_min_id_mm: units::diameter_mm(
                    self.guide_min_id_mm,
                    self.guide_min_id_in,
                    None,
                ),
            },
        })
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable, request-scoped view of the catalog. Devices are held in
/// stable catalog order (ascending id) so expansion and truncation are
/// deterministic. Read-only for the lifetime of a query, so junction
/// evaluations need no synchronization.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    devices: Vec<Arc<Device>>,
    by_id: HashMap<String, Arc<Device>>,
}

impl CatalogSnapshot {
    pub fn from_records(records: Vec<RawDeviceRecord>) -> Self {
        let mut devices: Vec<Arc<Device>> = records
            .iter()
            .filter_map(RawDeviceRecord::normalize)
            .map(Arc::new)
            .collect();
        devices.sort_by(|a, b| a.label().cmp(b.label()));

        let by_id = devices
            .iter()
            .filter_map(|d| d.id.clone().map(|id| (id, Arc::clone(d))))
            .collect();

        Self { devices, by_id }
    }

    /// Build directly from typed devices (test fixtures).
    pub fn from_devices(devices: Vec<Device>) -> Self {
        let mut devices: Vec<Arc<Device>> = devices.into_iter().map(Arc::new).collect();
        devices.sort_by(|a, b| a.label().cmp(b.label()));
        let by_id = devices
            .iter()
            .filter_map(|d| d.id.clone().map(|id| (id, Arc::clone(d))))
            .collect();
        Self { devices, by_id }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Device>> {
        self.by_id.get(id).cloned()
    }

    pub fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// All devices whose precise classification is in `types`, catalog order.
    pub fn by_category_types(&self, types: &[&str]) -> Vec<Arc<Device>> {
        self.devices
            .iter()
            .filter(|d| types.iter().any(|t| d.category_type.eq_ignore_ascii_case(t)))
            .cloned()
            .collect()
    }

    /// All devices within an inclusive conical-level range, catalog order.
    pub fn by_level_range(&self, lo: ConicalLevel, hi: ConicalLevel) -> Vec<Arc<Device>> {
        self.devices
            .iter()
            .filter(|d| d.conical_level >= lo && d.conical_level <= hi)
            .cloned()
            .collect()
    }
}

// ============================================================================
// Accessor boundary
// ============================================================================

/// External collaborator boundary: whatever actually holds the catalog
/// (file, database, service) produces one immutable snapshot per request.
/// The engine awaits this exactly once, before generation begins.
#[async_trait]
pub trait CatalogAccessor: Send + Sync {
    async fn snapshot(&self) -> EngineResult<CatalogSnapshot>;
}

/// File-backed accessor for the CLI harness and tests: a JSON array of
/// raw catalog records.
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogAccessor for JsonFileCatalog {
    async fn snapshot(&self) -> EngineResult<CatalogSnapshot> {
        let bytes = tokio::fs::read(&self.path).await?;
        let records: Vec<RawDeviceRecord> = serde_json::from_slice(&bytes)?;
        let snapshot = CatalogSnapshot::from_records(records);
        if snapshot.is_empty() {
            return Err(EngineError::Catalog(format!(
                "catalog at {} contains no usable records",
                self.path.display()
            )));
        }
        Ok(snapshot)
    }
}
