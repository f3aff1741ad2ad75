//! Junction evaluation - does the inner device physically fit inside the
//! outer device?
//!
//! Resolution order: device-declared overrides first (they supersede
//! generic geometry for their direction), then the generic OD-inside-ID
//! comparison, then the optional length requirement. All comparisons are
//! canonical millimeters. This function never errors: an unmeasurable
//! dimension is a `missing-specification` failure inside the result.

use serde::{Deserialize, Serialize};

use crate::catalog::{Device, LogicCategory};
use crate::config::EngineConfig;

/// Machine-checkable reason a junction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCode {
    /// Inner outer-diameter exceeds the bore (or a max-OD override).
    OdExceedsId,
    /// Inner working length does not reach the outer's distal end.
    InsufficientLength,
    /// A dimension needed by the applicable rule is not in the catalog.
    MissingSpecification,
    /// Outer bore is below an inner-declared minimum container ID.
    IdBelowMinimum,
    /// Outer bore falls outside the inner's required-catheter-ID span.
    RequiredIdMismatch,
}

/// Which rule decided the junction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleApplied {
    /// Outer-declared max guidewire OD.
    WireMaxOd,
    /// Outer-declared max catheter OD.
    CatheterMaxOd,
    /// Inner-declared required ID of the containing catheter.
    RequiredCatheterId,
    /// Inner-declared minimum guide/sheath/catheter ID.
    ContainerMinId,
    /// Generic OD-inside-ID geometry.
    Geometry,
    /// Length reach requirement.
    Length,
}

impl RuleApplied {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WireMaxOd => "wire_max_od",
            Self::CatheterMaxOd => "catheter_max_od",
            Self::RequiredCatheterId => "required_catheter_id",
            Self::ContainerMinId => "container_min_id",
            Self::Geometry => "geometry",
            Self::Length => "length",
        }
    }
}

/// Verdict for one adjacent pair. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JunctionResult {
    pub outer: String,
    pub inner: String,
    pub passed: bool,
    /// Positive clearance / negative overlap, canonical mm. Absent when
    /// the applicable rule could not be measured.
    pub margin_mm: Option<f64>,
    pub rule: RuleApplied,
    /// Passing but inside the warn band (tight clearance).
    pub warning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureCode>,
}

/// One applicable check, before rollup.
struct Check {
    rule: RuleApplied,
    margin_mm: Option<f64>,
    passed: bool,
    failure: Option<FailureCode>,
}

impl Check {
    fn missing(rule: RuleApplied) -> Self {
        Self {
            rule,
            margin_mm: None,
            passed: false,
            failure: Some(FailureCode::MissingSpecification),
        }
    }
}

/// Collect every override check that applies to this pair. Overrides are
/// matched by the counterpart's logic category, so a generic placeholder
/// (no categories, no overrides) falls straight through to geometry.
fn applicable_overrides(outer: &Device, inner: &Device) -> Vec<Check> {
    let mut checks = Vec::new();

    // Outer-declared: largest wire OD accepted inside.
    if let Some(max_od) = outer.overrides.wire_max_od_mm {
        if inner.has_logic_category(LogicCategory::Wire) {
            checks.push(match inner.geometry.od_distal_mm {
                Some(od) => Check {
                    rule: RuleApplied::WireMaxOd,
                    margin_mm: Some(max_od - od),
                    passed: od <= max_od,
                    failure: (od > max_od).then_some(FailureCode::OdExceedsId),
                },
                None => Check::missing(RuleApplied::WireMaxOd),
            });
        }
    }

    // Outer-declared: largest catheter OD accepted inside.
    if let Some(max_od) = outer.overrides.catheter_max_od_mm {
        if inner.has_logic_category(LogicCategory::Catheter) {
            checks.push(match inner.geometry.od_distal_mm {
                Some(od) => Check {
                    rule: RuleApplied::CatheterMaxOd,
                    margin_mm: Some(max_od - od),
                    passed: od <= max_od,
                    failure: (od > max_od).then_some(FailureCode::OdExceedsId),
                },
                None => Check::missing(RuleApplied::CatheterMaxOd),
            });
        }
    }

    // Inner-declared: the containing catheter must have this exact ID
    // (or fall inside the span).
    if let Some(span) = inner.overrides.required_catheter_id_mm {
        if outer.has_logic_category(LogicCategory::Catheter) {
            checks.push(match outer.geometry.inner_diameter_mm {
                Some(id) => {
                    let passed = span.contains(id);
                    // Clearance to the nearest bound; negative when outside.
                    let margin = (id - span.min).min(span.max - id);
                    Check {
                        rule: RuleApplied::RequiredCatheterId,
                        margin_mm: Some(margin),
                        passed,
                        failure: (!passed).then_some(FailureCode::RequiredIdMismatch),
                    }
                }
                None => Check::missing(RuleApplied::RequiredCatheterId),
            });
        }
    }

    // Inner-declared: minimum guide/sheath/catheter ID that can contain it.
    if let Some(min_id) = inner.overrides.container_min_id_mm {
        let outer_is_container = outer.has_logic_category(LogicCategory::Guide)
            || outer.has_logic_category(LogicCategory::Sheath)
            || outer.has_logic_category(LogicCategory::Catheter);
        if outer_is_container {
            checks.push(match outer.geometry.inner_diameter_mm {
                Some(id) => Check {
                    rule: RuleApplied::ContainerMinId,
                    margin_mm: Some(id - min_id),
                    passed: id >= min_id,
                    failure: (id < min_id).then_some(FailureCode::IdBelowMinimum),
                },
                None => Check::missing(RuleApplied::ContainerMinId),
            });
        }
    }

    checks
}

/// Generic OD-inside-ID comparison. Zero margin is an exact fit and passes.
fn geometry_check(outer: &Device, inner: &Device) -> Check {
    match (outer.geometry.inner_diameter_mm, inner.geometry.od_distal_mm) {
        (Some(bore), Some(od)) => {
            let margin = bore - od;
            Check {
                rule: RuleApplied::Geometry,
                margin_mm: Some(margin),
                passed: margin >= 0.0,
                failure: (margin < 0.0).then_some(FailureCode::OdExceedsId),
            }
        }
        _ => Check::missing(RuleApplied::Geometry),
    }
}

/// Roll a set of applicable checks into the junction verdict: every check
/// must pass, and the reported rule/margin is the tightest one (the first
/// failure when failing).
fn roll_up(outer: &Device, inner: &Device, checks: Vec<Check>) -> JunctionResult {
    let decisive = checks
        .iter()
        .filter(|c| !c.passed)
        .min_by(|a, b| compare_margins(a.margin_mm, b.margin_mm))
        .or_else(|| {
            checks
                .iter()
                .min_by(|a, b| compare_margins(a.margin_mm, b.margin_mm))
        });
    // Callers always supply at least one check; an empty set still
    // degrades to a measurable failure rather than a panic.
    let (margin_mm, rule, failure) = match decisive {
        Some(c) => (c.margin_mm, c.rule, c.failure),
        None => (None, RuleApplied::Geometry, Some(FailureCode::MissingSpecification)),
    };

    JunctionResult {
        outer: outer.label().to_string(),
        inner: inner.label().to_string(),
        passed: !checks.is_empty() && checks.iter().all(|c| c.passed),
        margin_mm,
        rule,
        warning: false,
        failure,
    }
}

fn compare_margins(a: Option<f64>, b: Option<f64>) -> std::cmp::Ordering {
    // Unmeasured sorts first: a missing-specification check is decisive.
    match (a, b) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
    }
}

/// Evaluate one adjacent pair. Pure and bounded; safe to run on any task
/// concurrently against the shared read-only snapshot.
pub fn evaluate_junction(
    outer: &Device,
    inner: &Device,
    check_length: bool,
    config: &EngineConfig,
) -> JunctionResult {
    let overrides = applicable_overrides(outer, inner);
    let mut result = if overrides.is_empty() {
        roll_up(outer, inner, vec![geometry_check(outer, inner)])
    } else {
        roll_up(outer, inner, overrides)
    };

    // Length is a separate requirement with its own failure code; only
    // meaningful once the diameter verdict passed.
    if result.passed && check_length {
        match (
            inner.geometry.working_length_mm,
            outer.geometry.working_length_mm,
        ) {
            (Some(inner_len), Some(outer_len)) => {
                let reach = inner_len - outer_len;
                if reach < 0.0 {
                    result.passed = false;
                    result.rule = RuleApplied::Length;
                    result.margin_mm = Some(reach);
                    result.failure = Some(FailureCode::InsufficientLength);
                } else if reach < config.length_warn_mm {
                    result.warning = true;
                }
            }
            _ => {
                result.passed = false;
                result.rule = RuleApplied::Length;
                result.margin_mm = None;
                result.failure = Some(FailureCode::MissingSpecification);
            }
        }
    }

    // Tight diameter clearance on a passing junction is worth flagging.
    if result.passed && result.rule != RuleApplied::Length {
        if let Some(margin) = result.margin_mm {
            if margin < config.diameter_warn_mm {
                result.warning = true;
            }
        }
    }

    result
}
