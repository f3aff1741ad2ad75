//! Configuration generation - candidate nestings from resolved slots.
//!
//! Fixed slots contribute one device; branch slots (categories, multi-id
//! display names, prior-result virtual categories) contribute one device
//! per member, cross-product across all branch positions. Every candidate
//! is ordered outermost-first by conical level. Two *resolved* devices at
//! the same level are an invalid request; a level collision introduced by
//! branch expansion only drops that candidate.
//!
//! Expansion is bounded: past the candidate cap the generator truncates
//! by catalog order and reports the drop count, which the decision layer
//! surfaces as a partial result.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::Device;
use crate::error::{EngineError, EngineResult};

/// One position in a candidate configuration.
#[derive(Debug, Clone)]
pub enum ConfigurationSlot {
    /// A single resolved device (or generic placeholder).
    Fixed(Arc<Device>),
    /// A position with alternatives: category members, product variants,
    /// or a prior filtering step's device list.
    Branch {
        label: String,
        members: Vec<Arc<Device>>,
    },
}

impl ConfigurationSlot {
    fn members(&self) -> &[Arc<Device>] {
        match self {
            Self::Fixed(d) => std::slice::from_ref(d),
            Self::Branch { members, .. } => members,
        }
    }
}

/// One candidate nesting, outermost first, strictly ordered by conical
/// level. Immutable once built.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub index: usize,
    pub devices: Vec<Arc<Device>>,
}

impl Configuration {
    pub fn labels(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.label().to_string()).collect()
    }
}

/// Generator output plus expansion accounting for the normalizer and the
/// envelope.
#[derive(Debug, Clone, Default)]
pub struct GeneratedSet {
    pub configurations: Vec<Configuration>,
    pub truncated: bool,
    /// Candidates never materialized: past-cap combinations plus
    /// level-collision drops.
    pub dropped_candidates: usize,
    /// Labels of slot members that reached no kept configuration.
    pub excluded_labels: Vec<String>,
}

/// Universe of labels the generator was asked to place; the quality
/// invariant traces each of these into a junction or an exclusion note.
pub fn slot_labels(slots: &[ConfigurationSlot]) -> Vec<String> {
    let mut labels = BTreeSet::new();
    for slot in slots {
        for d in slot.members() {
            labels.insert(d.label().to_string());
        }
    }
    labels.into_iter().collect()
}

/// Produce the candidate configurations for one query.
pub fn generate(slots: &[ConfigurationSlot], max_candidates: usize) -> EngineResult<GeneratedSet> {
    if slots.len() < 2 {
        return Err(EngineError::InvalidInput(format!(
            "a configuration needs at least 2 slots, got {}",
            slots.len()
        )));
    }

    // Ties between resolved devices are an invalid request, never
    // auto-broken.
    let fixed: Vec<&Arc<Device>> = slots
        .iter()
        .filter_map(|s| match s {
            ConfigurationSlot::Fixed(d) => Some(d),
            _ => None,
        })
        .collect();
    for (i, a) in fixed.iter().enumerate() {
        for b in &fixed[i + 1..] {
            if a.conical_level == b.conical_level {
                return Err(EngineError::TiedConicalLevels {
                    a: a.label().to_string(),
                    b: b.label().to_string(),
                    level: a.conical_level,
                });
            }
        }
    }

    for slot in slots {
        if let ConfigurationSlot::Branch { label, members } = slot {
            if members.is_empty() {
                return Err(EngineError::InvalidInput(format!(
                    "slot '{label}' has no members to expand"
                )));
            }
        }
    }

    let total_combinations: usize = slots
        .iter()
        .map(|s| s.members().len())
        .fold(1usize, |acc, n| acc.saturating_mul(n));

    let mut configurations = Vec::new();
    let mut dropped = 0usize;
    let mut examined = 0usize;
    let mut truncated = false;

    // Odometer over member indices, slot order; members are already in
    // catalog order, so truncation by iteration order is truncation by
    // catalog order.
    let mut cursor = vec![0usize; slots.len()];
    'expansion: loop {
        if configurations.len() >= max_candidates {
            truncated = true;
            dropped += total_combinations - examined;
            break;
        }

        examined += 1;
        let mut devices: Vec<Arc<Device>> = cursor
            .iter()
            .zip(slots)
            .map(|(&i, slot)| Arc::clone(&slot.members()[i]))
            .collect();
        devices.sort_by_key(|d| d.conical_level);

        let collides = devices
            .windows(2)
            .any(|w| w[0].conical_level == w[1].conical_level);
        if collides {
            // Only reachable through branch expansion; resolved ties were
            // rejected above.
            dropped += 1;
        } else {
            configurations.push(Configuration {
                index: configurations.len(),
                devices,
            });
        }

        // Advance the odometer.
        for pos in (0..cursor.len()).rev() {
            cursor[pos] += 1;
            if cursor[pos] < slots[pos].members().len() {
                continue 'expansion;
            }
            cursor[pos] = 0;
        }
        break;
    }

    if configurations.is_empty() && dropped > 0 {
        warn!(dropped, "every expanded candidate collided on conical level");
    }

    // Members that reached no kept configuration are explicitly excluded,
    // so the quality invariant can still account for them.
    let used: BTreeSet<&str> = configurations
        .iter()
        .flat_map(|c| c.devices.iter().map(|d| d.label()))
        .collect();
    let excluded_labels: Vec<String> = slot_labels(slots)
        .into_iter()
        .filter(|l| !used.contains(l.as_str()))
        .collect();

    debug!(
        kept = configurations.len(),
        dropped, truncated, "configuration expansion finished"
    );

    Ok(GeneratedSet {
        configurations,
        truncated,
        dropped_candidates: dropped,
        excluded_labels,
    })
}
