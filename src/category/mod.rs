//! Category resolution - user-facing category tokens to catalog devices.
//!
//! Resolution is static data, not procedural string matching: a fixed
//! token table maps to precise `category_type` sets (with the conical
//! levels those categories occupy), and broad terms fall back to a
//! conical-level range. Both tables are ordered slices, so every lookup
//! path is deterministic. `UnknownCategory` is returned only when
//! neither path matches any device.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::{CatalogSnapshot, ConicalLevel, Device};
use crate::error::{EngineError, EngineResult};

use ConicalLevel::{L0, L1, L2, L3, L4, L5, Lw};

/// Precise mapping for one category token.
#[derive(Debug, Clone, Copy)]
pub struct CategoryMapping {
    pub category_types: &'static [&'static str],
    pub levels: &'static [ConicalLevel],
}

const MICROCATHETERS: CategoryMapping = CategoryMapping {
    category_types: &[
        "microcatheter",
        "balloon_microcatheter",
        "flow_dependent_microcatheter",
        "delivery_catheter",
    ],
    levels: &[L3],
};

const WIRES: CategoryMapping = CategoryMapping {
    category_types: &["guidewire", "microwire"],
    levels: &[Lw],
};

const SHEATHS: CategoryMapping = CategoryMapping {
    category_types: &["sheath"],
    levels: &[L0],
};

const ASPIRATION: CategoryMapping = CategoryMapping {
    category_types: &[
        "aspiration_intermediate_catheter",
        "distal_access_catheter",
        "aspiration_system_component",
    ],
    levels: &[L2],
};

const INTERMEDIATE_CATHETERS: CategoryMapping = CategoryMapping {
    category_types: &[
        "guide_intermediate_catheter",
        "intermediate_catheter",
        "delivery_intermediate_catheter",
        "aspiration_intermediate_catheter",
    ],
    levels: &[L1, L2],
};

const BALLOON_GUIDES: CategoryMapping = CategoryMapping {
    category_types: &["balloon_guide_catheter"],
    levels: &[L1],
};

const STENTS: CategoryMapping = CategoryMapping {
    category_types: &["stent_system", "stent_retriever"],
    levels: &[L4, L5],
};

const DISTAL_ACCESS: CategoryMapping = CategoryMapping {
    category_types: &["distal_access_catheter"],
    levels: &[L2],
};

/// Token table in fixed order; lookups scan it top to bottom.
static CATEGORY_TABLE: &[(&str, CategoryMapping)] = &[
    ("microcatheter", MICROCATHETERS),
    ("micro", MICROCATHETERS),
    ("wire", WIRES),
    ("guidewire", WIRES),
    ("sheath", SHEATHS),
    ("aspiration", ASPIRATION),
    ("intermediate catheter", INTERMEDIATE_CATHETERS),
    ("bgc", BALLOON_GUIDES),
    ("balloon guide catheter", BALLOON_GUIDES),
    ("stent", STENTS),
    ("stent retriever", STENTS),
    ("dac", DISTAL_ACCESS),
    ("distal access catheter", DISTAL_ACCESS),
];

/// Broad terms resolved by conical-level range when the precise table has
/// no entry (or its entry matches nothing in this snapshot).
static BROAD_LEVEL_RANGES: &[(&str, (ConicalLevel, ConicalLevel))] = &[
    ("catheter", (L1, L3)),
    ("guide", (L0, L1)),
    ("access", (L0, L2)),
    ("device", (L0, L5)),
];

/// Look up a token in the precise table: exact key first, then the
/// containment the upstream vocabulary relies on ("a microcatheter"
/// still hits "microcatheter"). Containment is one-directional - a
/// longer user phrase may contain a table key, never the reverse - so a
/// broad term like plain "catheter" falls through to the level ranges
/// instead of being captured by a longer key it happens to sit inside.
/// The longest contained key wins.
fn precise_mapping(token: &str) -> Option<CategoryMapping> {
    let key = token.trim().to_lowercase();
    if let Some((_, m)) = CATEGORY_TABLE.iter().find(|(k, _)| *k == key) {
        return Some(*m);
    }
    CATEGORY_TABLE
        .iter()
        .filter(|(k, _)| key.contains(k))
        .max_by_key(|(k, _)| k.len())
        .map(|(_, m)| *m)
}

fn broad_range(token: &str, mapping: Option<&CategoryMapping>) -> Option<(ConicalLevel, ConicalLevel)> {
    if let Some(m) = mapping {
        let lo = m.levels.iter().min().copied()?;
        let hi = m.levels.iter().max().copied()?;
        return Some((lo, hi));
    }
    let key = token.trim().to_lowercase();
    BROAD_LEVEL_RANGES
        .iter()
        .find(|(k, _)| key.contains(k))
        .map(|(_, r)| *r)
}

/// Expand a category token into catalog devices (catalog order).
///
/// Errors with `UnknownCategory` only when neither the precise nor the
/// broad path yields any device.
pub fn resolve_category(
    token: &str,
    snapshot: &CatalogSnapshot,
) -> EngineResult<Vec<Arc<Device>>> {
    let mapping = precise_mapping(token);

    if let Some(m) = &mapping {
        let members = snapshot.by_category_types(m.category_types);
        if !members.is_empty() {
            debug!(token, members = members.len(), "category resolved via precise table");
            return Ok(members);
        }
    }

    if let Some((lo, hi)) = broad_range(token, mapping.as_ref()) {
        let members = snapshot.by_level_range(lo, hi);
        if !members.is_empty() {
            debug!(token, members = members.len(), %lo, %hi, "category resolved via level range");
            return Ok(members);
        }
    }

    Err(EngineError::UnknownCategory(token.to_string()))
}
