//! Unit normalization for catalog geometry.
//!
//! Catalog records carry each dimension in up to three units (inch,
//! millimeter, French; lengths in centimeters). Everything is converted to
//! millimeters once, at load time; the rest of the engine never compares
//! across units.

pub const MM_PER_INCH: f64 = 25.4;
pub const MM_PER_CM: f64 = 10.0;
/// 3 French = 1 mm.
pub const FRENCH_PER_MM: f64 = 3.0;

pub fn inches_to_mm(v: f64) -> f64 {
    v * MM_PER_INCH
}

pub fn french_to_mm(v: f64) -> f64 {
    v / FRENCH_PER_MM
}

pub fn cm_to_mm(v: f64) -> f64 {
    v * MM_PER_CM
}

/// Pick the canonical value for a diameter given whichever unit fields the
/// record carries. Preference order: mm (no conversion), inch, French.
pub fn diameter_mm(mm: Option<f64>, inches: Option<f64>, french: Option<f64>) -> Option<f64> {
    mm.or(inches.map(inches_to_mm)).or(french.map(french_to_mm))
}

/// Canonical value for a length field (records store lengths in cm).
pub fn length_mm(mm: Option<f64>, cm: Option<f64>) -> Option<f64> {
    mm.or(cm.map(cm_to_mm))
}
