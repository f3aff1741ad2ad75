// src/config/mod.rs
// Engine policy values. Defaults are compiled in; every value can be
// overridden through the environment (MEDSTACK_*), loaded once via dotenvy.

use once_cell::sync::Lazy;

/// Policy values for one engine instance. The engine holds its own copy,
/// so tests can tune caps and thresholds without touching the process env.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum candidate configurations per query; expansion beyond this
    /// truncates (by catalog order) and the result is flagged partial.
    pub max_candidates: usize,
    /// Passing diameter junctions with clearance below this are flagged
    /// as warnings (0.003 in).
    pub diameter_warn_mm: f64,
    /// Passing length junctions with less excess reach than this are
    /// flagged as warnings (5 cm).
    pub length_warn_mm: f64,
    /// Whether junctions also require inner length >= outer length when
    /// the request does not say.
    pub check_length_default: bool,
    /// Confidence subtracted when candidates were dropped by truncation.
    pub truncation_confidence_penalty: f64,
    /// Confidence subtracted when any passing junction carries a warning.
    pub warning_confidence_penalty: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_candidates: 200,
            diameter_warn_mm: 0.0762,
            length_warn_mm: 50.0,
            check_length_default: false,
            truncation_confidence_penalty: 0.2,
            warning_confidence_penalty: 0.05,
        }
    }
}

impl EngineConfig {
    /// Load config from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MEDSTACK_MAX_CANDIDATES") {
            if let Ok(n) = val.parse() {
                config.max_candidates = n;
            }
        }
        if let Ok(val) = std::env::var("MEDSTACK_DIAMETER_WARN_MM") {
            if let Ok(v) = val.parse() {
                config.diameter_warn_mm = v;
            }
        }
        if let Ok(val) = std::env::var("MEDSTACK_LENGTH_WARN_MM") {
            if let Ok(v) = val.parse() {
                config.length_warn_mm = v;
            }
        }
        if let Ok(val) = std::env::var("MEDSTACK_CHECK_LENGTH") {
            config.check_length_default = val == "1" || val.to_lowercase() == "true";
        }

        config
    }
}

/// Process-wide config for the binary; library callers construct their own.
pub static CONFIG: Lazy<EngineConfig> = Lazy::new(EngineConfig::from_env);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let c = EngineConfig::default();
        assert_eq!(c.max_candidates, 200);
        assert!((c.diameter_warn_mm - 0.0762).abs() < 1e-12);
        assert_eq!(c.length_warn_mm, 50.0);
        assert!(!c.check_length_default);
    }
}
