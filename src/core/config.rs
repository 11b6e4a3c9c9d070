//! Engine configuration with documented constants
//!
//! All tunable numbers used by the arbitration engine are collected here.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::arbitration::policy::MissingResourceAction;
use crate::core::error::Result;

/// Configuration for the arbitration engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Shortfalls at or below this amount are not reported
    ///
    /// Floating accumulation across labour members and transmutation
    /// packets leaves tiny residues that are not real shortages.
    pub shortfall_epsilon: f64,

    /// Deepest transmutation chain the resolver will follow
    ///
    /// A chain A <- B <- C has depth 2. Exceeding the bound is treated as a
    /// configuration error, the same as a detected cycle.
    pub max_transmutation_depth: usize,

    /// Per person limit on labour days requested by a transmutation
    ///
    /// Transmutation labour has no owning requirement, so it gets no
    /// minimum and this maximum.
    pub transmutation_labour_max_per_person: f64,

    /// Policy applied when a request names a pool the model does not hold
    pub default_missing_resource_action: MissingResourceAction,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shortfall_epsilon: 1e-6,
            max_transmutation_depth: 8,
            transmutation_labour_max_per_person: 1000.0,
            default_missing_resource_action: MissingResourceAction::Ignore,
        }
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML string; missing keys keep their defaults
    pub fn parse_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load_from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!((config.shortfall_epsilon - 1e-6).abs() < 1e-12);
        assert_eq!(config.max_transmutation_depth, 8);
        assert_eq!(
            config.default_missing_resource_action,
            MissingResourceAction::Ignore
        );
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = EngineConfig::parse_toml(
            r#"
max_transmutation_depth = 3
default_missing_resource_action = "ReportWarning"
"#,
        )
        .expect("Should parse");
        assert_eq!(config.max_transmutation_depth, 3);
        assert_eq!(
            config.default_missing_resource_action,
            MissingResourceAction::ReportWarning
        );
        // untouched keys fall back to defaults
        assert!((config.transmutation_labour_max_per_person - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = EngineConfig::parse_toml("max_transmutation_depth = \"deep\"");
        assert!(result.is_err());
    }
}
