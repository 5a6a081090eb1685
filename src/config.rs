//! Analysis configuration knobs.
//!
//! Every threshold the validator, analyzer and recommender consult lives here
//! and is passed explicitly. Nothing in the core reads the environment.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Primary key for choosing between paths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathMetric {
    /// Fewest hops; inverse capacity breaks ties between equally short paths
    #[default]
    Hops,
    /// OSPF-style inverse capacity summed along the path
    InverseCapacity,
}

/// Thresholds and policy values consumed by the analysis stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Utilization ratio above which a link is reported as highly utilized
    pub high_utilization_threshold: f64,
    /// Utilization ratio above which the recommender asks for an upgrade
    pub upgrade_utilization_threshold: f64,
    /// Minimum number of affected device pairs for a link to be critical
    pub criticality_pair_threshold: usize,
    /// A pair is affected by a link removal when its cost grows by more than this factor
    pub cost_increase_ratio: f64,
    /// Path cost metric
    pub path_metric: PathMetric,
    /// Reference bandwidth for link cost: `max(1, ceil(reference / capacity))`
    pub reference_bandwidth_bps: u64,
    /// Links below this capacity are not used for routing
    pub min_usable_capacity_bps: u64,
    /// Capacity assumed when neither a link nor its endpoints declare one
    pub default_capacity_bps: u64,
    /// Per-pair demand for the all-to-all load estimate (disabled when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demand_per_pair_bps: Option<u64>,
    /// Work budget for path and criticality computations (unbounded when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u64>,
    /// Number of leaf devices that triggers the aggregation suggestion
    pub leaf_aggregation_min: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            high_utilization_threshold: 0.8,
            upgrade_utilization_threshold: 0.95,
            criticality_pair_threshold: 1,
            cost_increase_ratio: 1.5,
            path_metric: PathMetric::Hops,
            reference_bandwidth_bps: 100_000_000,
            min_usable_capacity_bps: 0,
            default_capacity_bps: 1_000_000_000,
            demand_per_pair_bps: None,
            max_steps: None,
            leaf_aggregation_min: 3,
        }
    }
}

impl AnalysisConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::positive_ratio("high_utilization_threshold", self.high_utilization_threshold)?;
        Self::positive_ratio("upgrade_utilization_threshold", self.upgrade_utilization_threshold)?;
        Self::positive_ratio("cost_increase_ratio", self.cost_increase_ratio)?;

        if self.cost_increase_ratio < 1.0 {
            return Err(ConfigError::Invalid {
                field: "cost_increase_ratio",
                reason: format!("must be at least 1.0, got {}", self.cost_increase_ratio),
            });
        }
        if self.reference_bandwidth_bps == 0 {
            return Err(ConfigError::Invalid {
                field: "reference_bandwidth_bps",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.default_capacity_bps == 0 {
            return Err(ConfigError::Invalid {
                field: "default_capacity_bps",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.criticality_pair_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "criticality_pair_threshold",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn positive_ratio(field: &'static str, value: f64) -> Result<(), ConfigError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::Invalid {
                field,
                reason: format!("must be a positive finite number, got {}", value),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.high_utilization_threshold, 0.8);
        assert_eq!(config.criticality_pair_threshold, 1);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
high_utilization_threshold: 0.7
max_steps: 5000
"#;
        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.high_utilization_threshold, 0.7);
        assert_eq!(config.max_steps, Some(5000));
        assert_eq!(config.reference_bandwidth_bps, 100_000_000);
        assert_eq!(config.path_metric, PathMetric::Hops);
        assert!(config.validate().is_ok());

        let config: AnalysisConfig = serde_yaml::from_str("path_metric: inverse-capacity\n").unwrap();
        assert_eq!(config.path_metric, PathMetric::InverseCapacity);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = AnalysisConfig::default();
        config.high_utilization_threshold = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.reference_bandwidth_bps = 0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.cost_increase_ratio = 0.5;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.criticality_pair_threshold = 0;
        assert!(config.validate().is_err());
    }
}
