//! Runtime configuration, environment variable names and the log filter.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::blood_bank::DonorSearchPolicy;
use crate::error::{CareMatchError, Result};
use crate::scoring::ScoringWeights;

pub const CONFIG_ENV: &str = "CARE_MATCH_CONFIG";
pub const DATA_ENV: &str = "CARE_MATCH_DATA";
pub const HISTORY_ENV: &str = "CARE_MATCH_HISTORY";
pub const DEFAULT_HISTORY_PATH: &str = "recommendations.csv";

pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_DOCTORS_PER_HOSPITAL: usize = 3;
pub const DEFAULT_DATASET_SEED: u64 = 42;

pub fn default_log_filter() -> &'static str {
    "care_match=info"
}

/// Runtime configuration. Every field has a default, so a partial JSON file
/// only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CareMatchConfig {
    pub scoring: ScoringWeights,
    pub donor_search: DonorSearchPolicy,
    /// City used when a query names a city that is not in the table.
    pub default_city: String,
    pub default_top_n: usize,
    pub doctors_per_hospital: usize,
    pub dataset_seed: u64,
}

impl Default for CareMatchConfig {
    fn default() -> Self {
        CareMatchConfig {
            scoring: ScoringWeights::default(),
            donor_search: DonorSearchPolicy::default(),
            default_city: "Delhi".to_string(),
            default_top_n: DEFAULT_TOP_N,
            doctors_per_hospital: DEFAULT_DOCTORS_PER_HOSPITAL,
            dataset_seed: DEFAULT_DATASET_SEED,
        }
    }
}

impl CareMatchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: CareMatchConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.donor_search.validate()?;
        if self.default_top_n == 0 {
            return Err(CareMatchError::InvalidConfig("default_top_n must be at least 1".into()));
        }
        if self.default_city.trim().is_empty() {
            return Err(CareMatchError::InvalidConfig("default_city is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        CareMatchConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_top_n": 5, "donor_search": { "widening_factor": 1.5 } }"#).unwrap();

        let config = CareMatchConfig::load(&path).unwrap();
        assert_eq!(config.default_top_n, 5);
        assert_eq!(config.donor_search.widening_factor, 1.5);
        assert_eq!(config.donor_search.widened_fraction, DonorSearchPolicy::default().widened_fraction);
        assert_eq!(config.scoring, ScoringWeights::default());
        assert_eq!(config.default_city, "Delhi");
    }

    #[test]
    fn rejects_weights_that_do_not_sum_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "scoring": { "specialty": 0.5 } }"#).unwrap();
        assert!(matches!(
            CareMatchConfig::load(&path),
            Err(CareMatchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_zero_top_n() {
        let config = CareMatchConfig {
            default_top_n: 0,
            ..CareMatchConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
