use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

use crate::analysis::AnomalyThresholds;
use crate::normalize::TokenNormalizer;
use crate::reconcile::{MergePolicy, DEFAULT_PERCENTAGE_TOLERANCE};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration for the position reconciler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database path or URL
    pub database_path: String,
    /// APY (percent) above which a position is reported as anomalous
    pub apy_anomaly_threshold: f64,
    /// Percentage points a token split may exceed 100 by
    pub percentage_tolerance: f64,
    /// Number of largest positions listed in reports
    pub report_top_n: usize,
    /// Extra `(variant, canonical)` token aliases on top of the built-in table
    pub token_aliases: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "clm_positions.db".to_string(),
            apy_anomaly_threshold: 1000.0,
            percentage_tolerance: DEFAULT_PERCENTAGE_TOLERANCE,
            report_top_n: 5,
            token_aliases: Vec::new(),
        }
    }
}

impl Config {
    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy::new(self.percentage_tolerance)
    }

    pub fn anomaly_thresholds(&self) -> AnomalyThresholds {
        AnomalyThresholds {
            max_apy: self.apy_anomaly_threshold,
            percentage_tolerance: self.percentage_tolerance,
        }
    }

    /// Built-in alias table extended with the configured entries
    pub fn token_normalizer(&self) -> TokenNormalizer {
        let mut normalizer = TokenNormalizer::default();
        normalizer.extend(self.token_aliases.iter().map(|(from, to)| (from.as_str(), to.as_str())));
        normalizer
    }
}

/// Loads configuration from environment variables, falling back to default values
pub fn load_config() -> Result<Config, ConfigError> {
    load_from(|name| env::var(name).ok())
}

fn load_from<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();

    if let Some(path) = lookup("DATABASE_PATH") {
        config.database_path = path;
    }

    if let Some(value) = lookup("APY_ANOMALY_THRESHOLD") {
        config.apy_anomaly_threshold = parse_non_negative("APY_ANOMALY_THRESHOLD", &value)?;
    }

    if let Some(value) = lookup("PERCENTAGE_TOLERANCE") {
        config.percentage_tolerance = parse_non_negative("PERCENTAGE_TOLERANCE", &value)?;
    }

    if let Some(value) = lookup("REPORT_TOP_N") {
        config.report_top_n = value.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::InvalidValue {
                name: "REPORT_TOP_N",
                value: value.clone(),
                reason: e.to_string(),
            }
        })?;
    }

    if let Some(value) = lookup("TOKEN_ALIASES") {
        config.token_aliases = parse_aliases(&value)?;
    }

    Ok(config)
}

fn parse_non_negative(name: &'static str, value: &str) -> Result<f64, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
        reason,
    };

    let parsed: f64 = value.trim().parse().map_err(|e: std::num::ParseFloatError| invalid(e.to_string()))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(invalid("must be a non-negative number".to_string()));
    }
    Ok(parsed)
}

/// `FROM=TO` entries separated by commas, e.g. `JITOSOL=SOL,MSOL=SOL`
fn parse_aliases(value: &str) -> Result<Vec<(String, String)>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
                Ok((from.trim().to_string(), to.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidValue {
                name: "TOKEN_ALIASES",
                value: entry.to_string(),
                reason: "expected FROM=TO".to_string(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = load_from(lookup_in(&[])).unwrap();

        assert_eq!(config.database_path, "clm_positions.db");
        assert_eq!(config.report_top_n, 5);
        assert_eq!(config.merge_policy(), MergePolicy::default());
        assert_eq!(config.anomaly_thresholds(), AnomalyThresholds::default());
    }

    #[test]
    fn test_values_are_read_from_environment() {
        let config = load_from(lookup_in(&[
            ("DATABASE_PATH", "sqlite::memory:"),
            ("APY_ANOMALY_THRESHOLD", "250"),
            ("PERCENTAGE_TOLERANCE", "1.5"),
            ("REPORT_TOP_N", "10"),
            ("TOKEN_ALIASES", "jitoSOL=SOL, mSOL=SOL"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, "sqlite::memory:");
        assert_eq!(config.anomaly_thresholds().max_apy, 250.0);
        assert_eq!(config.merge_policy().percentage_tolerance, 1.5);
        assert_eq!(config.report_top_n, 10);
        assert_eq!(config.token_normalizer().normalize("MSOL"), "SOL");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = load_from(lookup_in(&[("PERCENTAGE_TOLERANCE", "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "PERCENTAGE_TOLERANCE", .. }));

        assert!(load_from(lookup_in(&[("APY_ANOMALY_THRESHOLD", "high")])).is_err());
        assert!(load_from(lookup_in(&[("REPORT_TOP_N", "-3")])).is_err());
        assert!(load_from(lookup_in(&[("TOKEN_ALIASES", "JITOSOL")])).is_err());
    }
}
