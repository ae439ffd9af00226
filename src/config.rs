//! Pipeline configuration

use crate::derive::{Derivation, DerivedConfig, LevelCorrection};
use crate::error::{PipelineError, Result};
use crate::features::ExpansionConfig;
use crate::selection::SelectionConfig;
use crate::timeseries::{AlignConfig, IncompletePeriod};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the full feature pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Date column and incomplete-period handling
    pub align: AlignConfig,

    /// Derived columns and the post-derivation row drop
    pub derived: DerivedConfig,

    /// Level-to-growth correction applied before derivation
    pub level_correction: LevelCorrection,

    /// Targets, rolling windows and lags
    pub expansion: ExpansionConfig,

    /// Correlation filter settings
    pub selection: SelectionConfig,
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builder method to set the target indicators
    pub fn with_targets<S: Into<String>>(mut self, targets: impl IntoIterator<Item = S>) -> Self {
        self.expansion.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set the incomplete period handling
    pub fn with_incomplete_period(mut self, incomplete: IncompletePeriod) -> Self {
        self.align.incomplete_period = incomplete;
        self
    }

    /// Builder method to append a derivation
    pub fn with_derivation(mut self, derivation: Derivation) -> Self {
        self.derived.derivations.push(derivation);
        self
    }

    /// Builder method to set the level flag of the corrected column
    pub fn with_is_level(mut self, is_level: bool) -> Self {
        self.level_correction.is_level = Some(is_level);
        self
    }

    /// Builder method to replace the selection settings
    pub fn with_selection(mut self, selection: SelectionConfig) -> Self {
        self.selection = selection;
        self
    }

    /// Check the configuration for values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.align.date_column.trim().is_empty() {
            return Err(PipelineError::ConfigError(
                "date column name must not be empty".to_string(),
            ));
        }
        for derivation in &self.derived.derivations {
            if let Derivation::RollingMean { window: 0, output, .. } = derivation {
                return Err(PipelineError::ConfigError(format!(
                    "rolling window of '{}' must be at least 1",
                    output
                )));
            }
        }
        let threshold = self.level_correction.magnitude_threshold;
        if threshold.is_nan() || threshold < 0.0 {
            return Err(PipelineError::ConfigError(
                "magnitude threshold must be non-negative".to_string(),
            ));
        }
        self.expansion.validate()?;
        self.selection.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.align.date_column, "date");
        assert_eq!(config.expansion.lags, vec![1, 3, 6]);
        assert_eq!(config.selection.min_features, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PipelineConfig::new()
            .with_targets(["base_rate"])
            .with_incomplete_period(IncompletePeriod::Disabled)
            .with_is_level(false);

        assert_eq!(config.expansion.targets, vec!["base_rate".to_string()]);
        assert_eq!(config.align.incomplete_period, IncompletePeriod::Disabled);
        assert_eq!(config.level_correction.is_level, Some(false));
    }

    #[test]
    fn test_partial_json() {
        let config = PipelineConfig::from_json(
            r#"{"selection": {"threshold": 0.9}, "align": {"incomplete_period": "disabled"}}"#,
        )
        .unwrap();
        assert!((config.selection.threshold - 0.9).abs() < 1e-12);
        assert_eq!(config.selection.min_features, 20);
        assert_eq!(config.align.incomplete_period, IncompletePeriod::Disabled);
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let config = PipelineConfig::new().with_targets(["cpi", "esi"]);
        let file = tempfile::NamedTempFile::with_suffix(".json").unwrap();
        std::fs::write(file.path(), config.to_json().unwrap()).unwrap();

        let loaded = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let bad = PipelineConfig::from_json(r#"{"selection": {"ratio": 2.0}}"#);
        assert!(matches!(bad, Err(PipelineError::ConfigError(_))));

        let zero_window = PipelineConfig::new()
            .with_derivation(Derivation::rolling_mean("cpi", "cpi_ma0", 0));
        assert!(zero_window.validate().is_err());
    }
}
