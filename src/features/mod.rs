//! Target feature expansion
//!
//! For every available target `c` adds:
//! - `c_diff` (first difference, first period recorded as `0.0`)
//! - `c_diff_ma{w}` trailing means of the difference
//! - `c_diff_pct_change` (missing and division by zero become `0.0`)
//! - `c_diff_lag{k}` and `c_lag{k}`
//!
//! Rows with any missing value are dropped only after all columns exist.
//!
//! The `0.0` first difference is a placeholder even when an earlier period
//! existed before the derived stage trimmed it. With the deepest lag at 6 it
//! resurfaces as `c_diff_lag6` in the first surviving row.

use crate::error::{PipelineError, Result};
use crate::table::IndicatorTable;
use crate::timeseries::ops;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration for feature expansion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Target indicators, in output order
    pub targets: Vec<String>,
    /// Rolling mean windows applied to each difference
    pub rolling_windows: Vec<usize>,
    /// Lag depths applied to each difference and level
    pub lags: Vec<usize>,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            targets: vec![
                "construction_bsi_actual".to_string(),
                "base_rate".to_string(),
                "housing_sale_price".to_string(),
                "m2_growth".to_string(),
                "credit_spread".to_string(),
            ],
            rolling_windows: vec![3, 6],
            lags: vec![1, 3, 6],
        }
    }
}

impl ExpansionConfig {
    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_lags(mut self, lags: Vec<usize>) -> Self {
        self.lags = lags;
        self
    }

    pub fn with_rolling_windows(mut self, windows: Vec<usize>) -> Self {
        self.rolling_windows = windows;
        self
    }

    /// Rows consumed by the deepest lag
    pub fn warm_up(&self) -> usize {
        self.lags.iter().copied().max().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rolling_windows.contains(&0) {
            return Err(PipelineError::ConfigError(
                "rolling windows must be at least 1".to_string(),
            ));
        }
        if self.lags.contains(&0) {
            return Err(PipelineError::ConfigError("lags must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Configured targets resolved against a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSet {
    available: Vec<String>,
}

impl TargetSet {
    /// Keep the configured targets present in `table`, in configured order
    pub fn resolve(targets: &[String], table: &IndicatorTable) -> Self {
        let available: Vec<String> = targets
            .iter()
            .filter(|t| table.has_column(t))
            .cloned()
            .collect();

        if available.len() < targets.len() {
            debug!(
                configured = targets.len(),
                available = available.len(),
                "Some targets are not present"
            );
        }

        Self { available }
    }

    pub fn available_targets(&self) -> &[String] {
        &self.available
    }

    /// Names of the difference targets (`<target>_diff`)
    pub fn diff_targets(&self) -> Vec<String> {
        self.available.iter().map(|t| diff_name(t)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}

fn diff_name(target: &str) -> String {
    format!("{}_diff", target)
}

/// Expands targets into difference, rolling, pct-change and lag features
#[derive(Debug, Clone, Default)]
pub struct FeatureExpander {
    config: ExpansionConfig,
}

impl FeatureExpander {
    pub fn new(config: ExpansionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    /// Add every expanded column without dropping incomplete rows
    pub fn expand_columns(&self, table: &IndicatorTable) -> Result<(IndicatorTable, TargetSet)> {
        let targets = TargetSet::resolve(&self.config.targets, table);
        let mut out = table.clone();

        for target in targets.available_targets() {
            let mut diff = ops::difference(table.require(target)?, 1, 1.0);
            if let Some(first) = diff.first_mut() {
                *first = 0.0;
            }
            out.insert_column(diff_name(target), diff)?;
        }

        for target in targets.available_targets() {
            let level = table.require(target)?.clone();
            let diff_col = diff_name(target);
            let diff = out.require(&diff_col)?.clone();

            for &window in &self.config.rolling_windows {
                out.insert_column(
                    format!("{}_ma{}", diff_col, window),
                    ops::rolling_mean(&diff, window, 1),
                )?;
            }

            let pct = ops::pct_change(&diff, 1.0).mapv(|v| if v.is_finite() { v } else { 0.0 });
            out.insert_column(format!("{}_pct_change", diff_col), pct)?;

            for &lag in &self.config.lags {
                out.insert_column(format!("{}_lag{}", diff_col, lag), ops::shift(&diff, lag))?;
                out.insert_column(format!("{}_lag{}", target, lag), ops::shift(&level, lag))?;
            }
        }

        Ok((out, targets))
    }

    /// Expand and drop every row that still has a missing value
    pub fn expand(&self, table: &IndicatorTable) -> Result<(IndicatorTable, TargetSet)> {
        let (expanded, targets) = self.expand_columns(table)?;

        let keep: Vec<bool> = (0..expanded.len())
            .map(|row| expanded.iter().all(|(_, values)| !values[row].is_nan()))
            .collect();
        let complete = expanded.filter_rows(&keep)?;

        info!(
            targets = targets.available_targets().len(),
            columns = complete.width(),
            rows_in = expanded.len(),
            rows_out = complete.len(),
            "Expanded target features"
        );

        Ok((complete, targets))
    }
}
