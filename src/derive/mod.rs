//! Derived variable generation
//!
//! Adds spreads, scaled differences, percentage changes and trailing means to
//! an aligned indicator table. Each derivation runs only when all of its inputs
//! are present; derivations are resolved in declaration order so a later one
//! may read the output of an earlier one.

mod derivation;

pub use derivation::{default_derivations, Derivation};

use crate::error::Result;
use crate::table::IndicatorTable;
use crate::timeseries::ops;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Derived-column configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivedConfig {
    pub derivations: Vec<Derivation>,
    /// Rows missing the first present column of this list are dropped after derivation
    pub drop_priority: Vec<String>,
}

impl Default for DerivedConfig {
    fn default() -> Self {
        Self {
            derivations: default_derivations(),
            drop_priority: vec!["construction_bsi_mom".to_string(), "cpi_mom".to_string()],
        }
    }
}

impl DerivedConfig {
    pub fn with_derivation(mut self, derivation: Derivation) -> Self {
        self.derivations.push(derivation);
        self
    }

    pub fn with_drop_priority(mut self, columns: Vec<String>) -> Self {
        self.drop_priority = columns;
        self
    }
}

/// Level-to-growth correction for a series that may arrive as a level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelCorrection {
    pub column: String,
    /// `Some(true)` always converts, `Some(false)` never does, `None` uses the magnitude check
    pub is_level: Option<bool>,
    /// Mean absolute value above which the column is taken to be a level
    pub magnitude_threshold: f64,
}

impl Default for LevelCorrection {
    fn default() -> Self {
        Self {
            column: "m2_growth".to_string(),
            is_level: None,
            magnitude_threshold: 10.0,
        }
    }
}

impl LevelCorrection {
    pub fn with_is_level(mut self, is_level: bool) -> Self {
        self.is_level = Some(is_level);
        self
    }

    /// Apply the correction. Returns whether the column was converted.
    pub fn apply(&self, table: &mut IndicatorTable) -> Result<bool> {
        let Some(values) = table.column(&self.column) else {
            return Ok(false);
        };

        let is_level = match self.is_level {
            Some(flag) => flag,
            None => {
                let magnitude = ops::nan_mean(&values.mapv(f64::abs)).unwrap_or(0.0);
                magnitude > self.magnitude_threshold
            }
        };

        if !is_level {
            return Ok(false);
        }

        let growth = ops::pct_change(values, 100.0);
        table.insert_column(self.column.clone(), growth)?;
        info!(column = %self.column, "Converted level series to period-over-period growth");
        Ok(true)
    }
}

/// Computes configured derived columns
#[derive(Debug, Clone, Default)]
pub struct DerivedVariableGenerator {
    config: DerivedConfig,
    level_correction: LevelCorrection,
}

impl DerivedVariableGenerator {
    pub fn new(config: DerivedConfig, level_correction: LevelCorrection) -> Self {
        Self {
            config,
            level_correction,
        }
    }

    /// Derive all satisfiable columns and drop the rows lost to differencing
    pub fn generate(&self, table: &IndicatorTable) -> Result<IndicatorTable> {
        let mut out = table.clone();
        self.level_correction.apply(&mut out)?;

        let mut produced = 0usize;
        for derivation in &self.config.derivations {
            let missing: Vec<&str> = derivation
                .required_inputs()
                .into_iter()
                .filter(|name| !out.has_column(name))
                .collect();

            if !missing.is_empty() {
                debug!(output = derivation.output(), ?missing, "Skipped derivation");
                continue;
            }

            let values = derivation.compute(&out)?;
            out.insert_column(derivation.output().to_string(), values)?;
            produced += 1;
        }

        let anchor = self
            .config
            .drop_priority
            .iter()
            .find_map(|name| out.column(name).map(|values| (name, values)));

        let out = match anchor {
            Some((name, values)) => {
                let keep: Vec<bool> = values.iter().map(|v| !v.is_nan()).collect();
                let dropped = keep.iter().filter(|k| !**k).count();
                if dropped > 0 {
                    debug!(column = %name, rows = dropped, "Dropped rows without a derived value");
                }
                out.filter_rows(&keep)?
            }
            None => out,
        };

        info!(derived = produced, rows = out.len(), "Generated derived variables");
        Ok(out)
    }
}
