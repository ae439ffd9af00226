//! Declarative derived-column definitions

use crate::error::Result;
use crate::table::IndicatorTable;
use crate::timeseries::ops;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

fn default_percent_scale() -> f64 {
    100.0
}

fn default_unit_scale() -> f64 {
    1.0
}

/// A derived column and the inputs it is computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Derivation {
    /// `(v[t] / v[t-1] - 1) * scale`
    PctChange {
        source: String,
        output: String,
        #[serde(default = "default_percent_scale")]
        scale: f64,
    },
    /// `(v[t] - v[t-1]) * scale`
    Difference {
        source: String,
        output: String,
        #[serde(default = "default_unit_scale")]
        scale: f64,
    },
    /// `minuend - subtrahend`
    Spread {
        minuend: String,
        subtrahend: String,
        output: String,
    },
    /// Trailing mean over `window` periods, min periods 1
    RollingMean {
        source: String,
        output: String,
        window: usize,
    },
}

impl Derivation {
    pub fn pct_change(source: &str, output: &str) -> Self {
        Derivation::PctChange {
            source: source.to_string(),
            output: output.to_string(),
            scale: default_percent_scale(),
        }
    }

    pub fn difference(source: &str, output: &str, scale: f64) -> Self {
        Derivation::Difference {
            source: source.to_string(),
            output: output.to_string(),
            scale,
        }
    }

    pub fn spread(minuend: &str, subtrahend: &str, output: &str) -> Self {
        Derivation::Spread {
            minuend: minuend.to_string(),
            subtrahend: subtrahend.to_string(),
            output: output.to_string(),
        }
    }

    pub fn rolling_mean(source: &str, output: &str, window: usize) -> Self {
        Derivation::RollingMean {
            source: source.to_string(),
            output: output.to_string(),
            window,
        }
    }

    /// Columns that must be present for the derivation to run
    pub fn required_inputs(&self) -> Vec<&str> {
        match self {
            Derivation::PctChange { source, .. }
            | Derivation::Difference { source, .. }
            | Derivation::RollingMean { source, .. } => vec![source.as_str()],
            Derivation::Spread {
                minuend, subtrahend, ..
            } => vec![minuend.as_str(), subtrahend.as_str()],
        }
    }

    /// Name of the produced column
    pub fn output(&self) -> &str {
        match self {
            Derivation::PctChange { output, .. }
            | Derivation::Difference { output, .. }
            | Derivation::Spread { output, .. }
            | Derivation::RollingMean { output, .. } => output,
        }
    }

    /// Compute the derived column from `table`
    pub fn compute(&self, table: &IndicatorTable) -> Result<Array1<f64>> {
        let values = match self {
            Derivation::PctChange { source, scale, .. } => {
                ops::pct_change(table.require(source)?, *scale)
            }
            Derivation::Difference { source, scale, .. } => {
                ops::difference(table.require(source)?, 1, *scale)
            }
            Derivation::Spread {
                minuend, subtrahend, ..
            } => table.require(minuend)? - table.require(subtrahend)?,
            Derivation::RollingMean { source, window, .. } => {
                ops::rolling_mean(table.require(source)?, *window, 1)
            }
        };
        Ok(values)
    }
}

/// Derived columns computed by default
pub fn default_derivations() -> Vec<Derivation> {
    vec![
        Derivation::spread(
            "market_rate_corporate_bond_3yr_AA",
            "market_rate_treasury_bond_3yr",
            "credit_spread",
        ),
        Derivation::spread(
            "market_rate_treasury_bond_10yr",
            "market_rate_treasury_bond_3yr",
            "term_spread",
        ),
        Derivation::pct_change("construction_bsi_actual", "construction_bsi_mom"),
        Derivation::pct_change("cpi", "cpi_mom"),
        Derivation::rolling_mean("construction_bsi_actual", "construction_bsi_ma3", 3),
        Derivation::rolling_mean("construction_bsi_actual", "construction_bsi_ma6", 6),
        Derivation::difference("base_rate", "base_rate_mdiff_bp", 100.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeseries::YearMonth;
    use ndarray::array;

    fn table() -> IndicatorTable {
        let index = (1..=3).map(|m| YearMonth::new(2024, m).unwrap()).collect();
        IndicatorTable::new(index)
            .with_column("aa", array![4.0, 4.5, 5.0])
            .unwrap()
            .with_column("t3", array![3.0, 3.25, 3.5])
            .unwrap()
    }

    #[test]
    fn test_spread_ordering() {
        let spread = Derivation::spread("aa", "t3", "credit_spread");
        assert_eq!(spread.required_inputs(), vec!["aa", "t3"]);
        assert_eq!(spread.output(), "credit_spread");

        let values = spread.compute(&table()).unwrap();
        assert!((values[0] - 1.0).abs() < 1e-12);
        assert!((values[2] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_difference_in_basis_points() {
        let values = Derivation::difference("t3", "t3_bp", 100.0)
            .compute(&table())
            .unwrap();
        assert!(values[0].is_nan());
        assert!((values[1] - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_tagged_form() {
        let json = r#"{"kind":"pct_change","source":"cpi","output":"cpi_mom"}"#;
        let parsed: Derivation = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, Derivation::pct_change("cpi", "cpi_mom"));
    }

    #[test]
    fn test_defaults_cover_reference_columns() {
        let outputs: Vec<String> = default_derivations()
            .iter()
            .map(|d| d.output().to_string())
            .collect();
        for name in ["credit_spread", "term_spread", "construction_bsi_mom", "base_rate_mdiff_bp"] {
            assert!(outputs.contains(&name.to_string()));
        }
    }
}
