//! Missing value imputation
//!
//! Provides the gap filler used between derivation and expansion:
//! - Linear interpolation over internal gaps
//! - Forward / backward fill
//! - Column mean fallback

mod gap_fill;

pub use gap_fill::{FillStep, GapFiller};

use crate::error::Result;
use crate::table::IndicatorTable;
use ndarray::Array1;

/// Trait for imputers
pub trait Imputer: Send + Sync {
    /// Fill the missing values of a single column
    fn impute_column(&self, values: &Array1<f64>) -> Array1<f64>;

    /// Fill every column of a table, leaving the period index untouched
    fn impute(&self, table: &IndicatorTable) -> Result<IndicatorTable> {
        let mut out = table.clone();
        for (name, values) in table.iter() {
            if values.iter().any(|v| is_missing(*v)) {
                out.insert_column(name.to_string(), self.impute_column(values))?;
            }
        }
        Ok(out)
    }
}

/// Check if value is missing (NaN)
#[inline]
pub fn is_missing(v: f64) -> bool {
    v.is_nan()
}
