//! Temporal alignment of raw indicator rows onto a monthly period index

use super::YearMonth;
use crate::error::{PipelineError, Result};
use crate::table::{IndicatorTable, RawTable};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Which period, if any, is treated as still in progress and dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompletePeriod {
    /// The calendar month of the run (UTC)
    Current,
    /// An explicit period
    Fixed(YearMonth),
    /// Keep every period
    Disabled,
}

impl IncompletePeriod {
    fn resolve(&self) -> Option<YearMonth> {
        match self {
            IncompletePeriod::Current => Some(YearMonth::current()),
            IncompletePeriod::Fixed(period) => Some(*period),
            IncompletePeriod::Disabled => None,
        }
    }
}

/// Alignment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Name of the column holding the period of each row
    pub date_column: String,
    pub incomplete_period: IncompletePeriod,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            incomplete_period: IncompletePeriod::Current,
        }
    }
}

/// Maps raw rows onto a sorted, de-duplicated monthly index
#[derive(Debug, Clone, Default)]
pub struct TemporalAligner {
    config: AlignConfig,
}

impl TemporalAligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    /// Align a raw table.
    ///
    /// Rows with an unparsable period are dropped; duplicate periods keep the
    /// last row seen. Columns that carry no numeric value at all are removed.
    pub fn align(&self, raw: &RawTable) -> Result<IndicatorTable> {
        let date_column = raw
            .column(&self.config.date_column)
            .ok_or_else(|| PipelineError::MissingColumn(self.config.date_column.clone()))?;

        if raw.height() == 0 {
            return Err(PipelineError::EmptyTable("input has no rows".to_string()));
        }

        let incomplete = self.config.incomplete_period.resolve();
        let mut rows: BTreeMap<YearMonth, usize> = BTreeMap::new();
        let mut unparsable = 0usize;
        let mut incomplete_rows = 0usize;

        for (row, cell) in date_column.cells.iter().enumerate() {
            match YearMonth::from_cell(cell) {
                Ok(period) if Some(period) == incomplete => incomplete_rows += 1,
                Ok(period) => {
                    rows.insert(period, row);
                }
                Err(e) => {
                    debug!(row, error = %e, "Unparsable period");
                    unparsable += 1;
                }
            }
        }

        if unparsable > 0 {
            warn!(rows = unparsable, "Dropped rows with an unparsable period");
        }
        if incomplete_rows > 0 {
            info!(rows = incomplete_rows, period = ?incomplete, "Dropped incomplete period");
        }

        if rows.is_empty() {
            return Err(PipelineError::EmptyTable(
                "no rows with a usable period".to_string(),
            ));
        }

        let index: Vec<YearMonth> = rows.keys().copied().collect();
        let mut table = IndicatorTable::new(index);

        for column in raw.columns() {
            if column.name == self.config.date_column {
                continue;
            }

            let values: Array1<f64> = rows
                .values()
                .map(|&row| column.cells[row].as_f64().unwrap_or(f64::NAN))
                .collect();

            if values.iter().all(|v| v.is_nan()) {
                warn!(column = %column.name, "Removed column without numeric values");
                continue;
            }

            table.insert_column(column.name.clone(), values)?;
        }

        debug!(
            input_rows = raw.height(),
            periods = table.len(),
            columns = table.width(),
            "Aligned table"
        );

        Ok(table)
    }
}
