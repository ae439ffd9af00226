//! Column normalization
//!
//! Renames source columns to canonical indicator identifiers and coerces the
//! cells of every known indicator to numbers.

mod labels;

pub use labels::{safe_label, Indicator, LabelMapping};

use crate::table::{Cell, RawColumn, RawTable};
use tracing::{debug, warn};

/// Renames and coerces raw columns
#[derive(Debug, Clone)]
pub struct ColumnNormalizer {
    mapping: LabelMapping,
}

impl Default for ColumnNormalizer {
    fn default() -> Self {
        Self::new(LabelMapping::ecos())
    }
}

impl ColumnNormalizer {
    pub fn new(mapping: LabelMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &LabelMapping {
        &self.mapping
    }

    /// Normalize a raw table.
    ///
    /// Unmapped columns pass through untouched. Cells of canonical indicators
    /// become `Number` or `Null`. When two source columns resolve to the same
    /// identifier the later one wins.
    pub fn normalize(&self, raw: &RawTable) -> RawTable {
        let mut columns: Vec<RawColumn> = Vec::with_capacity(raw.width());

        for column in raw.columns() {
            let name = match self.mapping.resolve(&column.name) {
                Some(canonical) => {
                    if canonical != column.name {
                        debug!(from = %column.name, to = canonical, "Renamed column");
                    }
                    canonical.to_string()
                }
                None => column.name.clone(),
            };

            let cells = if Indicator::from_canonical(&name).is_some() {
                column.cells.iter().map(|c| Cell::from(c.as_f64())).collect()
            } else {
                column.cells.clone()
            };

            match columns.iter_mut().find(|c| c.name == name) {
                Some(existing) => {
                    warn!(column = %name, source = %column.name, "Duplicate indicator column, keeping the later one");
                    existing.cells = cells;
                }
                None => columns.push(RawColumn { name, cells }),
            }
        }

        RawTable::from_parts(columns, raw.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renames_and_coerces() {
        let raw = RawTable::new()
            .with_column("date", vec!["2024-01".into(), "2024-02".into()])
            .unwrap()
            .with_column("한국은행 기준금리", vec!["3.50".into(), "n/a".into()])
            .unwrap()
            .with_column("memo", vec!["a".into(), "b".into()])
            .unwrap();

        let normalized = ColumnNormalizer::default().normalize(&raw);

        assert_eq!(normalized.column_names(), vec!["date", "base_rate", "memo"]);
        let base_rate = &normalized.column("base_rate").unwrap().cells;
        assert_eq!(base_rate[0], Cell::Number(3.5));
        assert_eq!(base_rate[1], Cell::Null);

        // date and unmapped columns are untouched
        assert_eq!(normalized.column("date").unwrap().cells[0], Cell::from("2024-01"));
        assert_eq!(normalized.column("memo").unwrap().cells[1], Cell::from("b"));
    }

    #[test]
    fn test_duplicate_labels_collapse() {
        let raw = RawTable::new()
            .with_column("house_price", vec![1.0.into()])
            .unwrap()
            .with_column("housing_sale_price", vec![2.0.into()])
            .unwrap();

        let normalized = ColumnNormalizer::default().normalize(&raw);
        assert_eq!(normalized.width(), 1);
        assert_eq!(
            normalized.column("housing_sale_price").unwrap().cells[0],
            Cell::Number(2.0)
        );
    }
}
