//! Storage collaborators
//!
//! The pipeline reads raw indicators through [`IndicatorSource`] and writes
//! persistence rows through [`FeatureStore`]. Two backends are provided:
//! - [`SqliteStore`]: `ecos_data` and `final_features` tables in a SQLite file
//! - [`MemoryStore`]: in-process maps for tests and dry runs

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::pipeline::{FeatureRow, FeatureSchema};
use crate::table::RawTable;
use serde::Serialize;

/// Source of raw indicator rows
pub trait IndicatorSource: Send + Sync {
    /// Load every stored indicator row, `date` first
    fn load_indicators(&self) -> Result<RawTable>;
}

/// Sink for persisted feature rows
pub trait FeatureStore: Send + Sync {
    /// Layout of the stored rows
    fn schema(&self) -> &FeatureSchema;

    /// Replace the stored rows for every date in `rows`. Returns the number written.
    fn save_features(&self, rows: &[FeatureRow]) -> Result<usize>;

    /// All stored rows, ascending by date
    fn load_features(&self) -> Result<StoredFeatures>;
}

/// Feature rows read back from a store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFeatures {
    pub columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl StoredFeatures {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// First and last stored date (`YYYYMM`)
    pub fn date_range(&self) -> Option<(&str, &str)> {
        Some((self.rows.first()?.date.as_str(), self.rows.last()?.date.as_str()))
    }

    /// The latest `limit` rows
    pub fn tail(&self, limit: usize) -> &[FeatureRow] {
        &self.rows[self.rows.len().saturating_sub(limit)..]
    }

    /// Rows as `column -> value` records, `date` included
    pub fn records(&self, rows: &[FeatureRow]) -> Vec<serde_json::Map<String, serde_json::Value>> {
        rows.iter()
            .map(|row| {
                let mut record = serde_json::Map::with_capacity(self.columns.len() + 1);
                record.insert("date".to_string(), serde_json::Value::from(row.date.clone()));
                for (name, value) in self.columns.iter().zip(&row.values) {
                    record.insert(name.clone(), serde_json::Value::from(*value));
                }
                record
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> StoredFeatures {
        StoredFeatures {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: (1..=3)
                .map(|m| FeatureRow {
                    date: format!("20240{m}"),
                    values: vec![Some(m as f64), None],
                })
                .collect(),
        }
    }

    #[test]
    fn test_tail_and_range() {
        let stored = stored();
        assert_eq!(stored.tail(2).len(), 2);
        assert_eq!(stored.tail(10).len(), 3);
        assert_eq!(stored.tail(2)[0].date, "202402");
        assert_eq!(stored.date_range(), Some(("202401", "202403")));
    }

    #[test]
    fn test_records() {
        let stored = stored();
        let records = stored.records(stored.tail(1));
        assert_eq!(records[0]["date"], "202403");
        assert_eq!(records[0]["a"], 3.0);
        assert!(records[0]["b"].is_null());
    }
}
