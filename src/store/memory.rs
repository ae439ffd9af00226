//! In-memory store

use super::{FeatureStore, IndicatorSource, StoredFeatures};
use crate::error::{PipelineError, Result};
use crate::pipeline::{FeatureRow, FeatureSchema};
use crate::table::RawTable;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Keeps indicators and feature rows in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    indicators: RwLock<RawTable>,
    features: RwLock<BTreeMap<String, FeatureRow>>,
    schema: FeatureSchema,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indicators(indicators: RawTable) -> Self {
        Self {
            indicators: RwLock::new(indicators),
            ..Self::default()
        }
    }
}

impl IndicatorSource for MemoryStore {
    fn load_indicators(&self) -> Result<RawTable> {
        Ok(self.indicators.read().clone())
    }
}

impl FeatureStore for MemoryStore {
    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn save_features(&self, rows: &[FeatureRow]) -> Result<usize> {
        if let Some(bad) = rows.iter().find(|r| r.values.len() != self.schema.len()) {
            return Err(PipelineError::StorageError(format!(
                "row {} has {} values, schema has {}",
                bad.date,
                bad.values.len(),
                self.schema.len()
            )));
        }

        let mut features = self.features.write();
        for row in rows {
            features.insert(row.date.clone(), row.clone());
        }
        Ok(rows.len())
    }

    fn load_features(&self) -> Result<StoredFeatures> {
        Ok(StoredFeatures {
            columns: self.schema.columns().to_vec(),
            rows: self.features.read().values().cloned().collect(),
        })
    }
}
