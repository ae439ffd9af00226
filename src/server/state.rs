//! Application state management

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::pipeline::{FeaturePipeline, FeatureRow, PipelineOutput};
use crate::store::{FeatureStore, IndicatorSource};

use super::error::{Result, ServerError};
use super::ServerConfig;

/// Selection outcome of the last in-process pipeline run
#[derive(Debug, Clone, Default)]
pub struct SelectionSnapshot {
    pub selected: Vec<String>,
    pub correlation: HashMap<String, f64>,
}

impl SelectionSnapshot {
    fn from_output(output: &PipelineOutput) -> Self {
        Self {
            selected: output.feature_names.clone(),
            correlation: output.correlation.iter().cloned().collect(),
        }
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.iter().any(|s| s == name)
    }
}

/// Response body of `POST /preprocess`
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessSummary {
    pub success: bool,
    pub message: String,
    pub processed_rows: usize,
    pub feature_count: usize,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

impl DateRange {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start_date: start.to_string(),
            end_date: end.to_string(),
        }
    }
}

/// Feature rows computed by a run the store rejected
#[derive(Debug, Clone)]
pub struct PendingFeatures {
    pub rows: Vec<FeatureRow>,
    pub feature_count: usize,
}

/// Application state shared across handlers
pub struct AppState {
    pub config: ServerConfig,
    pub source: Arc<dyn IndicatorSource>,
    pub store: Arc<dyn FeatureStore>,
    pub pipeline: FeaturePipeline,
    pub last_selection: RwLock<Option<SelectionSnapshot>>,
    pending: Mutex<Option<PendingFeatures>>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        source: Arc<dyn IndicatorSource>,
        store: Arc<dyn FeatureStore>,
        pipeline: FeaturePipeline,
    ) -> Self {
        Self {
            config,
            source,
            store,
            pipeline,
            last_selection: RwLock::new(None),
            pending: Mutex::new(None),
        }
    }

    /// Load, run and persist. Blocking; call from a blocking task.
    ///
    /// Rows the store rejects are kept for [`AppState::persist_pending`].
    pub fn preprocess(&self) -> Result<PreprocessSummary> {
        let raw = self.source.load_indicators()?;
        if raw.is_empty() {
            return Err(ServerError::NotFound("No ECOS data found".to_string()));
        }

        let output = self.pipeline.run(&raw)?;
        *self.last_selection.write() = Some(SelectionSnapshot::from_output(&output));

        let schema = self.store.schema();
        let pending = PendingFeatures {
            rows: output.to_feature_rows(schema),
            feature_count: output.schema_coverage(schema),
        };
        info!(
            rows = pending.rows.len(),
            features = pending.feature_count,
            selected = output.feature_names.len(),
            "Preprocessing complete"
        );

        self.persist(pending)
    }

    /// Retry persisting the rows of the last rejected run
    pub fn persist_pending(&self) -> Result<PreprocessSummary> {
        let pending = self
            .pending
            .lock()
            .take()
            .ok_or_else(|| ServerError::NotFound("No unsaved feature rows".to_string()))?;
        self.persist(pending)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    fn persist(&self, pending: PendingFeatures) -> Result<PreprocessSummary> {
        let written = match self.store.save_features(&pending.rows) {
            Ok(written) => written,
            Err(e) => {
                warn!(rows = pending.rows.len(), error = %e, "Keeping unsaved feature rows");
                *self.pending.lock() = Some(pending);
                return Err(e.into());
            }
        };
        *self.pending.lock() = None;

        let date_range = match (pending.rows.first(), pending.rows.last()) {
            (Some(first), Some(last)) => Some(DateRange::new(&first.date, &last.date)),
            _ => None,
        };

        Ok(PreprocessSummary {
            success: true,
            message: "ECOS data preprocessed and saved".to_string(),
            processed_rows: written,
            feature_count: pending.feature_count,
            date_range,
        })
    }

    pub fn last_selection(&self) -> Option<SelectionSnapshot> {
        self.last_selection.read().clone()
    }
}
