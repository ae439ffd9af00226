//! Correlation-based feature selection
//!
//! Two passes over the candidate columns:
//! - Redundancy removal: a column is dropped when its absolute correlation with
//!   any earlier candidate exceeds the threshold. Earlier columns always win,
//!   including columns that are themselves dropped.
//! - Ranking: survivors are ordered by their mean absolute correlation with the
//!   difference targets and the top `max(min_features, ratio * survivors)` kept.

use crate::error::{PipelineError, Result};
use crate::features::TargetSet;
use crate::table::IndicatorTable;
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Configuration for correlation-based selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Absolute correlation above which a later candidate is redundant
    pub threshold: f64,
    /// Share of survivors to keep
    pub ratio: f64,
    /// Lower bound on the number of selected features
    pub min_features: usize,
    /// Survivors returned in candidate order when no target is available
    pub fallback_features: usize,
    /// Upper bound on the number of candidates
    pub max_candidates: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.95,
            ratio: 0.5,
            min_features: 20,
            fallback_features: 30,
            max_candidates: 2000,
        }
    }
}

impl SelectionConfig {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_min_features(mut self, min_features: usize) -> Self {
        self.min_features = min_features;
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(PipelineError::ConfigError(format!(
                "correlation threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.ratio) {
            return Err(PipelineError::ConfigError(format!(
                "selection ratio must be within [0, 1], got {}",
                self.ratio
            )));
        }
        if self.max_candidates == 0 {
            return Err(PipelineError::ConfigError(
                "max_candidates must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of feature selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelection {
    /// Selected features, best first (candidate order for the fallback)
    pub features: Vec<String>,
    /// Mean absolute correlation with the difference targets for every survivor
    pub ranking: Vec<(String, f64)>,
    /// Candidates dropped as redundant
    pub removed: Vec<String>,
    pub candidate_count: usize,
}

/// Correlation filter for redundant feature removal and target ranking
#[derive(Debug, Clone, Default)]
pub struct CorrelationFilter {
    config: SelectionConfig,
}

impl CorrelationFilter {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    /// Every column that is neither a raw target nor a difference target, in table order
    pub fn candidates(table: &IndicatorTable, targets: &TargetSet) -> Vec<String> {
        let diff_targets = targets.diff_targets();
        table
            .column_names()
            .iter()
            .filter(|name| {
                !targets.available_targets().contains(*name) && !diff_targets.contains(*name)
            })
            .cloned()
            .collect()
    }

    /// Select features from `candidates` using the difference targets present in `table`
    pub fn select(
        &self,
        table: &IndicatorTable,
        candidates: &[String],
        diff_targets: &[String],
    ) -> Result<FeatureSelection> {
        if candidates.len() > self.config.max_candidates {
            return Err(PipelineError::ConfigError(format!(
                "{} candidate features exceed the bound of {}",
                candidates.len(),
                self.config.max_candidates
            )));
        }

        let x = table.select(candidates)?;
        let corr = Self::correlation_matrix(&x);
        let redundant = self.redundant_columns(&corr);

        let mut survivors = Vec::with_capacity(candidates.len());
        let mut removed = Vec::new();
        for (j, name) in candidates.iter().enumerate() {
            if redundant[j] {
                removed.push(name.clone());
            } else {
                survivors.push(j);
            }
        }

        debug!(
            candidates = candidates.len(),
            survivors = survivors.len(),
            removed = removed.len(),
            "Removed redundant features"
        );

        let targets: Vec<&String> = diff_targets.iter().filter(|t| table.has_column(t)).collect();

        if targets.is_empty() {
            let features: Vec<String> = survivors
                .iter()
                .take(self.config.fallback_features)
                .map(|&j| candidates[j].clone())
                .collect();
            info!(selected = features.len(), "No difference targets, kept leading survivors");
            return Ok(FeatureSelection {
                features,
                ranking: Vec::new(),
                removed,
                candidate_count: candidates.len(),
            });
        }

        let target_columns: Vec<ArrayView1<f64>> = targets
            .iter()
            .map(|t| table.require(t).map(|c| c.view()))
            .collect::<Result<_>>()?;

        let mut ranking: Vec<(String, f64)> = survivors
            .par_iter()
            .map(|&j| {
                let feature = x.column(j);
                let total: f64 = target_columns
                    .iter()
                    .map(|target| Self::pearson_correlation(feature, *target).abs())
                    .sum();
                (candidates[j].clone(), total / target_columns.len() as f64)
            })
            .collect();

        ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let keep = self
            .config
            .min_features
            .max((self.config.ratio * survivors.len() as f64).floor() as usize)
            .min(ranking.len());

        let features = ranking.iter().take(keep).map(|(name, _)| name.clone()).collect();

        info!(
            candidates = candidates.len(),
            survivors = survivors.len(),
            selected = keep,
            "Selected features"
        );

        Ok(FeatureSelection {
            features,
            ranking,
            removed,
            candidate_count: candidates.len(),
        })
    }

    /// Mask of columns with an absolute correlation above the threshold against any earlier column
    pub fn redundant_columns(&self, corr: &Array2<f64>) -> Vec<bool> {
        let n = corr.ncols();
        (0..n)
            .map(|j| (0..j).any(|i| corr[[i, j]].abs() > self.config.threshold))
            .collect()
    }

    /// Pairwise Pearson correlations of the columns of `x`, rows of the upper triangle in parallel
    pub fn correlation_matrix(x: &Array2<f64>) -> Array2<f64> {
        let k = x.ncols();

        let upper: Vec<Vec<f64>> = (0..k)
            .into_par_iter()
            .map(|i| {
                ((i + 1)..k)
                    .map(|j| Self::pearson_correlation(x.column(i), x.column(j)))
                    .collect()
            })
            .collect();

        let mut corr = Array2::eye(k);
        for (i, row) in upper.into_iter().enumerate() {
            for (offset, r) in row.into_iter().enumerate() {
                let j = i + 1 + offset;
                corr[[i, j]] = r;
                corr[[j, i]] = r;
            }
        }
        corr
    }

    /// Pearson correlation; `0.0` when either column is constant or undefined
    pub fn pearson_correlation(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
        let n = x.len() as f64;
        if n < 2.0 {
            return 0.0;
        }

        let x_mean = x.mean().unwrap_or(0.0);
        let y_mean = y.mean().unwrap_or(0.0);

        let mut sum_xy = 0.0;
        let mut sum_x2 = 0.0;
        let mut sum_y2 = 0.0;

        for (&xi, &yi) in x.iter().zip(y.iter()) {
            let dx = xi - x_mean;
            let dy = yi - y_mean;
            sum_xy += dx * dy;
            sum_x2 += dx * dx;
            sum_y2 += dy * dy;
        }

        let denom = (sum_x2 * sum_y2).sqrt();
        let r = if denom == 0.0 { 0.0 } else { sum_xy / denom };
        if r.is_finite() {
            r
        } else {
            0.0
        }
    }
}
