//! Pipeline orchestration
//!
//! Runs the stages in a fixed order:
//! RAW → NORMALIZED → ALIGNED → DERIVED → FILLED → EXPANDED → SELECTED → DONE
//!
//! Each stage consumes the previous table and produces a new one. A failure
//! aborts the run and carries the stage it happened in.

mod schema;

pub use schema::{FeatureRow, FeatureSchema};

use crate::config::PipelineConfig;
use crate::derive::DerivedVariableGenerator;
use crate::error::{PipelineError, Result};
use crate::features::FeatureExpander;
use crate::imputation::{GapFiller, Imputer};
use crate::normalize::{ColumnNormalizer, LabelMapping};
use crate::selection::{CorrelationFilter, FeatureSelection};
use crate::table::{IndicatorTable, RawTable};
use crate::timeseries::{TemporalAligner, YearMonth};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::info;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Raw,
    Normalized,
    Aligned,
    Derived,
    Filled,
    Expanded,
    Selected,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Raw => "RAW",
            PipelineStage::Normalized => "NORMALIZED",
            PipelineStage::Aligned => "ALIGNED",
            PipelineStage::Derived => "DERIVED",
            PipelineStage::Filled => "FILLED",
            PipelineStage::Expanded => "EXPANDED",
            PipelineStage::Selected => "SELECTED",
            PipelineStage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// rows × selected features
    pub features: Array2<f64>,
    /// rows × difference targets
    pub targets: Array2<f64>,
    pub feature_names: Vec<String>,
    pub target_names: Vec<String>,
    /// Mean absolute correlation with the difference targets, best first
    pub correlation: Vec<(String, f64)>,
    /// Candidates removed as redundant
    pub removed: Vec<String>,
    pub periods: Vec<YearMonth>,
    /// The full expanded table the matrices were cut from
    pub table: IndicatorTable,
}

impl PipelineOutput {
    /// First and last period of the output
    pub fn date_range(&self) -> Option<(YearMonth, YearMonth)> {
        Some((*self.periods.first()?, *self.periods.last()?))
    }

    pub fn n_rows(&self) -> usize {
        self.periods.len()
    }

    /// Number of schema columns this run produced
    pub fn schema_coverage(&self, schema: &FeatureSchema) -> usize {
        schema
            .columns()
            .iter()
            .filter(|name| self.table.has_column(name))
            .count()
    }

    /// Flatten into persistence rows.
    ///
    /// Columns present in the expanded table have missing values written as
    /// `0.0`; schema columns the run did not produce are `None`.
    pub fn to_feature_rows(&self, schema: &FeatureSchema) -> Vec<FeatureRow> {
        let columns: Vec<_> = schema
            .columns()
            .iter()
            .map(|name| self.table.column(name))
            .collect();

        self.periods
            .iter()
            .enumerate()
            .map(|(row, period)| FeatureRow {
                date: period.compact(),
                values: columns
                    .iter()
                    .map(|col| col.map(|values| zero_if_missing(values[row])))
                    .collect(),
            })
            .collect()
    }
}

fn zero_if_missing(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v
    }
}

/// The end-to-end feature pipeline
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    config: PipelineConfig,
    normalizer: ColumnNormalizer,
    aligner: TemporalAligner,
    generator: DerivedVariableGenerator,
    filler: GapFiller,
    expander: FeatureExpander,
    filter: CorrelationFilter,
}

impl FeaturePipeline {
    /// Build a pipeline from a validated configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            normalizer: ColumnNormalizer::default(),
            aligner: TemporalAligner::new(config.align.clone()),
            generator: DerivedVariableGenerator::new(
                config.derived.clone(),
                config.level_correction.clone(),
            ),
            filler: GapFiller::default(),
            expander: FeatureExpander::new(config.expansion.clone()),
            filter: CorrelationFilter::new(config.selection.clone()),
            config,
        })
    }

    /// Replace the source label mapping
    pub fn with_mapping(mut self, mapping: LabelMapping) -> Self {
        self.normalizer = ColumnNormalizer::new(mapping);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over `raw`
    pub fn run(&self, raw: &RawTable) -> Result<PipelineOutput> {
        let start = Instant::now();
        info!(stage = %PipelineStage::Raw, rows = raw.height(), columns = raw.width(), "Pipeline started");

        let normalized = self.normalizer.normalize(raw);
        info!(stage = %PipelineStage::Normalized, columns = normalized.width());

        let aligned = self
            .aligner
            .align(&normalized)
            .map_err(|e| e.at_stage(PipelineStage::Aligned))?;
        info!(stage = %PipelineStage::Aligned, rows = aligned.len(), columns = aligned.width());

        let derived = self
            .generator
            .generate(&aligned)
            .map_err(|e| e.at_stage(PipelineStage::Derived))?;
        info!(stage = %PipelineStage::Derived, rows = derived.len(), columns = derived.width());

        let filled = self
            .filler
            .impute(&derived)
            .map_err(|e| e.at_stage(PipelineStage::Filled))?;
        info!(stage = %PipelineStage::Filled, filled = derived.missing_count());

        let (expanded, targets) = self
            .expander
            .expand(&filled)
            .map_err(|e| e.at_stage(PipelineStage::Expanded))?;
        if expanded.is_empty() {
            return Err(PipelineError::EmptyTable(format!(
                "{} periods do not cover the warm-up of {} periods",
                filled.len(),
                self.config.expansion.warm_up()
            ))
            .at_stage(PipelineStage::Expanded));
        }
        info!(stage = %PipelineStage::Expanded, rows = expanded.len(), columns = expanded.width());

        let target_names = targets.diff_targets();
        let candidates = CorrelationFilter::candidates(&expanded, &targets);
        let FeatureSelection {
            features: feature_names,
            ranking,
            removed,
            ..
        } = self
            .filter
            .select(&expanded, &candidates, &target_names)
            .map_err(|e| e.at_stage(PipelineStage::Selected))?;
        info!(stage = %PipelineStage::Selected, selected = feature_names.len(), removed = removed.len());

        let features = expanded
            .select(&feature_names)
            .map_err(|e| e.at_stage(PipelineStage::Done))?;
        let target_matrix = expanded
            .select(&target_names)
            .map_err(|e| e.at_stage(PipelineStage::Done))?;

        info!(
            stage = %PipelineStage::Done,
            rows = expanded.len(),
            features = feature_names.len(),
            targets = target_names.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline finished"
        );

        Ok(PipelineOutput {
            features,
            targets: target_matrix,
            feature_names,
            target_names,
            correlation: ranking,
            removed,
            periods: expanded.index().to_vec(),
            table: expanded,
        })
    }
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self {
            config: PipelineConfig::default(),
            normalizer: ColumnNormalizer::default(),
            aligner: TemporalAligner::default(),
            generator: DerivedVariableGenerator::default(),
            filler: GapFiller::default(),
            expander: FeatureExpander::default(),
            filter: CorrelationFilter::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;
    use crate::timeseries::IncompletePeriod;

    fn raw(rows: usize) -> RawTable {
        let dates: Vec<Cell> = (0..rows)
            .map(|i| Cell::from(format!("{}{:02}", 2020 + i / 12, i % 12 + 1)))
            .collect();
        let base_rate: Vec<Cell> = (0..rows).map(|i| Cell::from(1.0 + (i / 4) as f64 * 0.25)).collect();
        let esi: Vec<Cell> = (0..rows).map(|i| Cell::from(90.0 + ((i * 7) % 5) as f64)).collect();

        RawTable::new()
            .with_column("date", dates)
            .unwrap()
            .with_column("한국은행 기준금리", base_rate)
            .unwrap()
            .with_column("경제심리지수(원계열)", esi)
            .unwrap()
    }

    fn pipeline() -> FeaturePipeline {
        FeaturePipeline::new(
            PipelineConfig::new()
                .with_targets(["base_rate"])
                .with_incomplete_period(IncompletePeriod::Disabled),
        )
        .unwrap()
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(PipelineStage::Aligned.to_string(), "ALIGNED");
        assert_eq!(PipelineStage::Done.to_string(), "DONE");
    }

    #[test]
    fn test_run_shapes() {
        let output = pipeline().run(&raw(20)).unwrap();

        assert_eq!(output.n_rows(), 14);
        assert_eq!(output.targets.dim(), (14, 1));
        assert_eq!(output.target_names, vec!["base_rate_diff".to_string()]);
        assert_eq!(output.features.dim(), (14, output.feature_names.len()));
        assert!(!output.feature_names.contains(&"base_rate".to_string()));
        assert!(!output.feature_names.contains(&"base_rate_diff".to_string()));

        let (first, last) = output.date_range().unwrap();
        assert_eq!(first.to_string(), "2020-07");
        assert_eq!(last.to_string(), "2021-08");
    }

    #[test]
    fn test_feature_rows_follow_schema() {
        let output = pipeline().run(&raw(20)).unwrap();
        let schema = FeatureSchema::reference();
        let rows = output.to_feature_rows(&schema);

        assert_eq!(rows.len(), output.n_rows());
        assert_eq!(rows[0].date, "202007");
        assert_eq!(rows[0].values.len(), schema.len());

        let esi = schema.columns().iter().position(|c| c == "esi").unwrap();
        let credit = schema.columns().iter().position(|c| c == "credit_spread_diff").unwrap();
        assert!(rows[0].values[esi].is_some());
        assert!(rows[0].values[credit].is_none());

        let produced = rows[0].values.iter().filter(|v| v.is_some()).count();
        assert_eq!(output.schema_coverage(&schema), produced);
        assert_eq!(produced, 7);
    }

    #[test]
    fn test_errors_carry_stage() {
        let no_date = RawTable::new()
            .with_column("base_rate", vec![1.0.into()])
            .unwrap();
        match pipeline().run(&no_date) {
            Err(PipelineError::Stage { stage, source }) => {
                assert_eq!(stage, PipelineStage::Aligned);
                assert!(matches!(*source, PipelineError::MissingColumn(_)));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_insufficient_history() {
        let err = pipeline().run(&raw(5)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage { stage: PipelineStage::Expanded, .. }
        ));
    }
}
