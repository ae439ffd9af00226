//! ECOS Features - Feature engineering for monthly macroeconomic indicators
//!
//! Turns a raw table of ECOS indicator series into a model-ready feature
//! matrix and target matrix:
//! - Source labels are mapped to canonical identifiers
//! - Rows are aligned on a monthly index, deduplicated and trimmed of the
//!   incomplete current month
//! - Derived variables (spreads, momentum, moving averages) are computed
//! - Gaps are filled, lag/rolling features expanded per target
//! - Redundant features are removed and the rest ranked by correlation with
//!   the target differences
//!
//! # Modules
//!
//! ## Pipeline
//! - [`normalize`] - Source label → canonical identifier mapping
//! - [`timeseries`] - Monthly periods, alignment and series operations
//! - [`derive`] - Derived variables and level correction
//! - [`imputation`] - Gap filling
//! - [`features`] - Lag, rolling and difference expansion
//! - [`selection`] - Correlation-based redundancy removal and ranking
//! - [`pipeline`] - Stage orchestration and persistence rows
//!
//! ## Infrastructure
//! - [`store`] - SQLite and in-memory storage collaborators
//! - [`io`] - CSV input and output
//!
//! ## Services
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

pub mod error;
pub mod config;
pub mod table;

pub mod normalize;
pub mod timeseries;
pub mod derive;
pub mod imputation;
pub mod features;
pub mod selection;
pub mod pipeline;

pub mod store;
pub mod io;

pub mod server;
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PipelineError, Result};
    pub use crate::config::PipelineConfig;
    pub use crate::table::{Cell, IndicatorTable, RawTable};

    pub use crate::normalize::{ColumnNormalizer, Indicator, LabelMapping};
    pub use crate::timeseries::{AlignConfig, IncompletePeriod, TemporalAligner, YearMonth};
    pub use crate::derive::{Derivation, DerivedConfig, DerivedVariableGenerator, LevelCorrection};
    pub use crate::imputation::{FillStep, GapFiller, Imputer};
    pub use crate::features::{ExpansionConfig, FeatureExpander, TargetSet};
    pub use crate::selection::{CorrelationFilter, FeatureSelection, SelectionConfig};
    pub use crate::pipeline::{FeaturePipeline, FeatureRow, FeatureSchema, PipelineOutput, PipelineStage};

    pub use crate::store::{FeatureStore, IndicatorSource, MemoryStore, SqliteStore, StoredFeatures};
}
