//! Time series module
//!
//! Provides the monthly time axis of the pipeline:
//! - Period keys (`YearMonth`)
//! - Temporal alignment (parse, sort, de-duplicate, drop the incomplete period)
//! - Causal column operations (differencing, pct change, lags, rolling means)

mod align;
pub mod ops;
mod period;

pub use align::{AlignConfig, IncompletePeriod, TemporalAligner};
pub use period::YearMonth;
