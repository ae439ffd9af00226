//! Sequential gap filling

use super::{is_missing, Imputer};
use crate::timeseries::ops;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// One pass of the gap filler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStep {
    /// Linear interpolation between the nearest valid neighbours (by position)
    Interpolate,
    /// Carry the last valid value forward
    ForwardFill,
    /// Carry the next valid value backward
    BackwardFill,
    /// Column mean of the valid values, `0.0` if there are none
    Mean,
}

impl FillStep {
    fn apply(&self, values: &mut Array1<f64>) {
        match self {
            FillStep::Interpolate => interpolate(values),
            FillStep::ForwardFill => {
                let mut last = f64::NAN;
                for v in values.iter_mut() {
                    if is_missing(*v) {
                        *v = last;
                    } else {
                        last = *v;
                    }
                }
            }
            FillStep::BackwardFill => {
                let mut next = f64::NAN;
                for v in values.iter_mut().rev() {
                    if is_missing(*v) {
                        *v = next;
                    } else {
                        next = *v;
                    }
                }
            }
            FillStep::Mean => {
                let fill = ops::nan_mean(values).unwrap_or(0.0);
                values.mapv_inplace(|v| if is_missing(v) { fill } else { v });
            }
        }
    }
}

fn interpolate(values: &mut Array1<f64>) {
    let mut prev: Option<usize> = None;

    for i in 0..values.len() {
        if is_missing(values[i]) {
            continue;
        }
        if let Some(p) = prev {
            if i - p > 1 {
                let (start, end) = (values[p], values[i]);
                let span = (i - p) as f64;
                for k in (p + 1)..i {
                    values[k] = start + (end - start) * (k - p) as f64 / span;
                }
            }
        }
        prev = Some(i);
    }
}

/// Interpolate, then forward fill, then backward fill, then mean-fill
#[derive(Debug, Clone)]
pub struct GapFiller {
    steps: Vec<FillStep>,
}

impl Default for GapFiller {
    fn default() -> Self {
        Self {
            steps: vec![
                FillStep::Interpolate,
                FillStep::ForwardFill,
                FillStep::BackwardFill,
                FillStep::Mean,
            ],
        }
    }
}

impl GapFiller {
    /// Custom step order. A trailing mean step guarantees a complete column.
    pub fn with_steps(steps: Vec<FillStep>) -> Self {
        Self { steps }
    }
}

impl Imputer for GapFiller {
    fn impute_column(&self, values: &Array1<f64>) -> Array1<f64> {
        let mut out = values.clone();
        for step in &self.steps {
            if !out.iter().any(|v| is_missing(*v)) {
                break;
            }
            step.apply(&mut out);
        }
        out
    }
}
