//! Column-level time series operations
//!
//! All operations are causal: the value at row `t` only reads rows `<= t`.
//! Missing values are `NaN` on input and output.

use ndarray::{s, Array1};

/// `(v[t] - v[t-lag]) * scale`. The first `lag` rows are missing.
pub fn difference(series: &Array1<f64>, lag: usize, scale: f64) -> Array1<f64> {
    let n = series.len();
    let mut result = Array1::from_elem(n, f64::NAN);

    for i in lag..n {
        result[i] = (series[i] - series[i - lag]) * scale;
    }

    result
}

/// `(v[t] / v[t-1] - 1) * scale`. A zero or missing predecessor yields a missing value.
pub fn pct_change(series: &Array1<f64>, scale: f64) -> Array1<f64> {
    let n = series.len();
    let mut result = Array1::from_elem(n, f64::NAN);

    for i in 1..n {
        let (prev, curr) = (series[i - 1], series[i]);
        if prev != 0.0 && !prev.is_nan() && !curr.is_nan() {
            let value = (curr / prev - 1.0) * scale;
            if value.is_finite() {
                result[i] = value;
            }
        }
    }

    result
}

/// Value `lag` rows earlier; the first `lag` rows are missing
pub fn shift(series: &Array1<f64>, lag: usize) -> Array1<f64> {
    let n = series.len();
    let mut result = Array1::from_elem(n, f64::NAN);

    for i in lag..n {
        result[i] = series[i - lag];
    }

    result
}

/// Trailing rolling mean over the current and up to `window - 1` preceding rows.
///
/// Missing cells inside the window are skipped; a row is missing when fewer than
/// `min_periods` valid values fall in its window.
pub fn rolling_mean(series: &Array1<f64>, window: usize, min_periods: usize) -> Array1<f64> {
    let n = series.len();
    let window = window.max(1);
    let min_periods = min_periods.max(1);
    let mut result = Array1::from_elem(n, f64::NAN);

    for i in 0..n {
        let start = if i + 1 >= window { i + 1 - window } else { 0 };
        let (sum, count) = series
            .slice(s![start..=i])
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

        if count >= min_periods {
            result[i] = sum / count as f64;
        }
    }

    result
}

/// Mean of the non-missing values, `None` when there are none
pub fn nan_mean(series: &Array1<f64>) -> Option<f64> {
    let (sum, count) = series
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_difference() {
        let series = array![1.0, 3.0, 6.0, 10.0];
        let diffed = difference(&series, 1, 1.0);

        assert!(diffed[0].is_nan());
        assert!((diffed[1] - 2.0).abs() < 1e-6);
        assert!((diffed[3] - 4.0).abs() < 1e-6);

        let bp = difference(&array![3.50, 3.25], 1, 100.0);
        assert!((bp[1] + 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_pct_change_guards_zero_and_missing() {
        let series = array![100.0, 110.0, 0.0, 5.0, f64::NAN, 2.0];
        let pct = pct_change(&series, 100.0);

        assert!(pct[0].is_nan());
        assert!((pct[1] - 10.0).abs() < 1e-6);
        assert!((pct[2] + 100.0).abs() < 1e-6);
        assert!(pct[3].is_nan());
        assert!(pct[4].is_nan());
        assert!(pct[5].is_nan());
    }

    #[test]
    fn test_shift() {
        let shifted = shift(&array![1.0, 2.0, 3.0, 4.0], 2);
        assert!(shifted[1].is_nan());
        assert!((shifted[2] - 1.0).abs() < 1e-6);
        assert!((shifted[3] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_rolling_mean_min_periods_one() {
        let series = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let rolled = rolling_mean(&series, 3, 1);

        assert!((rolled[0] - 1.0).abs() < 1e-6);
        assert!((rolled[1] - 1.5).abs() < 1e-6);
        assert!((rolled[4] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_rolling_mean_skips_missing() {
        let series = array![f64::NAN, 2.0, f64::NAN, 4.0];
        let rolled = rolling_mean(&series, 3, 1);

        assert!(rolled[0].is_nan());
        assert!((rolled[1] - 2.0).abs() < 1e-6);
        assert!((rolled[2] - 2.0).abs() < 1e-6);
        assert!((rolled[3] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_nan_mean() {
        assert_eq!(nan_mean(&array![f64::NAN, f64::NAN]), None);
        assert!((nan_mean(&array![1.0, f64::NAN, 3.0]).unwrap() - 2.0).abs() < 1e-6);
    }
}
