//! Integration test: Full pipeline (raw table → aligned → derived → expanded → selected)

use ecos_features::config::PipelineConfig;
use ecos_features::derive::{DerivedConfig, DerivedVariableGenerator, LevelCorrection};
use ecos_features::features::{ExpansionConfig, FeatureExpander};
use ecos_features::pipeline::{FeaturePipeline, FeatureSchema};
use ecos_features::selection::{CorrelationFilter, SelectionConfig};
use ecos_features::table::{Cell, IndicatorTable, RawTable};
use ecos_features::timeseries::{AlignConfig, IncompletePeriod, TemporalAligner, YearMonth};
use ndarray::Array1;
use polars::prelude::*;

fn month_labels(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("{}-{:02}", 2020 + i / 12, i % 12 + 1))
        .collect()
}

/// 24 months of a base rate that steps up by 25bp at months 8 and 16
fn step_frame() -> DataFrame {
    let dates = month_labels(24);
    let base_rate: Vec<f64> = (0..24).map(|i| 1.0 + (i / 8) as f64 * 0.25).collect();
    df!(
        "date" => &dates,
        "base_rate" => &base_rate
    )
    .unwrap()
}

fn base_rate_pipeline() -> FeaturePipeline {
    FeaturePipeline::new(
        PipelineConfig::new()
            .with_targets(["base_rate"])
            .with_incomplete_period(IncompletePeriod::Disabled),
    )
    .unwrap()
}

fn aligner() -> TemporalAligner {
    TemporalAligner::new(AlignConfig {
        incomplete_period: IncompletePeriod::Disabled,
        ..AlignConfig::default()
    })
}

/// Deterministic noise in [-0.5, 0.5)
fn noise(seed: u64, n: usize) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
        })
        .collect()
}

#[test]
fn test_step_function_differences() {
    let raw = RawTable::from_dataframe(&step_frame()).unwrap();
    let aligned = aligner().align(&raw).unwrap();
    assert_eq!(aligned.len(), 24);

    let expander = FeatureExpander::new(ExpansionConfig::default().with_targets(vec!["base_rate".to_string()]));
    let (expanded, targets) = expander.expand_columns(&aligned).unwrap();
    assert_eq!(targets.diff_targets(), vec!["base_rate_diff".to_string()]);

    let diff = expanded.column("base_rate_diff").unwrap();
    let zeros = diff.iter().filter(|v| **v == 0.0).count();
    let steps: Vec<usize> = diff
        .iter()
        .enumerate()
        .filter(|(_, v)| (**v - 0.25).abs() < 1e-9)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(zeros, 22);
    assert_eq!(steps, vec![8, 16]);

    let lag1 = expanded.column("base_rate_diff_lag1").unwrap();
    assert!(lag1[0].is_nan());
    for t in 1..24 {
        assert_eq!(lag1[t], diff[t - 1]);
    }
}

#[test]
fn test_step_function_pipeline() {
    let raw = RawTable::from_dataframe(&step_frame()).unwrap();
    let output = base_rate_pipeline().run(&raw).unwrap();

    assert_eq!(output.n_rows(), 18);
    let (first, last) = output.date_range().unwrap();
    assert_eq!(first, YearMonth::new(2020, 7).unwrap());
    assert_eq!(last, YearMonth::new(2021, 12).unwrap());

    // rows 8 and 16 of the input are rows 2 and 10 after the warm-up
    let diff = output.table.column("base_rate_diff").unwrap();
    assert!((diff[2] - 0.25).abs() < 1e-9);
    assert!((diff[10] - 0.25).abs() < 1e-9);
    assert_eq!(diff.iter().filter(|v| **v == 0.0).count(), 16);

    let lag1 = output.table.column("base_rate_diff_lag1").unwrap();
    assert!((lag1[3] - 0.25).abs() < 1e-9);
    assert!((lag1[11] - 0.25).abs() < 1e-9);

    assert_eq!(output.targets.dim(), (18, 1));
    assert!(output.table.iter().all(|(_, values)| values.iter().all(|v| !v.is_nan())));
}

#[test]
fn test_missing_column_skips_spread() {
    let n = 24;
    let dates: Vec<Cell> = month_labels(n).into_iter().map(Cell::from).collect();
    let jitter = noise(7, n);
    let base_rate: Vec<Cell> = (0..n).map(|i| Cell::from(1.0 + (i / 6) as f64 * 0.25)).collect();
    let treasury: Vec<Cell> = (0..n).map(|i| Cell::from(2.0 + jitter[i])).collect();

    let raw = RawTable::new()
        .with_column("date", dates)
        .unwrap()
        .with_column("base_rate", base_rate)
        .unwrap()
        .with_column("market_rate_treasury_bond_3yr", treasury)
        .unwrap()
        .with_column("market_rate_corporate_bond_3yr_AA", vec![Cell::Null; n])
        .unwrap();

    let pipeline = FeaturePipeline::new(
        PipelineConfig::new().with_incomplete_period(IncompletePeriod::Disabled),
    )
    .unwrap();
    let output = pipeline.run(&raw).unwrap();

    assert!(!output.table.has_column("market_rate_corporate_bond_3yr_AA"));
    assert!(!output.table.has_column("credit_spread"));
    assert!(output.feature_names.iter().all(|f| !f.starts_with("credit_spread")));
    assert_eq!(output.target_names, vec!["base_rate_diff".to_string()]);

    let schema = FeatureSchema::reference();
    let rows = output.to_feature_rows(&schema);
    let credit = schema.columns().iter().position(|c| c == "credit_spread_diff").unwrap();
    assert!(rows.iter().all(|r| r.values[credit].is_none()));
}

#[test]
fn test_duplicate_dates_dedup() {
    let mut dates: Vec<Cell> = month_labels(20).into_iter().map(Cell::from).collect();
    let mut base_rate: Vec<Cell> = (0..20).map(|i| Cell::from(1.0 + (i / 5) as f64 * 0.25)).collect();

    // same months written in other formats
    dates.push(Cell::Number(202003.0));
    base_rate.push(Cell::from(9.0));
    dates.push(Cell::from("2020-05-01"));
    base_rate.push(Cell::from(8.0));
    dates.push(Cell::from("202005"));
    base_rate.push(Cell::from(7.0));

    let raw = RawTable::new()
        .with_column("date", dates)
        .unwrap()
        .with_column("base_rate", base_rate)
        .unwrap();

    let aligned = aligner().align(&raw).unwrap();
    assert_eq!(aligned.len(), 20);
    let rate = aligned.column("base_rate").unwrap();
    assert_eq!(rate[2], 9.0);
    assert_eq!(rate[4], 7.0);
    assert!(aligned.index().windows(2).all(|w| w[0] < w[1]));

    let output = base_rate_pipeline().run(&raw).unwrap();
    assert_eq!(output.n_rows(), 20 - 6);
}

fn indicator_table(n: usize) -> IndicatorTable {
    let index: Vec<YearMonth> = (0..n)
        .map(|i| YearMonth::new(2019 + (i / 12) as i32, (i % 12 + 1) as u32).unwrap())
        .collect();
    let bsi = noise(11, n);
    let cpi = noise(13, n);
    let aa = noise(17, n);

    IndicatorTable::new(index)
        .with_column("base_rate", Array1::from_shape_fn(n, |i| 1.0 + (i / 7) as f64 * 0.25))
        .unwrap()
        .with_column("construction_bsi_actual", Array1::from_shape_fn(n, |i| 70.0 + 10.0 * bsi[i]))
        .unwrap()
        .with_column("cpi", Array1::from_shape_fn(n, |i| 100.0 + i as f64 * 0.2 + cpi[i]))
        .unwrap()
        .with_column("market_rate_treasury_bond_3yr", Array1::from_shape_fn(n, |i| 2.5 + 0.01 * i as f64))
        .unwrap()
        .with_column("market_rate_corporate_bond_3yr_AA", Array1::from_shape_fn(n, |i| 3.0 + 0.01 * i as f64 + aa[i]))
        .unwrap()
}

#[test]
fn test_no_look_ahead() {
    let full = indicator_table(36);
    let truncated = full.head(20);

    let generator = DerivedVariableGenerator::new(
        DerivedConfig::default(),
        LevelCorrection::default().with_is_level(false),
    );
    let expander = FeatureExpander::default();

    let (full_out, _) = expander.expand_columns(&generator.generate(&full).unwrap()).unwrap();
    let (trunc_out, _) = expander.expand_columns(&generator.generate(&truncated).unwrap()).unwrap();

    assert!(trunc_out.len() < full_out.len());
    assert_eq!(trunc_out.column_names(), full_out.column_names());

    for (name, values) in trunc_out.iter() {
        let reference = full_out.column(name).unwrap();
        for t in 0..trunc_out.len() {
            let (a, b) = (values[t], reference[t]);
            assert!(
                (a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-12,
                "{} differs at row {}: {} vs {}",
                name,
                t,
                a,
                b
            );
        }
    }
}

#[test]
fn test_selection_is_deterministic() {
    let table = indicator_table(48);
    let raw = {
        let mut raw = RawTable::new()
            .with_column(
                "date",
                table.index().iter().map(|p| Cell::from(p.to_string())).collect(),
            )
            .unwrap();
        for (name, values) in table.iter() {
            raw.push_column(name, values.iter().map(|v| Cell::Number(*v)).collect())
                .unwrap();
        }
        raw
    };

    let pipeline = FeaturePipeline::new(
        PipelineConfig::new().with_incomplete_period(IncompletePeriod::Disabled),
    )
    .unwrap();
    let first = pipeline.run(&raw).unwrap();
    let second = pipeline.run(&raw).unwrap();

    assert_eq!(first.feature_names, second.feature_names);
    assert_eq!(first.removed, second.removed);
    assert_eq!(first.correlation, second.correlation);
    assert!(first
        .correlation
        .windows(2)
        .all(|w| w[0].1 >= w[1].1));
}

#[test]
fn test_minimum_retention() {
    let n = 40;
    let index: Vec<YearMonth> = (0..n)
        .map(|i| YearMonth::new(2020 + (i / 12) as i32, (i % 12 + 1) as u32).unwrap())
        .collect();

    let mut table = IndicatorTable::new(index);
    let mut candidates = Vec::new();
    for k in 0..10u64 {
        let values = noise(100 + k, n);
        let name = format!("x{}", k);
        table.insert_column(name.clone(), Array1::from(values)).unwrap();
        candidates.push(name);
    }
    table
        .insert_column("y_diff", Array1::from(noise(999, n)))
        .unwrap();
    let targets = vec!["y_diff".to_string()];

    let at_least_three = CorrelationFilter::new(
        SelectionConfig::default().with_min_features(3).with_ratio(0.1),
    );
    let selection = at_least_three.select(&table, &candidates, &targets).unwrap();
    let survivors = candidates.len() - selection.removed.len();
    assert_eq!(selection.features.len(), 3.min(survivors));

    let half = CorrelationFilter::new(
        SelectionConfig::default().with_min_features(1).with_ratio(0.5),
    );
    let selection = half.select(&table, &candidates, &targets).unwrap();
    let survivors = candidates.len() - selection.removed.len();
    assert_eq!(selection.features.len(), (survivors / 2).max(1));

    let everything = CorrelationFilter::new(SelectionConfig::default());
    let selection = everything.select(&table, &candidates, &targets).unwrap();
    assert_eq!(selection.features.len(), candidates.len() - selection.removed.len());
}
