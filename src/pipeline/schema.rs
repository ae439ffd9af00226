//! Fixed persistence schema for the feature store

use serde::{Deserialize, Serialize};

const REFERENCE_COLUMNS: [&str; 26] = [
    "construction_bsi_actual_diff",
    "housing_sale_price_diff",
    "m2_growth_diff",
    "credit_spread_diff",
    "base_rate_diff",
    "construction_bsi_mom",
    "housing_sale_price_diff_ma3",
    "m2_growth_lag1",
    "base_rate_mdiff_bp",
    "credit_spread_diff_ma3",
    "construction_bsi_ma3",
    "leading_index",
    "housing_sale_price_diff_lag6",
    "construction_bsi_actual_lag3",
    "construction_bsi_actual_diff_ma3",
    "base_rate_diff_ma6",
    "term_spread",
    "construction_bsi_actual_diff_ma6",
    "credit_spread_diff_lag1",
    "market_rate_treasury_bond_3yr",
    "credit_spread_diff_ma6",
    "base_rate_diff_ma3",
    "base_rate_lag1",
    "esi",
    "base_rate_diff_lag3",
    "m2_growth_diff_ma6",
];

/// Ordered value columns of a persisted feature row. The `date` key column is implicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// The `final_features` layout: `date` followed by 26 value columns
    pub fn reference() -> Self {
        Self::new(REFERENCE_COLUMNS.iter().map(|c| c.to_string()).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of value columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::reference()
    }
}

/// One persisted period. `None` marks a schema column the run did not produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// `YYYYMM`
    pub date: String,
    pub values: Vec<Option<f64>>,
}
