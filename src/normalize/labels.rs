//! ECOS indicator vocabulary

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Canonical ECOS indicators understood by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indicator {
    BaseRate,
    Ccsi,
    ConstructionBsiActual,
    ConstructionBsiForecast,
    Cpi,
    Esi,
    ExchangeUsdKrwClose,
    HousingLeasePrice,
    HousingSalePrice,
    ImportPriceNonMetalMineral,
    ImportPriceSteelPrimary,
    LeadingIndex,
    M2Growth,
    TreasuryBond10yr,
    TreasuryBond3yr,
    CorporateBond3yrAA,
    CorporateBond3yrBBB,
    PpiNonMetalMineral,
    PpiSteelPrimary,
}

impl Indicator {
    pub const ALL: [Indicator; 19] = [
        Indicator::BaseRate,
        Indicator::Ccsi,
        Indicator::ConstructionBsiActual,
        Indicator::ConstructionBsiForecast,
        Indicator::Cpi,
        Indicator::Esi,
        Indicator::ExchangeUsdKrwClose,
        Indicator::HousingLeasePrice,
        Indicator::HousingSalePrice,
        Indicator::ImportPriceNonMetalMineral,
        Indicator::ImportPriceSteelPrimary,
        Indicator::LeadingIndex,
        Indicator::M2Growth,
        Indicator::TreasuryBond10yr,
        Indicator::TreasuryBond3yr,
        Indicator::CorporateBond3yrAA,
        Indicator::CorporateBond3yrBBB,
        Indicator::PpiNonMetalMineral,
        Indicator::PpiSteelPrimary,
    ];

    /// Canonical column identifier
    pub fn canonical(&self) -> &'static str {
        match self {
            Indicator::BaseRate => "base_rate",
            Indicator::Ccsi => "ccsi",
            Indicator::ConstructionBsiActual => "construction_bsi_actual",
            Indicator::ConstructionBsiForecast => "construction_bsi_forecast",
            Indicator::Cpi => "cpi",
            Indicator::Esi => "esi",
            Indicator::ExchangeUsdKrwClose => "exchange_usd_krw_close",
            Indicator::HousingLeasePrice => "housing_lease_price",
            Indicator::HousingSalePrice => "housing_sale_price",
            Indicator::ImportPriceNonMetalMineral => "import_price_non_metal_mineral",
            Indicator::ImportPriceSteelPrimary => "import_price_steel_primary",
            Indicator::LeadingIndex => "leading_index",
            Indicator::M2Growth => "m2_growth",
            Indicator::TreasuryBond10yr => "market_rate_treasury_bond_10yr",
            Indicator::TreasuryBond3yr => "market_rate_treasury_bond_3yr",
            Indicator::CorporateBond3yrAA => "market_rate_corporate_bond_3yr_AA",
            Indicator::CorporateBond3yrBBB => "market_rate_corporate_bond_3yr_BBB",
            Indicator::PpiNonMetalMineral => "ppi_non_metal_mineral",
            Indicator::PpiSteelPrimary => "ppi_steel_primary",
        }
    }

    /// ECOS item name, when the statistic table holds more than one series
    pub fn item_name(&self) -> Option<&'static str> {
        match self {
            Indicator::BaseRate => Some("한국은행 기준금리"),
            Indicator::Ccsi => Some("현재생활형편CSI"),
            Indicator::ConstructionBsiActual => Some("업황실적BSI 1)"),
            Indicator::ConstructionBsiForecast => Some("업황전망BSI 1)"),
            Indicator::Esi => Some("경제심리지수(원계열)"),
            Indicator::ExchangeUsdKrwClose => Some("원/달러(종가 15:30)"),
            Indicator::LeadingIndex => Some("선행지수순환변동치"),
            Indicator::M2Growth => Some("M2(평잔, 계절조정계열)"),
            Indicator::TreasuryBond10yr => Some("국고채(10년)"),
            Indicator::TreasuryBond3yr => Some("국고채(3년)"),
            Indicator::CorporateBond3yrAA => Some("회사채(3년, AA-)"),
            Indicator::CorporateBond3yrBBB => Some("회사채(3년, BBB-)"),
            Indicator::PpiNonMetalMineral | Indicator::ImportPriceNonMetalMineral => Some("비금속광물"),
            Indicator::PpiSteelPrimary | Indicator::ImportPriceSteelPrimary => Some("철강1차제품"),
            Indicator::Cpi | Indicator::HousingLeasePrice | Indicator::HousingSalePrice => None,
        }
    }

    /// Prefix of per-item collection files (`<prefix>_<safe item name>.csv`)
    fn file_prefix(&self) -> Option<&'static str> {
        match self {
            Indicator::TreasuryBond10yr
            | Indicator::TreasuryBond3yr
            | Indicator::CorporateBond3yrAA
            | Indicator::CorporateBond3yrBBB => Some("market_rate"),
            Indicator::ExchangeUsdKrwClose => Some("exchange_usd"),
            Indicator::PpiNonMetalMineral | Indicator::PpiSteelPrimary => Some("ppi"),
            Indicator::ImportPriceNonMetalMineral | Indicator::ImportPriceSteelPrimary => {
                Some("import_price")
            }
            _ => None,
        }
    }

    /// Every source label known to denote this indicator, canonical identifier first
    pub fn source_labels(&self) -> Vec<String> {
        let mut labels = vec![self.canonical().to_string()];

        // Item names shared across tables only resolve through their file label
        if let (Some(item), None) = (self.item_name(), self.shared_item()) {
            labels.push(item.to_string());
        }
        if let (Some(prefix), Some(item)) = (self.file_prefix(), self.item_name()) {
            labels.push(format!("{}_{}", prefix, safe_label(item)));
        }

        let legacy: &[&str] = match self {
            Indicator::Cpi => &["소비자물가지수"],
            Indicator::ConstructionBsiActual => &["bsi_construction_actual"],
            Indicator::ConstructionBsiForecast => &["bsi_construction_outlook"],
            Indicator::HousingSalePrice => &["house_price"],
            Indicator::HousingLeasePrice => &["house_rent"],
            Indicator::ExchangeUsdKrwClose => &["exchange_rate"],
            Indicator::M2Growth => &["m2_growth_rate"],
            _ => &[],
        };
        labels.extend(legacy.iter().map(|l| l.to_string()));
        labels
    }

    fn shared_item(&self) -> Option<&'static str> {
        match self {
            Indicator::PpiNonMetalMineral
            | Indicator::PpiSteelPrimary
            | Indicator::ImportPriceNonMetalMineral
            | Indicator::ImportPriceSteelPrimary => self.item_name(),
            _ => None,
        }
    }

    pub fn from_canonical(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|i| i.canonical() == name)
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// File-name-safe form of an ECOS item name, as used by the collection scripts
pub fn safe_label(item: &str) -> String {
    item.chars()
        .filter(|c| !matches!(c, '(' | ')' | ','))
        .map(|c| match c {
            ' ' | '-' | '/' | ':' => '_',
            other => other,
        })
        .collect()
}

/// Source label to canonical identifier table
#[derive(Debug, Clone, Default)]
pub struct LabelMapping {
    labels: HashMap<String, String>,
}

impl LabelMapping {
    /// Empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping covering the full ECOS vocabulary
    pub fn ecos() -> Self {
        let mut mapping = Self::new();
        for indicator in Indicator::ALL {
            for label in indicator.source_labels() {
                mapping.labels.insert(label, indicator.canonical().to_string());
            }
        }
        mapping
    }

    /// Add or override a label
    pub fn with_alias(mut self, label: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.labels.insert(label.into(), canonical.into());
        self
    }

    /// Canonical identifier for a source label
    pub fn resolve(&self, label: &str) -> Option<&str> {
        self.labels.get(label.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
