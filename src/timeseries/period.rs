//! Year-month period keys

use crate::error::{PipelineError, Result};
use crate::table::Cell;
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical monthly period key.
///
/// Displays as `YYYY-MM`; [`YearMonth::compact`] gives the `YYYYMM` form used
/// by ECOS and by the feature store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Create a period, validating the month
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(PipelineError::InvalidParameter {
                name: "month".to_string(),
                value: month.to_string(),
                reason: "must be within 1..=12".to_string(),
            });
        }
        Ok(Self { year, month })
    }

    /// The calendar month currently in progress (UTC)
    pub fn current() -> Self {
        let today = Utc::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// `YYYYMM` representation
    pub fn compact(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }

    /// Parse a textual period.
    ///
    /// Accepts 6-digit codes (`202401`), `2024-01`, `2024/01` and full dates
    /// (`2024-01-31`, optionally followed by a time component).
    pub fn parse(raw: &str) -> Result<Self> {
        let s = raw.trim();
        let invalid = || PipelineError::InvalidInput(format!("unrecognised period: {:?}", raw));

        if s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit()) {
            let year: i32 = s[..4].parse().map_err(|_| invalid())?;
            let month: u32 = s[4..].parse().map_err(|_| invalid())?;
            return Self::new(year, month).map_err(|_| invalid());
        }

        if s.len() == 7 && matches!(s.as_bytes()[4], b'-' | b'/' | b'.') {
            let year: i32 = s[..4].parse().map_err(|_| invalid())?;
            let month: u32 = s[5..].parse().map_err(|_| invalid())?;
            return Self::new(year, month).map_err(|_| invalid());
        }

        if s.len() >= 10 && s.is_char_boundary(10) {
            let date = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(&s[..10], "%Y/%m/%d"))
                .map_err(|_| invalid())?;
            return Ok(Self {
                year: date.year(),
                month: date.month(),
            });
        }

        Err(invalid())
    }

    /// Interpret a numeric `YYYYMM` code
    pub fn from_code(code: f64) -> Result<Self> {
        if !code.is_finite() || code.fract() != 0.0 || !(100_001.0..=999_912.0).contains(&code) {
            return Err(PipelineError::InvalidInput(format!(
                "numeric period must be a 6-digit YYYYMM code, got {}",
                code
            )));
        }
        let code = code as i64;
        Self::new((code / 100) as i32, (code % 100) as u32)
    }

    /// Interpret a raw cell as a period
    pub fn from_cell(cell: &Cell) -> Result<Self> {
        match cell {
            Cell::Number(v) => Self::from_code(*v),
            Cell::Text(s) => Self::parse(s),
            Cell::Null => Err(PipelineError::InvalidInput("missing period".to_string())),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants() {
        let expected = YearMonth::new(2024, 3).unwrap();
        assert_eq!(YearMonth::parse("202403").unwrap(), expected);
        assert_eq!(YearMonth::parse("2024-03").unwrap(), expected);
        assert_eq!(YearMonth::parse(" 2024-03-31 ").unwrap(), expected);
        assert_eq!(YearMonth::parse("2024-03-01 00:00:00").unwrap(), expected);
        assert_eq!(YearMonth::from_code(202403.0).unwrap(), expected);
    }

    #[test]
    fn test_rejects_bad_periods() {
        assert!(YearMonth::parse("202413").is_err());
        assert!(YearMonth::parse("2024").is_err());
        assert!(YearMonth::parse("not-a-date").is_err());
        assert!(YearMonth::from_code(2024.5).is_err());
        assert!(YearMonth::from_cell(&Cell::Null).is_err());
    }

    #[test]
    fn test_formatting_and_ordering() {
        let a = YearMonth::new(2023, 12).unwrap();
        let b = YearMonth::new(2024, 1).unwrap();
        assert_eq!(a.to_string(), "2023-12");
        assert_eq!(b.compact(), "202401");
        assert!(a < b);
    }
}
