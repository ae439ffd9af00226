//! Tabular containers passed between pipeline stages
//!
//! - [`RawTable`]: loosely typed input columns as they arrive from CSV or storage
//! - [`IndicatorTable`]: period-indexed numeric columns, `NaN` marks a missing value

use crate::error::{PipelineError, Result};
use crate::timeseries::YearMonth;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// A single raw cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Numeric interpretation of the cell. Unparsable text and non-finite numbers yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) if v.is_finite() => Some(*v),
            Cell::Number(_) | Cell::Null => None,
            Cell::Text(s) => s
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map(Cell::Number).unwrap_or(Cell::Null)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

/// A named column of raw cells
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub cells: Vec<Cell>,
}

/// Pipeline input: named columns of raw cells, all the same height
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<RawColumn>,
    height: usize,
}

impl RawTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`RawTable::push_column`]
    pub fn with_column(mut self, name: impl Into<String>, cells: Vec<Cell>) -> Result<Self> {
        self.push_column(name, cells)?;
        Ok(self)
    }

    /// Append a column, replacing an existing column with the same name
    pub fn push_column(&mut self, name: impl Into<String>, cells: Vec<Cell>) -> Result<()> {
        let name = name.into();
        if !self.columns.is_empty() && cells.len() != self.height {
            return Err(PipelineError::ShapeError {
                expected: format!("{} rows", self.height),
                actual: format!("{} rows in column '{}'", cells.len(), name),
            });
        }
        self.height = cells.len();

        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.cells = cells,
            None => self.columns.push(RawColumn { name, cells }),
        }
        Ok(())
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.columns.is_empty()
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&RawColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Rebuild from columns already known to share `height`
    pub(crate) fn from_parts(columns: Vec<RawColumn>, height: usize) -> Self {
        debug_assert!(columns.iter().all(|c| c.cells.len() == height));
        Self { columns, height }
    }

    /// Convert a polars frame. Integer and float columns become numbers; everything
    /// else is read as text.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut table = RawTable::new();

        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let name = series.name().to_string();

            let cells: Vec<Cell> = if series.dtype().is_primitive_numeric() {
                let values = series.cast(&DataType::Float64)?;
                values.f64()?.into_iter().map(Cell::from).collect()
            } else {
                let values = series.cast(&DataType::String)?;
                values
                    .str()?
                    .into_iter()
                    .map(|v| v.map(Cell::from).unwrap_or(Cell::Null))
                    .collect()
            };

            table.push_column(name, cells)?;
        }

        Ok(table)
    }
}

/// Period-indexed numeric table
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorTable {
    index: Vec<YearMonth>,
    names: Vec<String>,
    columns: Vec<Array1<f64>>,
}

impl IndicatorTable {
    /// Empty table over the given period index
    pub fn new(index: Vec<YearMonth>) -> Self {
        Self {
            index,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Builder form of [`IndicatorTable::insert_column`]
    pub fn with_column(mut self, name: impl Into<String>, values: Array1<f64>) -> Result<Self> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    /// Insert a column. An existing column of the same name is replaced in place,
    /// keeping its position.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Array1<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.index.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} rows", self.index.len()),
                actual: format!("{} rows in column '{}'", values.len(), name),
            });
        }

        match self.position(&name) {
            Some(pos) => self.columns[pos] = values,
            None => {
                self.names.push(name);
                self.columns.push(values);
            }
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn index(&self) -> &[YearMonth] {
        &self.index
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Array1<f64>> {
        self.position(name).map(|pos| &self.columns[pos])
    }

    /// Column lookup that reports absence as an error
    pub fn require(&self, name: &str) -> Result<&Array1<f64>> {
        self.column(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterate `(name, values)` in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Array1<f64>)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }

    /// Total number of missing cells
    pub fn missing_count(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.iter().filter(|v| v.is_nan()).count())
            .sum()
    }

    /// Keep the rows whose mask entry is `true`
    pub fn filter_rows(&self, keep: &[bool]) -> Result<Self> {
        if keep.len() != self.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("mask of {} rows", self.len()),
                actual: format!("{}", keep.len()),
            });
        }

        let index = self
            .index
            .iter()
            .zip(keep)
            .filter(|(_, &k)| k)
            .map(|(p, _)| *p)
            .collect();

        let columns = self
            .columns
            .iter()
            .map(|col| {
                col.iter()
                    .zip(keep)
                    .filter(|(_, &k)| k)
                    .map(|(v, _)| *v)
                    .collect::<Array1<f64>>()
            })
            .collect();

        Ok(Self {
            index,
            names: self.names.clone(),
            columns,
        })
    }

    /// The first `n` rows
    pub fn head(&self, n: usize) -> Self {
        let n = n.min(self.len());
        Self {
            index: self.index[..n].to_vec(),
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| c.slice(ndarray::s![..n]).to_owned())
                .collect(),
        }
    }

    /// Stack the named columns into a rows × columns matrix
    pub fn select(&self, names: &[String]) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((self.len(), names.len()));
        for (j, name) in names.iter().enumerate() {
            out.column_mut(j).assign(self.require(name)?);
        }
        Ok(out)
    }

    /// Convert into a polars frame with a leading `date` column
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<String> = self.index.iter().map(|p| p.to_string()).collect();
        let mut columns: Vec<Column> = Vec::with_capacity(self.width() + 1);
        columns.push(Series::new("date".into(), dates).into());

        for (name, values) in self.iter() {
            let values: Vec<Option<f64>> = values
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(*v) })
                .collect();
            columns.push(Series::new(name.into(), values).into());
        }

        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn periods(n: usize) -> Vec<YearMonth> {
        (0..n)
            .map(|i| YearMonth::new(2024, i as u32 + 1).unwrap())
            .collect()
    }

    #[test]
    fn test_cell_numeric_coercion() {
        assert_eq!(Cell::from("3.5").as_f64(), Some(3.5));
        assert_eq!(Cell::from(" 1,234.5 ").as_f64(), Some(1234.5));
        assert_eq!(Cell::from("n/a").as_f64(), None);
        assert_eq!(Cell::Number(f64::NAN).as_f64(), None);
        assert_eq!(Cell::Null.as_f64(), None);
    }

    #[test]
    fn test_raw_table_rejects_ragged_columns() {
        let table = RawTable::new()
            .with_column("date", vec!["2024-01".into(), "2024-02".into()])
            .unwrap();
        let err = table.with_column("cpi", vec![1.0.into()]).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeError { .. }));
    }

    #[test]
    fn test_raw_table_from_dataframe() {
        let df = df! {
            "date" => &["2024-01", "2024-02"],
            "cpi" => &[1.5, 2.5],
            "code" => &[202401i64, 202402],
        }
        .unwrap();

        let table = RawTable::from_dataframe(&df).unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.column_names(), vec!["date", "cpi", "code"]);
        assert_eq!(table.column("date").unwrap().cells[0], Cell::from("2024-01"));
        assert_eq!(table.column("code").unwrap().cells[1], Cell::Number(202402.0));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut table = IndicatorTable::new(periods(3))
            .with_column("a", array![1.0, 2.0, 3.0])
            .unwrap()
            .with_column("b", array![4.0, 5.0, 6.0])
            .unwrap();

        table.insert_column("a", array![7.0, 8.0, 9.0]).unwrap();
        assert_eq!(table.column_names(), &["a".to_string(), "b".to_string()]);
        assert!((table.column("a").unwrap()[0] - 7.0).abs() < 1e-12);

        assert!(table.insert_column("c", array![1.0]).is_err());
    }

    #[test]
    fn test_filter_rows_and_select() {
        let table = IndicatorTable::new(periods(3))
            .with_column("a", array![1.0, f64::NAN, 3.0])
            .unwrap();

        assert_eq!(table.missing_count(), 1);

        let kept = table.filter_rows(&[true, false, true]).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.index()[1], YearMonth::new(2024, 3).unwrap());

        let matrix = kept.select(&["a".to_string()]).unwrap();
        assert_eq!(matrix.dim(), (2, 1));
        assert!((matrix[[1, 0]] - 3.0).abs() < 1e-12);

        assert!(matches!(
            kept.select(&["zzz".to_string()]),
            Err(PipelineError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_to_dataframe() {
        let table = IndicatorTable::new(periods(2))
            .with_column("a", array![1.0, f64::NAN])
            .unwrap();
        let df = table.to_dataframe().unwrap();
        assert_eq!(df.shape(), (2, 2));
        assert_eq!(df.column("a").unwrap().null_count(), 1);
    }
}
