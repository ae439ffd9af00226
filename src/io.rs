//! CSV input and output

use crate::error::{PipelineError, Result};
use crate::pipeline::{FeatureRow, FeatureSchema};
use crate::table::RawTable;
use crate::timeseries::YearMonth;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read a CSV file into a polars frame
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !ext.eq_ignore_ascii_case("csv") {
        return Err(PipelineError::InvalidInput(format!(
            "Unsupported file format: {}",
            ext
        )));
    }

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()?;

    debug!(path = %path.display(), rows = df.height(), columns = df.width(), "Read CSV");
    Ok(df)
}

/// Load a CSV file as pipeline input
pub fn load_raw_table(path: &Path) -> Result<RawTable> {
    RawTable::from_dataframe(&read_csv(path)?)
}

/// Persistence rows as a frame: `date` followed by the schema columns
pub fn feature_rows_to_dataframe(schema: &FeatureSchema, rows: &[FeatureRow]) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(schema.len() + 1);
    let dates: Vec<&str> = rows.iter().map(|r| r.date.as_str()).collect();
    columns.push(Series::new("date".into(), dates).into());

    for (j, name) in schema.columns().iter().enumerate() {
        let values: Vec<Option<f64>> = rows
            .iter()
            .map(|r| r.values.get(j).copied().flatten())
            .collect();
        columns.push(Series::new(name.as_str().into(), values).into());
    }

    Ok(DataFrame::new(columns)?)
}

/// Write persistence rows to a CSV file. Returns the number of rows written.
pub fn write_feature_rows(path: &Path, schema: &FeatureSchema, rows: &[FeatureRow]) -> Result<usize> {
    let mut df = feature_rows_to_dataframe(schema, rows)?;
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    Ok(df.height())
}

/// Read persistence rows written by [`write_feature_rows`].
///
/// Schema columns absent from the file read as `None`.
pub fn read_feature_rows(path: &Path, schema: &FeatureSchema) -> Result<Vec<FeatureRow>> {
    let raw = load_raw_table(path)?;
    let dates = raw
        .column("date")
        .ok_or_else(|| PipelineError::MissingColumn("date".to_string()))?;
    let columns: Vec<_> = schema.columns().iter().map(|name| raw.column(name)).collect();

    dates
        .cells
        .iter()
        .enumerate()
        .map(|(row, cell)| {
            Ok(FeatureRow {
                date: YearMonth::from_cell(cell)?.compact(),
                values: columns
                    .iter()
                    .map(|col| col.and_then(|c| c.cells[row].as_f64()))
                    .collect(),
            })
        })
        .collect()
}
