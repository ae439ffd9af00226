//! SQLite-backed indicator source and feature store

use super::{FeatureStore, IndicatorSource, StoredFeatures};
use crate::error::{PipelineError, Result};
use crate::normalize::Indicator;
use crate::pipeline::{FeatureRow, FeatureSchema};
use crate::table::{Cell, RawTable};
use crate::timeseries::YearMonth;
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::{debug, info, warn};

const ECOS_TABLE: &str = "ecos_data";
const FEATURE_TABLE: &str = "final_features";

/// SQLite store holding raw indicators and persisted feature rows
pub struct SqliteStore {
    conn: Mutex<Connection>,
    schema: FeatureSchema,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

fn indicator_columns() -> Vec<&'static str> {
    Indicator::ALL.iter().map(|i| i.canonical()).collect()
}

fn quoted(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Conflict action touching only the imported columns
fn upsert_assignments(columns: &[&str]) -> String {
    if columns.is_empty() {
        return "NOTHING".to_string();
    }
    let sets: Vec<String> = columns
        .iter()
        .map(|c| format!("\"{0}\" = excluded.\"{0}\"", c))
        .collect();
    format!("UPDATE SET {}", sets.join(", "))
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

impl SqliteStore {
    /// Open (or create) a database file with the reference feature schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let store = Self::with_connection(conn, FeatureSchema::reference())?;
        info!(path = %path.display(), "Opened SQLite store");
        Ok(store)
    }

    /// In-memory database, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, FeatureSchema::reference())
    }

    fn with_connection(conn: Connection, schema: FeatureSchema) -> Result<Self> {
        let ecos_columns: Vec<String> = indicator_columns()
            .iter()
            .map(|c| format!("\"{}\" REAL", c))
            .collect();
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (date TEXT PRIMARY KEY, {})",
                ECOS_TABLE,
                ecos_columns.join(", ")
            ),
            [],
        )?;

        let feature_columns: Vec<String> = schema
            .columns()
            .iter()
            .map(|c| format!("\"{}\" REAL", c))
            .collect();
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (date TEXT PRIMARY KEY, {})",
                FEATURE_TABLE,
                feature_columns.join(", ")
            ),
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            schema,
        })
    }

    /// Upsert normalized indicator rows into `ecos_data`.
    ///
    /// The table must carry canonical column names and a `date` column; rows
    /// with an unparsable date and columns outside the vocabulary are skipped.
    /// An existing month keeps the indicators this table does not carry.
    pub fn save_indicators(&self, table: &RawTable) -> Result<usize> {
        let dates = table
            .column("date")
            .ok_or_else(|| PipelineError::MissingColumn("date".to_string()))?;

        let columns: Vec<_> = table
            .columns()
            .iter()
            .filter(|c| c.name != "date")
            .filter(|c| {
                let known = Indicator::from_canonical(&c.name).is_some();
                if !known {
                    warn!(column = %c.name, "Skipping column outside the indicator vocabulary");
                }
                known
            })
            .collect();

        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        let sql = format!(
            "INSERT INTO {} (date{}{}) VALUES ({}) ON CONFLICT(date) DO {}",
            ECOS_TABLE,
            if names.is_empty() { "" } else { ", " },
            quoted(&names),
            placeholders(names.len() + 1),
            upsert_assignments(&names)
        );

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(&sql)?;
            for (row, cell) in dates.cells.iter().enumerate() {
                let period = match YearMonth::from_cell(cell) {
                    Ok(period) => period,
                    Err(e) => {
                        debug!(row, error = %e, "Skipping indicator row");
                        continue;
                    }
                };

                let mut values = Vec::with_capacity(columns.len() + 1);
                values.push(Value::Text(period.compact()));
                values.extend(columns.iter().map(|c| match c.cells[row].as_f64() {
                    Some(v) => Value::Real(v),
                    None => Value::Null,
                }));

                stmt.execute(params_from_iter(values.iter()))?;
                written += 1;
            }
        }
        tx.commit()?;

        info!(rows = written, columns = columns.len(), "Saved indicators");
        Ok(written)
    }
}

impl IndicatorSource for SqliteStore {
    fn load_indicators(&self) -> Result<RawTable> {
        let names = indicator_columns();
        let sql = format!(
            "SELECT date, {} FROM {} ORDER BY date",
            quoted(&names),
            ECOS_TABLE
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut dates: Vec<Cell> = Vec::new();
        let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];

        while let Some(row) = rows.next()? {
            dates.push(Cell::Text(row.get::<_, String>(0)?));
            for (j, column) in columns.iter_mut().enumerate() {
                column.push(Cell::from(row.get::<_, Option<f64>>(j + 1)?));
            }
        }

        let mut table = RawTable::new().with_column("date", dates)?;
        for (name, cells) in names.into_iter().zip(columns) {
            table.push_column(name, cells)?;
        }

        debug!(rows = table.height(), "Loaded indicators");
        Ok(table)
    }
}

impl FeatureStore for SqliteStore {
    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn save_features(&self, rows: &[FeatureRow]) -> Result<usize> {
        let names: Vec<&str> = self.schema.columns().iter().map(String::as_str).collect();
        if let Some(bad) = rows.iter().find(|r| r.values.len() != names.len()) {
            return Err(PipelineError::StorageError(format!(
                "row {} has {} values, schema has {}",
                bad.date,
                bad.values.len(),
                names.len()
            )));
        }

        let delete = format!("DELETE FROM {} WHERE date = ?1", FEATURE_TABLE);
        let insert = format!(
            "INSERT INTO {} (date, {}) VALUES ({})",
            FEATURE_TABLE,
            quoted(&names),
            placeholders(names.len() + 1)
        );

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut delete = tx.prepare(&delete)?;
            let mut insert = tx.prepare(&insert)?;
            for row in rows {
                delete.execute([&row.date])?;

                let mut values = Vec::with_capacity(names.len() + 1);
                values.push(Value::Text(row.date.clone()));
                values.extend(row.values.iter().map(|v| match v {
                    Some(v) => Value::Real(*v),
                    None => Value::Null,
                }));
                insert.execute(params_from_iter(values.iter()))?;
            }
        }
        tx.commit()?;

        info!(rows = rows.len(), table = FEATURE_TABLE, "Saved feature rows");
        Ok(rows.len())
    }

    fn load_features(&self) -> Result<StoredFeatures> {
        let names: Vec<&str> = self.schema.columns().iter().map(String::as_str).collect();
        let sql = format!(
            "SELECT date, {} FROM {} ORDER BY date",
            quoted(&names),
            FEATURE_TABLE
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                let date: String = row.get(0)?;
                let values = (1..=names.len())
                    .map(|j| row.get::<_, Option<f64>>(j))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(FeatureRow { date, values })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(StoredFeatures {
            columns: self.schema.columns().to_vec(),
            rows,
        })
    }
}
