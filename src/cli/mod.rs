//! ECOS Features CLI Module
//!
//! Command-line interface for running the pipeline on CSV files, seeding
//! the SQLite store and serving the REST API.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::io::{load_raw_table, read_csv, read_feature_rows, write_feature_rows};
use crate::normalize::ColumnNormalizer;
use crate::pipeline::{FeaturePipeline, FeatureSchema, PipelineOutput};
use crate::store::{FeatureStore, IndicatorSource, SqliteStore};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ecos-features")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Feature engineering pipeline for monthly ECOS indicators")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline on a CSV file
    Run {
        /// Input CSV with a date column and indicator columns
        #[arg(short, long)]
        data: PathBuf,

        /// Write the persistence rows to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Normalize a CSV file and store it as raw indicators
    Import {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// SQLite database file
        #[arg(long, default_value = "./data/ecos.db")]
        db: PathBuf,
    },

    /// Run the pipeline over stored indicators and persist the features
    Process {
        /// SQLite database file
        #[arg(long, default_value = "./data/ecos.db")]
        db: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Persist feature rows kept by a failed `process` run
    Persist {
        /// Feature rows CSV
        #[arg(short, long)]
        rows: PathBuf,

        /// SQLite database file
        #[arg(long, default_value = "./data/ecos.db")]
        db: PathBuf,
    },

    /// Show data information
    Info {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Start the web server
    Serve {
        /// Server port
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Server host
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// SQLite database file
        #[arg(long, default_value = "./data/ecos.db")]
        db: PathBuf,
    },
}

fn load_pipeline(config: Option<&Path>) -> anyhow::Result<FeaturePipeline> {
    let config = match config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    Ok(FeaturePipeline::new(config)?)
}

fn print_summary(output: &PipelineOutput) {
    let range = output
        .date_range()
        .map(|(first, last)| format!("{} → {}", first, last))
        .unwrap_or_else(|| "-".to_string());

    println!();
    println!("  {:<16} {}", muted("Rows"), output.n_rows().to_string().white().bold());
    println!("  {:<16} {}", muted("Periods"), range.white());
    println!("  {:<16} {}", muted("Targets"), output.target_names.join(", ").white());
    println!("  {:<16} {}", muted("Selected"), output.feature_names.len().to_string().white().bold());
    println!("  {:<16} {}", muted("Redundant"), output.removed.len().to_string().white());

    if !output.correlation.is_empty() {
        println!();
        println!("  {:<36} {:>10}", muted("Feature"), muted("Mean |r|"));
        println!("  {}", dim(&"─".repeat(48)));
        for (name, score) in output.correlation.iter().take(10) {
            println!("  {:<36} {:>10.4}", name, score);
        }
    }
    println!();
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(data_path: &Path, output: Option<&Path>, config: Option<&Path>) -> anyhow::Result<()> {
    section("Run");

    let pipeline = load_pipeline(config)?;

    step_run("Loading data");
    let start = Instant::now();
    let raw = load_raw_table(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", raw.height(), raw.width(), start.elapsed()));

    step_run("Running pipeline");
    let start = Instant::now();
    let result = pipeline.run(&raw)?;
    step_done(&format!("{:?}", start.elapsed()));

    if let Some(output_path) = output {
        step_run(&format!("Saving → {}", output_path.display()));
        let schema = FeatureSchema::reference();
        let rows = result.to_feature_rows(&schema);
        let written = write_feature_rows(output_path, &schema, &rows)?;
        step_done(&format!("{} rows × {} cols", written, schema.len() + 1));
    }

    print_summary(&result);
    Ok(())
}

pub fn cmd_import(data_path: &Path, db_path: &Path) -> anyhow::Result<()> {
    section("Import");

    step_run("Loading data");
    let raw = load_raw_table(data_path)?;
    step_done(&format!("{} rows × {} cols", raw.height(), raw.width()));

    step_run("Normalizing labels");
    let normalized = ColumnNormalizer::default().normalize(&raw);
    step_done(&format!("{} cols", normalized.width()));

    step_run(&format!("Saving → {}", db_path.display()));
    let store = SqliteStore::open(db_path)?;
    let written = store.save_indicators(&normalized)?;
    step_done(&format!("{} rows", written));

    println!();
    Ok(())
}

pub fn cmd_process(db_path: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    section("Process");

    let pipeline = load_pipeline(config)?;
    let store = SqliteStore::open(db_path)?;

    step_run("Loading indicators");
    let raw = store.load_indicators()?;
    step_done(&format!("{} rows", raw.height()));
    if raw.is_empty() {
        anyhow::bail!("No ECOS data found in {}", db_path.display());
    }

    step_run("Running pipeline");
    let start = Instant::now();
    let result = pipeline.run(&raw)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_summary(&result);

    step_run("Saving features");
    let rows = result.to_feature_rows(store.schema());
    match store.save_features(&rows) {
        Ok(written) => {
            step_done(&format!("{} rows", written));
            Ok(())
        }
        Err(e) => {
            println!("{}", "failed".red());
            let pending = pending_rows_path(db_path);
            write_feature_rows(&pending, store.schema(), &rows)?;
            anyhow::bail!(
                "{}; feature rows kept in {} (retry with `persist --rows {}`)",
                e,
                pending.display(),
                pending.display()
            )
        }
    }
}

/// Where `process` keeps rows the store rejected
pub fn pending_rows_path(db_path: &Path) -> PathBuf {
    db_path.with_extension("pending.csv")
}

pub fn cmd_persist(rows_path: &Path, db_path: &Path) -> anyhow::Result<()> {
    section("Persist");

    let store = SqliteStore::open(db_path)?;

    step_run("Reading feature rows");
    let rows = read_feature_rows(rows_path, store.schema())?;
    step_done(&format!("{} rows", rows.len()));

    step_run("Saving features");
    let written = store.save_features(&rows)?;
    step_done(&format!("{} rows", written));
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = read_csv(data_path)?;
    let normalizer = ColumnNormalizer::default();

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!();

    println!("  {:<32} {:<10} {:>6}  {}", muted("Column"), muted("Type"), muted("Nulls"), muted("Indicator"));
    println!("  {}", dim(&"─".repeat(72)));

    for col in df.get_columns() {
        let indicator = normalizer
            .mapping()
            .resolve(col.name().as_str())
            .map(|c| c.green())
            .unwrap_or_else(|| dim("-"));
        println!(
            "  {:<32} {:<10} {:>6}  {}",
            col.name().as_str(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            indicator
        );
    }

    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(host: &str, port: u16, db_path: &Path) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "ECOS Features".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("API    ", &format!("http://{}:{}", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/health", host, port)));
    line_box(&kv("DB     ", &db_path.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    let config = ServerConfig::default()
        .with_host(host)
        .with_port(port)
        .with_database_path(db_path.display().to_string());

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        let colored = format!("{}", "value".red());
        assert_eq!(strip_ansi(&colored), "value");
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["ecos-features", "run", "--data", "ecos.csv", "-o", "out.csv"]).unwrap();
        match cli.command {
            Commands::Run { data, output, config } => {
                assert_eq!(data, PathBuf::from("ecos.csv"));
                assert_eq!(output, Some(PathBuf::from("out.csv")));
                assert!(config.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_pending_rows_beside_database() {
        assert_eq!(
            pending_rows_path(Path::new("./data/ecos.db")),
            PathBuf::from("./data/ecos.pending.csv")
        );
    }

    #[test]
    fn test_persist_kept_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("ecos.db");
        let kept = pending_rows_path(&db);

        let schema = FeatureSchema::reference();
        let mut values = vec![Some(0.5); schema.len()];
        values[0] = None;
        let rows = vec![crate::pipeline::FeatureRow {
            date: "202405".to_string(),
            values,
        }];
        write_feature_rows(&kept, &schema, &rows).unwrap();

        cmd_persist(&kept, &db).unwrap();

        let stored = SqliteStore::open(&db).unwrap().load_features().unwrap();
        assert_eq!(stored.rows, rows);
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["ecos-features", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { port, host, db } => {
                assert_eq!(port, 8000);
                assert_eq!(host, "0.0.0.0");
                assert_eq!(db, PathBuf::from("./data/ecos.db"));
            }
            _ => panic!("expected serve"),
        }
    }
}
