//! ECOS Feature Server Module
//!
//! REST API over the feature pipeline. Loads raw indicators from the
//! store, runs the pipeline and persists the fixed-schema feature rows.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::{AppState, DateRange, PendingFeatures, PreprocessSummary, SelectionSnapshot};

use crate::config::PipelineConfig;
use crate::pipeline::FeaturePipeline;
use crate::store::SqliteStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// SQLite file holding `ecos_data` and `final_features`
    pub database_path: String,
    /// Optional JSON pipeline configuration
    pub pipeline_config: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "./data/ecos.db".to_string()),
            pipeline_config: std::env::var("PIPELINE_CONFIG").ok().filter(|p| !p.is_empty()),
        }
    }
}

impl ServerConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Pipeline configuration from `pipeline_config`, or the defaults
    pub fn load_pipeline_config(&self) -> crate::Result<PipelineConfig> {
        match &self.pipeline_config {
            Some(path) => PipelineConfig::from_file(path),
            None => Ok(PipelineConfig::default()),
        }
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();

    let pipeline = FeaturePipeline::new(config.load_pipeline_config()?)?;
    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    info!(
        database = %config.database_path,
        pipeline_config = config.pipeline_config.as_deref().unwrap_or("default"),
        "Initialized feature store"
    );

    let state = Arc::new(AppState::new(
        config.clone(),
        store.clone(),
        store,
        pipeline,
    ));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        host = %config.host,
        port = config.port,
        started_at = %start_time.to_rfc3339(),
        "ECOS feature server starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
            return;
        }
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
