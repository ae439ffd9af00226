//! ECOS Features - Main Entry Point

use clap::Parser;
use ecos_features::cli::{cmd_import, cmd_info, cmd_persist, cmd_process, cmd_run, cmd_serve, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ecos_features=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { data, output, config } => {
            cmd_run(&data, output.as_deref(), config.as_deref())?;
        }
        Commands::Import { data, db } => {
            cmd_import(&data, &db)?;
        }
        Commands::Process { db, config } => {
            cmd_process(&db, config.as_deref())?;
        }
        Commands::Persist { rows, db } => {
            cmd_persist(&rows, &db)?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
        Commands::Serve { port, host, db } => {
            cmd_serve(&host, port, &db).await?;
        }
    }

    Ok(())
}
