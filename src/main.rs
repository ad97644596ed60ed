use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use clinrag::Result;
use clinrag::config::{Config, EnvFlags, StaticFlags};
use clinrag::database::Database;
use clinrag::embeddings::OllamaClient;
use clinrag::indexer::{RagIndexer, RebuildRequest};
use clinrag::server::{AppState, serve};

#[derive(Parser)]
#[command(name = "clinrag")]
#[command(about = "Per-patient semantic search index maintenance for clinical records")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the chunk index for a page of patients
    Rebuild {
        /// Restrict the run to one patient
        #[arg(long)]
        patient: Option<String>,
        /// Restrict the run to one organization
        #[arg(long)]
        organization: Option<String>,
        /// Patients to process in this run
        #[arg(long)]
        limit: Option<i64>,
        /// Report chunk counts without embedding or writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete the persisted index for one patient
    Clear {
        /// Patient ID to clear
        patient: String,
        /// Organization scope for the delete
        #[arg(long)]
        organization: Option<String>,
    },
    /// Serve the operational HTTP endpoint
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:8787")]
        addr: String,
    },
    /// Show the active configuration
    Config {
        /// Print the resolved configuration as TOML
        #[arg(long)]
        show: bool,
    },
}

fn config_dir(cli_override: Option<PathBuf>) -> Result<PathBuf> {
    match cli_override {
        Some(dir) => Ok(dir),
        None => dirs::config_dir()
            .map(|dir| dir.join("clinrag"))
            .ok_or_else(|| clinrag::RagError::Config("No config directory found".to_string())),
    }
}

async fn build_indexer(config: &Config) -> Result<RagIndexer<OllamaClient>> {
    let database = Database::new(config.database_path()).await?;
    let embedder = OllamaClient::new(&config.ollama)?;
    Ok(RagIndexer::new(
        database,
        embedder,
        config.chunking,
        config.indexing,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(config_dir(cli.config_dir)?)?;

    match cli.command {
        Commands::Rebuild {
            patient,
            organization,
            limit,
            dry_run,
        } => {
            let indexer = build_indexer(&config).await?;
            let report = indexer
                .rebuild(&RebuildRequest {
                    patient_id: patient,
                    organization_id: organization,
                    limit,
                    dry_run,
                })
                .await;
            println!("{}", serde_json::to_string_pretty(&report).map_err(anyhow::Error::from)?);
        }
        Commands::Clear {
            patient,
            organization,
        } => {
            let indexer = build_indexer(&config).await?;
            // The CLI is an operator tool; the feature flag does not gate it.
            let outcome = indexer
                .clear_patient_index(&patient, organization.as_deref(), &StaticFlags::enabled())
                .await;
            println!("{}", serde_json::to_string_pretty(&outcome).map_err(anyhow::Error::from)?);
        }
        Commands::Serve { addr } => {
            let indexer = build_indexer(&config).await?;
            serve(
                AppState {
                    indexer: Arc::new(indexer),
                    flags: Arc::new(EnvFlags),
                },
                &addr,
            )
            .await?;
        }
        Commands::Config { show } => {
            if show {
                let rendered = toml::to_string_pretty(&config).map_err(anyhow::Error::from)?;
                print!("{rendered}");
            } else {
                config.save()?;
                println!("Configuration written to {}", config.base_dir.display());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["clinrag", "rebuild", "--limit", "5", "--dry-run"]);
        assert!(cli.is_ok());

        let cli = Cli::try_parse_from(["clinrag", "clear", "p1", "--organization", "org-a"]);
        assert!(cli.is_ok());

        let cli = Cli::try_parse_from(["clinrag", "serve", "--addr", "0.0.0.0:9000"]);
        assert!(cli.is_ok());

        let cli = Cli::try_parse_from(["clinrag", "rebuild", "--limit", "nope"]);
        assert!(cli.is_err());
    }
}
