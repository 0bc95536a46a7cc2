//! # Vector Gateway CLI (`vgw`)
//!
//! ```bash
//! vgw --config ./config/gateway.toml serve
//! vgw --config ./config/gateway.toml check
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vector_gateway::auth::TokenMapAuthenticator;
use vector_gateway::config::{load_config, Config};
use vector_gateway::embedding::{EmbeddingClient, OpenAiEmbedder};
use vector_gateway::ingest::IngestionPipeline;
use vector_gateway::partition::IndexNaming;
use vector_gateway::query::QueryOrchestrator;
use vector_gateway::report::{FailureReporter, LogNotifier};
use vector_gateway::retry::RetryPolicy;
use vector_gateway::server::{run_server, AppState};
use vector_gateway::store::{InMemoryVectorStore, RestVectorStore, VectorStore};

/// Vector Gateway — a multi-tenant embedding ingestion and vector
/// similarity-search gateway.
#[derive(Parser)]
#[command(
    name = "vgw",
    about = "Vector Gateway — multi-tenant embedding ingestion and similarity search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gateway.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway.
    Serve,
    /// Validate the configuration and exit.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let state = build_state(&config)?;
            tracing::info!(
                backend = %config.backend.kind,
                shared_index = %config.index.shared,
                "gateway starting"
            );
            run_server(&config.server.bind, state).await?;
            tracing::info!("gateway shut down");
        }
        Commands::Check => {
            println!("configuration ok");
            println!("  backend: {}", config.backend.kind);
            println!("  embedding model: {}", config.embedding.model);
            println!("  embedding dims: {}", config.embedding.dims);
            println!("  shared index: {}", config.index.shared);
            println!("  bind: {}", config.server.bind);
        }
    }

    Ok(())
}

fn build_state(config: &Config) -> Result<AppState> {
    let embedder = Arc::new(OpenAiEmbedder::new(&config.embedding)?);
    let embedding = EmbeddingClient::new(embedder, config.embedding.max_input_chars);

    let naming = IndexNaming::new(&config.index);
    let store: Arc<dyn VectorStore> = match config.backend.kind.as_str() {
        "rest" => Arc::new(RestVectorStore::new(&config.backend, naming)?),
        _ => Arc::new(InMemoryVectorStore::new()),
    };

    let retry = RetryPolicy::from_config(&config.retry);
    let reporter = FailureReporter::new(Arc::new(LogNotifier));

    let ingest = Arc::new(IngestionPipeline::new(
        embedding.clone(),
        store.clone(),
        retry,
        reporter.clone(),
    ));
    let query = Arc::new(QueryOrchestrator::new(
        embedding,
        store,
        retry,
        reporter,
        config.retrieval.clone(),
    ));
    let auth = Arc::new(TokenMapAuthenticator::new(&config.auth));

    Ok(AppState {
        auth,
        ingest,
        query,
    })
}
