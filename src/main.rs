//! # AirTag Assistant CLI (`airtag`)
//!
//! ## Usage
//!
//! ```bash
//! airtag --config ./config/assistant.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `airtag init` | Create the SQLite vector store schema |
//! | `airtag ingest` | Chunk, embed, and store the knowledge base |
//! | `airtag ask "<question>"` | Answer one question and print its sources |
//! | `airtag serve` | Start the HTTP server (`POST /api/chat`) |
//! | `airtag check` | Smoke-test the vector store |
//!
//! Logs go to stderr; set `RUST_LOG=airtag_assistant=debug` to trace
//! guardrail and retrieval decisions.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use airtag_assistant::config::{load_config, Config};
use airtag_assistant::pipeline::Pipeline;
use airtag_assistant::store::{smoke_check, SqliteVectorStore};
use airtag_assistant::{db, ingest, migrate, server};

/// AirTag Assistant: grounded answers about Apple AirTags and Find My.
#[derive(Parser)]
#[command(name = "airtag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/assistant.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the vector store schema. Idempotent.
    Init,

    /// Ingest the knowledge directory into the vector store.
    Ingest,

    /// Answer a single question.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Start the HTTP server.
    Serve,

    /// Check that the vector store is reachable and queryable.
    Check {
        /// Number of rows to request from the probe query.
        #[arg(long, default_value = "1")]
        probe: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&config).await?,
        Commands::Ingest => ingest::run_ingest(&config).await?,
        Commands::Ask { question } => run_ask(&config, &question).await?,
        Commands::Serve => server::run_server(&config).await?,
        Commands::Check { probe } => run_check(&config, probe).await?,
    }

    Ok(())
}

async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(&config.store.path).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("Vector store initialized at {}", config.store.path.display());
    Ok(())
}

async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let pipeline = Pipeline::from_config(config).await?;
    let answer = pipeline.answer(question).await?;

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("Retrieved sources:");
        for source in &answer.sources {
            match &source.url {
                Some(url) => println!(
                    "  [{:.3}] {} (chunk {}) {}",
                    source.score, source.title, source.chunk_id, url
                ),
                None => println!(
                    "  [{:.3}] {} (chunk {})",
                    source.score, source.title, source.chunk_id
                ),
            }
        }
    }
    Ok(())
}

async fn run_check(config: &Config, probe: usize) -> Result<()> {
    let store = SqliteVectorStore::open(&config.store.path).await?;
    let health = smoke_check(&store, config.embedding.dims, probe.max(1)).await;
    store.close().await;
    let health = health?;

    println!("check {}", config.store.path.display());
    println!("  rows: {}", health.rows);
    println!("  probe matches: {}", health.probe_matches);
    println!("ok");
    Ok(())
}
