//! AptWise CLI
//!
//! Main entry point for the aptwise command-line tool.
//! Seeds and searches the interview question bank and runs generated
//! questions through the duplicate detector.

mod commands;

use aptwise_core::{config::AppConfig, logging, AppResult};
use aptwise_knowledge::{QuestionDeduplicationService, VectorConfig, VectorRetrievalService};
use clap::{Parser, Subcommand};
use commands::{BankCommand, CheckBatchCommand, CheckCommand, SearchCommand};
use std::path::PathBuf;
use std::sync::Arc;

/// AptWise CLI - interview question bank with semantic de-duplication
#[derive(Parser, Debug)]
#[command(name = "aptwise")]
#[command(about = "Interview question bank with semantic de-duplication", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "APTWISE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "APTWISE_CONFIG")]
    config: Option<PathBuf>,

    /// Corpus directory
    #[arg(long, global = true, env = "APTWISE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Question bank management
    Bank(BankCommand),

    /// Search the bank for similar questions
    Search(SearchCommand),

    /// Check one question for duplicates and store it if new
    Check(CheckCommand),

    /// Check a JSON file of questions
    CheckBatch(CheckBatchCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Workspace and config file decide which file is read, so they go in at load time
    let config = AppConfig::load_from(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(None, cli.data_dir, cli.log_level, cli.verbose, cli.no_color);

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("AptWise CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        "Embedding: {} / {} ({} dimensions)",
        config.embedding.provider,
        config.embedding.model,
        config.embedding.dimensions
    );

    // Ensure .aptwise directory exists
    config.ensure_aptwise_dir()?;

    // One retrieval service and one dedup service for the whole run
    let vector_config = VectorConfig::from_app_config(&config)?;
    let retrieval = Arc::new(VectorRetrievalService::connect(&vector_config).await?);
    let dedup =
        QuestionDeduplicationService::with_threshold(retrieval.clone(), vector_config.similarity_threshold)?;

    let command_name = match &cli.command {
        Commands::Bank(_) => "bank",
        Commands::Search(_) => "search",
        Commands::Check(_) => "check",
        Commands::CheckBatch(_) => "check-batch",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Bank(cmd) => cmd.execute(&config, &dedup).await,
        Commands::Search(cmd) => cmd.execute(&retrieval).await,
        Commands::Check(cmd) => cmd.execute(&dedup).await,
        Commands::CheckBatch(cmd) => cmd.execute(&dedup).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
