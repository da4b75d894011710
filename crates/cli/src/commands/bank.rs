//! Bank command handler.
//!
//! Seeds, reindexes and inspects the question bank.

use aptwise_core::{config::AppConfig, AppResult};
use aptwise_knowledge::{CorpusLoader, QuestionDeduplicationService};
use clap::{Args, Subcommand};

/// Question bank management
#[derive(Args, Debug)]
pub struct BankCommand {
    #[command(subcommand)]
    pub action: BankAction,
}

#[derive(Subcommand, Debug)]
pub enum BankAction {
    /// Index the corpus directory (skipped if the bank already has data)
    Load(BankLoadCommand),
    /// Show collection and duplicate-detector status
    Status(BankStatusCommand),
}

/// Load the corpus into the bank
///
/// The corpus directory comes from the global `--data-dir` flag or the config.
#[derive(Args, Debug)]
pub struct BankLoadCommand {
    /// Clear the collection and reindex everything
    #[arg(long)]
    pub force: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BankLoadCommand {
    pub async fn execute(&self, config: &AppConfig, dedup: &QuestionDeduplicationService) -> AppResult<()> {
        let data_dir = config.resolved_data_dir();
        tracing::info!("Executing bank load from {:?} (force: {})", data_dir, self.force);

        let loader = CorpusLoader::new(dedup.retrieval().clone());
        let report = loader.try_load_all(&data_dir, self.force).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else if report.skipped_existing {
            println!("Bank already has data; use --force to reindex");
        } else {
            println!(
                "Indexed {} questions from {} files ({} read, {} duplicates removed)",
                report.indexed, report.files, report.documents, report.duplicates_removed
            );
        }

        Ok(())
    }
}

/// Show bank status
#[derive(Args, Debug)]
pub struct BankStatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BankStatusCommand {
    pub async fn execute(&self, dedup: &QuestionDeduplicationService) -> AppResult<()> {
        tracing::info!("Executing bank status command");

        let info = dedup.retrieval().collection_info().await;
        let stats = dedup.stats();

        if self.json {
            let output = serde_json::json!({
                "collection": info,
                "dedup": stats,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Collection: {}", info.name);
            println!("  Status: {}", info.status);
            println!("  Points: {}", info.points_count);
            println!("  Model: {} ({} dimensions)", info.model, info.embedding_dimension);
            if let Some(error) = &info.error {
                println!("  Error: {}", error);
            }
            println!("Similarity threshold: {}", stats.similarity_threshold);
            println!("Index connected: {}", stats.index_connected);
        }

        Ok(())
    }
}

impl BankCommand {
    pub async fn execute(&self, config: &AppConfig, dedup: &QuestionDeduplicationService) -> AppResult<()> {
        match &self.action {
            BankAction::Load(cmd) => cmd.execute(config, dedup).await,
            BankAction::Status(cmd) => cmd.execute(dedup).await,
        }
    }
}
