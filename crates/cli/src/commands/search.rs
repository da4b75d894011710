//! Search command handler.

use aptwise_core::AppResult;
use aptwise_knowledge::VectorRetrievalService;
use clap::Args;

/// Find the questions most similar to a text
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Number of results
    #[arg(short = 'k', long, default_value = "5")]
    pub top_k: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, retrieval: &VectorRetrievalService) -> AppResult<()> {
        tracing::info!("Executing search command (k={})", self.top_k);

        let hits = retrieval.search(&self.query, self.top_k).await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&hits)?);
            return Ok(());
        }

        if hits.is_empty() {
            println!("No similar questions found");
        }
        for hit in &hits {
            println!("{}. [{:.3}] {}", hit.rank, hit.similarity, hit.question);
            if !hit.answer.is_empty() {
                println!("   {}", hit.answer);
            }
        }

        Ok(())
    }
}
