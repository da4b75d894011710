//! Check-and-store command handlers.
//!
//! Run generated questions through the duplicate detector, storing the new ones.

use aptwise_core::{AppError, AppResult};
use aptwise_knowledge::{
    summarize, BatchItem, CheckResult, QuestionDeduplicationService, QuestionMetadata,
};
use chrono::Utc;
use clap::Args;
use std::path::PathBuf;

/// Check a question for duplicates and store it if new
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Question text
    pub question: String,

    /// Reference answer
    #[arg(short, long, default_value = "")]
    pub answer: String,

    /// Skill or topic the question was generated for
    #[arg(long)]
    pub skill: Option<String>,

    /// User the question was generated for
    #[arg(long)]
    pub user: Option<String>,

    /// Interview session identifier
    #[arg(long)]
    pub session: Option<String>,

    /// Store even if a similar question exists
    #[arg(long)]
    pub force: bool,

    /// Similarity threshold for this run, in [0, 1]
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CheckCommand {
    pub async fn execute(&self, dedup: &QuestionDeduplicationService) -> AppResult<()> {
        tracing::info!("Executing check command (force: {})", self.force);

        if let Some(threshold) = self.threshold {
            if !dedup.set_similarity_threshold(threshold) {
                return Err(AppError::InvalidInput(format!(
                    "threshold must be between 0.0 and 1.0, got {}",
                    threshold
                )));
            }
        }

        let metadata = QuestionMetadata {
            skill_context: self.skill.clone(),
            user_id: self.user.clone(),
            interview_session: self.session.clone(),
            timestamp: Some(Utc::now()),
        };

        let result = dedup
            .check_and_store(&self.question, &self.answer, metadata, self.force)
            .await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_result(&result);
        }

        Ok(())
    }
}

/// Check a JSON file of questions in order
#[derive(Args, Debug)]
pub struct CheckBatchCommand {
    /// JSON array of {question, answer, metadata} objects
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CheckBatchCommand {
    pub async fn execute(&self, dedup: &QuestionDeduplicationService) -> AppResult<()> {
        tracing::info!("Executing check-batch command for {:?}", self.file);

        let content = std::fs::read_to_string(&self.file)?;
        let items: Vec<BatchItem> = serde_json::from_str(&content)?;

        let results = dedup.batch_check_and_store(&items).await;
        let summary = summarize(&results);

        if self.json {
            let output = serde_json::json!({
                "results": results,
                "summary": summary,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            for result in &results {
                print!("#{} ", result.batch_index.unwrap_or_default());
                print_result(result);
            }
            println!(
                "{} questions: {} stored, {} skipped, {} failed, {} errors",
                summary.total, summary.stored, summary.skipped, summary.failed, summary.errors
            );
        }

        Ok(())
    }
}

fn print_result(result: &CheckResult) {
    println!("{}: {}", result.action_taken, result.question);
    if let Some(similar) = &result.similar_question {
        println!("  similar ({:.3}): {}", result.similarity_score, similar);
    }
    if let Some(error) = &result.error {
        println!("  error: {}", error);
    }
}
