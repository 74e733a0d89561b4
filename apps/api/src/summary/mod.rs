//! AI summary generator, the batch job that fills `thesis.ai_summary`.
//!
//! Each pending paper is analysed, validated through `parse::parse_ai_summary`
//! and saved on its own, so progress survives a crash mid-run. A paper whose
//! reply is unusable keeps a NULL summary and is picked up again next run.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, SUMMARY_TEMPERATURE};
use crate::llm_client::{ChatModel, LlmError};
use crate::models::paper::PendingPaper;
use crate::store::SummaryStore;

pub mod archive;
pub mod parse;
pub mod prompts;

use archive::SummaryArchive;
use parse::{parse_ai_summary, MalformedSummary};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Error)]
enum SummaryFailure {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("malformed LLM output: {0}")]
    Malformed(#[from] MalformedSummary),

    #[error("could not save summary: {0}")]
    Store(#[from] AppError),
}

pub struct SummaryGenerator {
    store: Arc<dyn SummaryStore>,
    model: Arc<dyn ChatModel>,
    archive: Option<Arc<dyn SummaryArchive>>,
}

impl SummaryGenerator {
    pub fn new(
        store: Arc<dyn SummaryStore>,
        model: Arc<dyn ChatModel>,
        archive: Option<Arc<dyn SummaryArchive>>,
    ) -> Self {
        Self {
            store,
            model,
            archive,
        }
    }

    /// Processes every pending paper sequentially. Never fails; problems are
    /// logged and counted in the report.
    pub async fn run(&self) -> SummaryReport {
        let pending = match self.store.papers_pending_summary().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "could not load papers pending summary");
                return SummaryReport::default();
            }
        };

        let mut report = SummaryReport {
            total: pending.len(),
            ..SummaryReport::default()
        };
        info!(total = report.total, "AI summary run started");

        for (idx, paper) in pending.iter().enumerate() {
            info!(
                paper_id = paper.id,
                arxiv_id = %paper.arxiv_id,
                "summarizing ({}/{})",
                idx + 1,
                report.total
            );
            match self.summarize(paper).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    warn!(paper_id = paper.id, arxiv_id = %paper.arxiv_id, error = %e, "skipping paper");
                    report.failed += 1;
                }
            }
        }

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "AI summary run finished"
        );
        report
    }

    async fn summarize(&self, paper: &PendingPaper) -> Result<(), SummaryFailure> {
        let prompt = prompts::build_summary_prompt(&paper.summary);
        let reply = self
            .model
            .complete(JSON_ONLY_SYSTEM, &prompt, SUMMARY_TEMPERATURE)
            .await?;

        let summary = parse_ai_summary(&reply)?;
        self.store.save_ai_summary(paper.id, &summary).await?;

        if let Some(archive) = &self.archive {
            if let Err(e) = archive.archive(&paper.arxiv_id, &summary).await {
                warn!(paper_id = paper.id, error = %e, "summary saved but archiving failed");
            }
        }

        Ok(())
    }
}
