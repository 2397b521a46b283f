//! Text extraction stage handler.
//!
//! Loads the case, verifies ownership against the task's user (a forged or
//! stale task must fail loudly, not skip silently), runs the extraction
//! collaborator, persists the text, and chains the entity extraction stage
//! as its own unit of work so a crash between stages is recoverable by
//! re-triggering either stage independently.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::{error, info};

use lexgraph_core::{
    Case, CaseRepository, CaseStatus, Error, Result, TaskRepository, TaskType, TextExtractor,
};
use lexgraph_db::Database;

use crate::handler::{TaskContext, TaskHandler, TaskOutcome};

pub struct TextExtractionHandler {
    db: Database,
    extractor: Arc<dyn TextExtractor>,
}

impl TextExtractionHandler {
    pub fn new(db: Database, extractor: Arc<dyn TextExtractor>) -> Self {
        Self { db, extractor }
    }

    async fn run(&self, ctx: &TaskContext, case: &Case) -> Result<JsonValue> {
        if case.uploaded_by != ctx.entry.user_id {
            return Err(Error::Unauthorized(
                "task user does not own this case".to_string(),
            ));
        }

        let file_path = case
            .file_path
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("no file path for case".to_string()))?;

        ctx.report_progress(10).await;

        info!(
            subsystem = "jobs",
            component = "text_extraction",
            case_id = %case.case_id,
            path = file_path,
            extractor = self.extractor.name(),
            "Extracting text"
        );
        let document = self.extractor.extract(file_path).await?;

        ctx.report_progress(50).await;

        self.db
            .cases
            .set_extracted_text(case.case_id, &document.full_text, CaseStatus::OcrComplete)
            .await?;

        ctx.report_progress(70).await;

        // Chain the follow-on stage as a separate task.
        let next = self
            .db
            .tasks
            .create(TaskType::EntityExtraction, ctx.entry.user_id, case.case_id)
            .await?;

        info!(
            subsystem = "jobs",
            component = "text_extraction",
            case_id = %case.case_id,
            page_count = document.pages.len(),
            next_task_id = %next.id,
            "Text extraction complete, queued entity extraction"
        );

        Ok(json!({
            "pages": document.pages.len(),
            "characters": document.full_text.len(),
            "next_task_id": next.id,
        }))
    }
}

#[async_trait]
impl TaskHandler for TextExtractionHandler {
    fn task_type(&self) -> TaskType {
        TaskType::TextExtraction
    }

    async fn execute(&self, ctx: TaskContext) -> TaskOutcome {
        let case = match self.db.cases.get(ctx.entry.case_id).await {
            Ok(Some(case)) => case,
            Ok(None) => {
                return TaskOutcome::Failed(Error::CaseNotFound(ctx.entry.case_id).to_string())
            }
            Err(e) => return TaskOutcome::Failed(e.to_string()),
        };

        match self.run(&ctx, &case).await {
            Ok(result) => TaskOutcome::Success(result),
            Err(e) => {
                // Dual update so the UI sees the failure on the case without
                // polling task state. Authorization failures are the
                // exception: a forged task must not touch the owner's case.
                if !matches!(e, Error::Unauthorized(_)) {
                    if let Err(mark) = self
                        .db
                        .cases
                        .set_status(case.case_id, CaseStatus::Failed)
                        .await
                    {
                        error!(
                            subsystem = "jobs",
                            component = "text_extraction",
                            case_id = %case.case_id,
                            error = %mark,
                            "Failed to mark case as failed"
                        );
                    }
                }
                TaskOutcome::Failed(e.to_string())
            }
        }
    }
}
