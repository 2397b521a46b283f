//! Entity extraction stage handler.
//!
//! Loads the case, verifies ownership, runs NER over the extracted text,
//! deduplicates mentions by `(lowercased name, type)` keeping the
//! highest-confidence instance, and upserts the surviving rows. Persistence
//! is idempotent, so a redelivered entry re-running this stage cannot
//! duplicate entities.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::{error, info};

use lexgraph_core::{
    Case, CaseRepository, CaseStatus, EntityRepository, Error, NewEntity, Result, TaskType,
};
use lexgraph_db::Database;
use lexgraph_extract::{dedupe_entities, EntityRecognizer};

use crate::handler::{TaskContext, TaskHandler, TaskOutcome};

pub struct EntityExtractionHandler {
    db: Database,
    recognizer: Arc<dyn EntityRecognizer>,
}

impl EntityExtractionHandler {
    pub fn new(db: Database, recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self { db, recognizer }
    }

    async fn run(&self, ctx: &TaskContext, case: &Case) -> Result<JsonValue> {
        if case.uploaded_by != ctx.entry.user_id {
            return Err(Error::Unauthorized(
                "task user does not own this case".to_string(),
            ));
        }

        let raw_text = case
            .raw_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                Error::InvalidInput("no text to extract entities from".to_string())
            })?;

        ctx.report_progress(10).await;

        info!(
            subsystem = "jobs",
            component = "entity_extraction",
            case_id = %case.case_id,
            model = self.recognizer.model_name(),
            "Extracting entities"
        );
        let mentions = self.recognizer.extract(raw_text, 1).await?;
        let deduped = dedupe_entities(mentions);

        ctx.report_progress(50).await;

        let rows: Vec<NewEntity> = deduped
            .iter()
            .map(|mention| NewEntity {
                case_id: case.case_id,
                owner_user_id: case.uploaded_by,
                entity_type: mention.entity_type,
                entity_name: mention.name.clone(),
                normalized_name: mention.name.to_lowercase(),
                confidence: mention.confidence,
                page_number: mention.page_number,
            })
            .collect();
        let persisted = self.db.entities.upsert_many(&rows).await?;

        ctx.report_progress(80).await;

        self.db
            .cases
            .set_status(case.case_id, CaseStatus::Complete)
            .await?;

        info!(
            subsystem = "jobs",
            component = "entity_extraction",
            case_id = %case.case_id,
            entity_count = persisted,
            "Entity extraction complete"
        );

        Ok(json!({ "entities_extracted": persisted }))
    }
}

#[async_trait]
impl TaskHandler for EntityExtractionHandler {
    fn task_type(&self) -> TaskType {
        TaskType::EntityExtraction
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
                // Dual update, minus the authorization exception — a forged
                // task never touches the owner's case.
                if !matches!(e, Error::Unauthorized(_)) {
                    if let Err(mark) = self
                        .db
                        .cases
                        .set_status(case.case_id, CaseStatus::Failed)
                        .await
                    {
                        error!(
                            subsystem = "jobs",
                            component = "entity_extraction",
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
