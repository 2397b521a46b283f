//! Task handlers for each pipeline stage.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::warn;

use lexgraph_core::{QueueEntry, TaskRepository, TaskStatus, TaskType};
use lexgraph_db::Database;

use crate::worker::WorkerEvent;

/// Context provided to task handlers for one claimed entry.
pub struct TaskContext {
    /// The claimed queue entry being processed.
    pub entry: QueueEntry,
    /// Write-through target for progress checkpoints.
    db: Option<Database>,
    /// Event sink for worker observers.
    event_tx: Option<broadcast::Sender<WorkerEvent>>,
}

impl TaskContext {
    /// Create a new task context.
    pub fn new(entry: QueueEntry) -> Self {
        Self {
            entry,
            db: None,
            event_tx: None,
        }
    }

    /// Attach the task store for progress write-through.
    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    /// Attach the worker event sender.
    pub fn with_event_sender(mut self, tx: broadcast::Sender<WorkerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Report a progress checkpoint.
    ///
    /// Writes through to the task store in call order, so progress stays
    /// monotonic within one execution attempt. A failed store update is
    /// logged and swallowed — it must never abort the stage.
    pub async fn report_progress(&self, percent: i32) {
        if let Some(db) = &self.db {
            if let Err(e) = db
                .tasks
                .update_status(
                    self.entry.task_id,
                    TaskStatus::InProgress,
                    percent,
                    None,
                    None,
                )
                .await
            {
                warn!(
                    subsystem = "jobs",
                    component = "handler",
                    op = "report_progress",
                    task_id = %self.entry.task_id,
                    percent,
                    error = %e,
                    "Failed to persist progress update"
                );
            }
        }
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(WorkerEvent::TaskProgress {
                task_id: self.entry.task_id,
                percent,
            });
        }
    }
}

/// Result of stage execution.
#[derive(Debug)]
pub enum TaskOutcome {
    /// Stage completed; the payload becomes the task's `result`.
    Success(JsonValue),
    /// Stage failed; the message becomes the task's `error`.
    Failed(String),
}

/// Trait for pipeline stage handlers.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The task type this handler processes.
    fn task_type(&self) -> TaskType;

    /// Execute the stage. All failures are reported through the returned
    /// outcome; a handler never panics the worker loop.
    async fn execute(&self, ctx: TaskContext) -> TaskOutcome;

    /// Check if this handler can process the given task type.
    fn can_handle(&self, task_type: TaskType) -> bool {
        self.task_type() == task_type
    }
}

/// No-op handler for testing.
pub struct NoOpHandler {
    task_type: TaskType,
}

impl NoOpHandler {
    /// Create a new no-op handler for the given task type.
    pub fn new(task_type: TaskType) -> Self {
        Self { task_type }
    }
}

#[async_trait]
impl TaskHandler for NoOpHandler {
    fn task_type(&self) -> TaskType {
        self.task_type
    }

    async fn execute(&self, ctx: TaskContext) -> TaskOutcome {
        ctx.report_progress(50).await;
        ctx.report_progress(100).await;
        TaskOutcome::Success(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(task_type: TaskType) -> QueueEntry {
        QueueEntry {
            entry_id: 1,
            task_id: Uuid::new_v4(),
            task_type,
            user_id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            appended_at: Utc::now(),
        }
    }

    #[test]
    fn test_noop_handler_task_type() {
        let handler = NoOpHandler::new(TaskType::TextExtraction);
        assert_eq!(handler.task_type(), TaskType::TextExtraction);
    }

    #[test]
    fn test_noop_handler_can_handle() {
        let handler = NoOpHandler::new(TaskType::TextExtraction);
        assert!(handler.can_handle(TaskType::TextExtraction));
        assert!(!handler.can_handle(TaskType::EntityExtraction));
    }

    #[tokio::test]
    async fn test_noop_handler_succeeds() {
        let handler = NoOpHandler::new(TaskType::EntityExtraction);
        let ctx = TaskContext::new(entry(TaskType::EntityExtraction));
        let outcome = handler.execute(ctx).await;
        assert!(matches!(outcome, TaskOutcome::Success(JsonValue::Null)));
    }

    #[tokio::test]
    async fn test_context_progress_events() {
        let (tx, mut rx) = broadcast::channel(8);
        let e = entry(TaskType::TextExtraction);
        let task_id = e.task_id;
        let ctx = TaskContext::new(e).with_event_sender(tx);

        ctx.report_progress(10).await;
        ctx.report_progress(70).await;

        match rx.try_recv().unwrap() {
            WorkerEvent::TaskProgress {
                task_id: id,
                percent,
            } => {
                assert_eq!(id, task_id);
                assert_eq!(percent, 10);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.try_recv().unwrap() {
            WorkerEvent::TaskProgress { percent, .. } => assert_eq!(percent, 70),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_context_progress_without_sinks_is_noop() {
        let ctx = TaskContext::new(entry(TaskType::TextExtraction));
        // Should not panic with neither store nor event sink attached.
        ctx.report_progress(50).await;
    }
}
