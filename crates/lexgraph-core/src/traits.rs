//! Repository and collaborator traits.
//!
//! The task store, queue, and relational stores are injected dependencies
//! behind these traits; `lexgraph-db` provides the PostgreSQL
//! implementations.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::{
    Case, CaseStatus, DocumentText, NewEntity, QueueEntry, Task, TaskStats, TaskStatus, TaskType,
};
use crate::Result;

/// Task store plus delivery log, sharing one durable backend.
///
/// Creation is atomic across both: a created task always has a corresponding
/// queue entry. Delivery is at-least-once; stage logic must tolerate
/// redelivery of an unacknowledged entry.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Create a new `pending` task and append its queue entry in one
    /// transaction, then wake blocked claimers.
    async fn create(&self, task_type: TaskType, user_id: Uuid, case_id: Uuid) -> Result<Task>;

    /// Get a task by id.
    async fn get(&self, task_id: Uuid) -> Result<Option<Task>>;

    /// Update task status and progress; `result`/`error` are only meaningful
    /// alongside a terminal status.
    ///
    /// An unknown task id is logged and swallowed — a stale or expired task
    /// update must never crash the caller.
    async fn update_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
        progress: i32,
        result: Option<JsonValue>,
        error: Option<&str>,
    ) -> Result<()>;

    /// List a user's tasks, newest first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<TaskStatus>,
        task_type: Option<TaskType>,
        limit: i64,
    ) -> Result<Vec<Task>>;

    /// Retry a failed task by creating a brand-new task (new id) with
    /// `retry_count` incremented, plus its own queue entry.
    ///
    /// Refuses with `InvalidInput` for non-failed tasks and with
    /// `RetryExhausted` once the ceiling is reached.
    async fn retry(&self, task_id: Uuid) -> Result<Task>;

    /// Claim the next deliverable queue entry for `consumer`, blocking up to
    /// `max_wait`. Entries claimed by a crashed consumer become deliverable
    /// again after the redelivery timeout.
    async fn claim_entry(&self, consumer: &str, max_wait: Duration)
        -> Result<Option<QueueEntry>>;

    /// Acknowledge a delivered entry. Called exactly once per processed
    /// entry, success or failure; retries are new entries, never redelivery.
    async fn ack_entry(&self, entry_id: i64) -> Result<()>;

    /// Number of entries not yet acknowledged.
    async fn pending_entry_count(&self) -> Result<i64>;

    /// Task store statistics.
    async fn stats(&self) -> Result<TaskStats>;

    /// Purge tasks past the retention window and acked stream entries of the
    /// same age. Returns the number of rows deleted.
    async fn purge_expired(&self) -> Result<u64>;
}

/// Case store consumed by the pipeline (owned by the CRUD layer).
#[async_trait]
pub trait CaseRepository: Send + Sync {
    /// Get a case by id.
    async fn get(&self, case_id: Uuid) -> Result<Option<Case>>;

    /// Get several cases by id.
    async fn get_many(&self, case_ids: &[Uuid]) -> Result<Vec<Case>>;

    /// Persist extracted text and advance the case status in one update.
    async fn set_extracted_text(
        &self,
        case_id: Uuid,
        raw_text: &str,
        status: CaseStatus,
    ) -> Result<()>;

    /// Set the case status.
    async fn set_status(&self, case_id: Uuid, status: CaseStatus) -> Result<()>;
}

/// Entity store written by the pipeline and read by the network builder.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Upsert entity rows keyed by `(case_id, identity, entity_type)` so the
    /// stage is safe to re-run on redelivery. Returns the number of rows
    /// written.
    async fn upsert_many(&self, entities: &[NewEntity]) -> Result<u64>;

    /// Delete all entities of a case (explicit-reprocess flow).
    async fn delete_for_case(&self, case_id: Uuid) -> Result<u64>;
}

/// Text extraction collaborator: document file reference in, full text and
/// per-page text out.
///
/// Implementations must distinguish "file not found" (`Error::NotFound`)
/// from "extraction produced no text" (`Error::Extraction`).
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from the document at `file_path`.
    async fn extract(&self, file_path: &str) -> Result<DocumentText>;

    /// Check whether the extraction backend is usable.
    async fn health_check(&self) -> Result<bool>;

    /// Short backend name for logging.
    fn name(&self) -> &str;
}
