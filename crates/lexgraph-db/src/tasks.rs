//! Task repository: durable task store plus the append-only delivery stream.
//!
//! One PostgreSQL backend carries both tables so task creation and queue
//! publication commit in a single transaction — no task can exist without
//! its queue entry. Claiming uses `FOR UPDATE SKIP LOCKED` so any number of
//! consumers can share the stream without double-delivery, and a
//! `tokio::sync::Notify` wakes in-process claimers the moment an entry is
//! appended. Cross-process workers fall back to the bounded poll interval.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::warn;
use uuid::Uuid;

use lexgraph_core::defaults::{
    CLAIM_POLL_INTERVAL_MS, MAX_TASK_RETRIES, QUEUE_REDELIVERY_SECS, TASK_RETENTION_DAYS,
};
use lexgraph_core::{
    new_v7, Error, QueueEntry, Result, Task, TaskRepository, TaskStats, TaskStatus, TaskType,
};

/// PostgreSQL implementation of TaskRepository.
#[derive(Clone)]
pub struct PgTaskRepository {
    pool: Pool<Postgres>,
    /// Notify handle for event-driven claimer wake.
    notify: Arc<Notify>,
}

impl PgTaskRepository {
    /// Create a new PgTaskRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Convert TaskType to string for the database.
    fn task_type_to_str(task_type: TaskType) -> &'static str {
        task_type.as_str()
    }

    /// Convert string from the database to TaskType.
    fn str_to_task_type(s: &str) -> TaskType {
        match s {
            "text_extraction" => TaskType::TextExtraction,
            "entity_extraction" => TaskType::EntityExtraction,
            _ => TaskType::TextExtraction, // fallback
        }
    }

    /// Convert TaskStatus to string for the database.
    fn task_status_to_str(status: TaskStatus) -> &'static str {
        status.as_str()
    }

    /// Convert string from the database to TaskStatus.
    fn str_to_task_status(s: &str) -> TaskStatus {
        match s {
            "pending" => TaskStatus::Pending,
            "in_progress" => TaskStatus::InProgress,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::Pending, // fallback
        }
    }

    /// Parse a task row into a Task struct.
    fn parse_task_row(row: sqlx::postgres::PgRow) -> Task {
        Task {
            id: row.get("id"),
            task_type: Self::str_to_task_type(row.get("task_type")),
            owner_user_id: row.get("owner_user_id"),
            case_id: row.get("case_id"),
            status: Self::str_to_task_status(row.get("status")),
            progress: row.get("progress"),
            result: row.get("result"),
            error: row.get("error"),
            retry_count: row.get("retry_count"),
            created_at: row.get("created_at"),
            completed_at: row.get("completed_at"),
        }
    }

    /// Parse a stream row into a QueueEntry.
    fn parse_entry_row(row: sqlx::postgres::PgRow) -> QueueEntry {
        QueueEntry {
            entry_id: row.get("entry_id"),
            task_id: row.get("task_id"),
            task_type: Self::str_to_task_type(row.get("task_type")),
            user_id: row.get("user_id"),
            case_id: row.get("case_id"),
            appended_at: row.get("appended_at"),
        }
    }

    /// Insert a task row and its stream entry inside an open transaction.
    async fn insert_task_and_entry(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        task: &Task,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO tasks (id, task_type, owner_user_id, case_id, status, progress, retry_count, created_at)
             VALUES ($1, $2::task_type, $3, $4, 'pending'::task_status, 0, $5, $6)",
        )
        .bind(task.id)
        .bind(Self::task_type_to_str(task.task_type))
        .bind(task.owner_user_id)
        .bind(task.case_id)
        .bind(task.retry_count)
        .bind(task.created_at)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO task_stream (task_id, task_type, user_id, case_id, appended_at)
             VALUES ($1, $2::task_type, $3, $4, $5)",
        )
        .bind(task.id)
        .bind(Self::task_type_to_str(task.task_type))
        .bind(task.owner_user_id)
        .bind(task.case_id)
        .bind(task.created_at)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    /// Single non-blocking claim attempt.
    async fn try_claim(&self, consumer: &str) -> Result<Option<QueueEntry>> {
        let now = Utc::now();
        let redelivery_cutoff = now - chrono::Duration::seconds(QUEUE_REDELIVERY_SECS);

        let row = sqlx::query(
            "UPDATE task_stream
             SET claimed_by = $1, claimed_at = $2
             WHERE entry_id = (
                 SELECT entry_id FROM task_stream
                 WHERE acked_at IS NULL
                   AND (claimed_at IS NULL OR claimed_at < $3)
                 ORDER BY entry_id ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING entry_id, task_id, task_type::text, user_id, case_id, appended_at",
        )
        .bind(consumer)
        .bind(now)
        .bind(redelivery_cutoff)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_entry_row))
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn create(&self, task_type: TaskType, user_id: Uuid, case_id: Uuid) -> Result<Task> {
        let task = Task {
            id: new_v7(),
            task_type,
            owner_user_id: user_id,
            case_id,
            status: TaskStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            retry_count: 0,
            created_at: Utc::now(),
            completed_at: None,
        };

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        Self::insert_task_and_entry(&mut tx, &task).await?;
        tx.commit().await.map_err(Error::Database)?;

        self.notify.notify_waiters();
        Ok(task)
    }

    async fn get(&self, task_id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query(
            "SELECT id, task_type::text, owner_user_id, case_id, status::text, progress,
                    result, error, retry_count, created_at, completed_at
             FROM tasks WHERE id = $1",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_task_row))
    }

    async fn update_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
        progress: i32,
        result: Option<JsonValue>,
        error: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();

        let updated = sqlx::query(
            "UPDATE tasks
             SET status = $2::task_status,
                 progress = $3,
                 result = COALESCE($4, result),
                 error = COALESCE($5, error),
                 completed_at = CASE
                     WHEN $2::task_status IN ('completed', 'failed') THEN $6
                     ELSE completed_at
                 END
             WHERE id = $1",
        )
        .bind(task_id)
        .bind(Self::task_status_to_str(status))
        .bind(progress)
        .bind(&result)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        // A stale or expired task update must not crash the caller.
        if updated.rows_affected() == 0 {
            warn!(
                subsystem = "db",
                component = "tasks",
                op = "update_status",
                %task_id,
                status = status.as_str(),
                "Task not found for status update; ignoring"
            );
        }

        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<TaskStatus>,
        task_type: Option<TaskType>,
        limit: i64,
    ) -> Result<Vec<Task>> {
        let mut conditions = vec!["owner_user_id = $1".to_string()];
        let mut param_idx = 2;

        if status.is_some() {
            conditions.push(format!("status::text = ${}", param_idx));
            param_idx += 1;
        }
        if task_type.is_some() {
            conditions.push(format!("task_type::text = ${}", param_idx));
            param_idx += 1;
        }

        let query = format!(
            "SELECT id, task_type::text, owner_user_id, case_id, status::text, progress,
                    result, error, retry_count, created_at, completed_at
             FROM tasks
             WHERE {}
             ORDER BY created_at DESC
             LIMIT ${}",
            conditions.join(" AND "),
            param_idx
        );

        let mut q = sqlx::query(&query).bind(user_id);
        if let Some(s) = status {
            q = q.bind(Self::task_status_to_str(s));
        }
        if let Some(t) = task_type {
            q = q.bind(Self::task_type_to_str(t));
        }
        q = q.bind(limit);

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_task_row).collect())
    }

    async fn retry(&self, task_id: Uuid) -> Result<Task> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Lock the source row so concurrent retries of the same task cannot
        // both pass the ceiling check.
        let row = sqlx::query(
            "SELECT id, task_type::text, owner_user_id, case_id, status::text, progress,
                    result, error, retry_count, created_at, completed_at
             FROM tasks WHERE id = $1
             FOR UPDATE",
        )
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let source = match row {
            Some(row) => Self::parse_task_row(row),
            None => return Err(Error::TaskNotFound(task_id)),
        };

        if source.status != TaskStatus::Failed {
            return Err(Error::InvalidInput(format!(
                "only failed tasks can be retried (task {} is {})",
                task_id,
                source.status.as_str()
            )));
        }

        if source.retry_count >= MAX_TASK_RETRIES {
            return Err(Error::RetryExhausted {
                task_id,
                retry_count: source.retry_count,
            });
        }

        let replacement = Task {
            id: new_v7(),
            task_type: source.task_type,
            owner_user_id: source.owner_user_id,
            case_id: source.case_id,
            status: TaskStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            retry_count: source.retry_count + 1,
            created_at: Utc::now(),
            completed_at: None,
        };

        Self::insert_task_and_entry(&mut tx, &replacement).await?;
        tx.commit().await.map_err(Error::Database)?;

        self.notify.notify_waiters();
        Ok(replacement)
    }

    async fn claim_entry(
        &self,
        consumer: &str,
        max_wait: Duration,
    ) -> Result<Option<QueueEntry>> {
        let deadline = Instant::now() + max_wait;

        loop {
            if let Some(entry) = self.try_claim(consumer).await? {
                return Ok(Some(entry));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            // Wake on in-process append, or re-poll on the interval for
            // entries appended by other processes.
            let remaining = deadline - now;
            let wait = remaining.min(Duration::from_millis(CLAIM_POLL_INTERVAL_MS));
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = sleep(wait) => {}
            }
        }
    }

    async fn ack_entry(&self, entry_id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE task_stream SET acked_at = $1 WHERE entry_id = $2 AND acked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(entry_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            warn!(
                subsystem = "db",
                component = "task_stream",
                op = "ack_entry",
                entry_id,
                "Entry already acknowledged or unknown"
            );
        }

        Ok(())
    }

    async fn pending_entry_count(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM task_stream WHERE acked_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count)
    }

    async fn stats(&self) -> Result<TaskStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'in_progress') as in_progress,
                COUNT(*) FILTER (WHERE status = 'completed' AND completed_at > NOW() - INTERVAL '1 hour') as completed_last_hour,
                COUNT(*) FILTER (WHERE status = 'failed' AND completed_at > NOW() - INTERVAL '1 hour') as failed_last_hour,
                COUNT(*) as total
             FROM tasks",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(TaskStats {
            pending: row.get::<i64, _>("pending"),
            in_progress: row.get::<i64, _>("in_progress"),
            completed_last_hour: row.get::<i64, _>("completed_last_hour"),
            failed_last_hour: row.get::<i64, _>("failed_last_hour"),
            total: row.get::<i64, _>("total"),
        })
    }

    async fn purge_expired(&self) -> Result<u64> {
        let tasks = sqlx::query(&format!(
            "DELETE FROM tasks WHERE created_at < NOW() - INTERVAL '{} days'",
            TASK_RETENTION_DAYS
        ))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        let entries = sqlx::query(&format!(
            "DELETE FROM task_stream
             WHERE acked_at IS NOT NULL
               AND appended_at < NOW() - INTERVAL '{} days'",
            TASK_RETENTION_DAYS
        ))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(tasks.rows_affected() + entries.rows_affected())
    }
}
