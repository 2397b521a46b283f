//! Task worker: the claim → execute → acknowledge loop.
//!
//! Each worker runs a blocking loop against the shared delivery stream: it
//! claims one entry (bounded wait), marks the task in progress, dispatches
//! the stage handler for the entry's task type, records the terminal
//! status, and acknowledges the entry unconditionally so a bad task can
//! never block the stream. Any number of workers may run against the same
//! stream; claim semantics guarantee single ownership per entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use lexgraph_core::defaults::{CLAIM_BLOCK_MS, EVENT_BUS_CAPACITY, TASK_TIMEOUT_SECS};
use lexgraph_core::{QueueEntry, Result, TaskRepository, TaskStatus, TaskType};
use lexgraph_db::Database;

use crate::handler::{TaskContext, TaskHandler, TaskOutcome};

/// Configuration for the task worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Consumer name recorded on claimed entries.
    pub consumer_name: String,
    /// How long one claim call blocks waiting for an entry, in milliseconds.
    pub claim_block_ms: u64,
    /// Hard ceiling on a single stage execution, in seconds.
    pub task_timeout_secs: u64,
    /// Whether to enable task processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            consumer_name: "worker-1".to_string(),
            claim_block_ms: CLAIM_BLOCK_MS,
            task_timeout_secs: TASK_TIMEOUT_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_ENABLED` | `true` | Enable/disable task processing |
    /// | `WORKER_CONSUMER_NAME` | `worker-1` | Consumer name in the stream |
    /// | `WORKER_CLAIM_BLOCK_MS` | `5000` | Bounded claim wait |
    /// | `WORKER_TASK_TIMEOUT_SECS` | `600` | Per-stage execution ceiling |
    pub fn from_env() -> Self {
        let enabled = std::env::var("WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let consumer_name =
            std::env::var("WORKER_CONSUMER_NAME").unwrap_or_else(|_| "worker-1".to_string());

        let claim_block_ms = std::env::var("WORKER_CLAIM_BLOCK_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(CLAIM_BLOCK_MS);

        let task_timeout_secs = std::env::var("WORKER_TASK_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(TASK_TIMEOUT_SECS);

        Self {
            consumer_name,
            claim_block_ms,
            task_timeout_secs,
            enabled,
        }
    }

    /// Set the consumer name.
    pub fn with_consumer_name(mut self, name: impl Into<String>) -> Self {
        self.consumer_name = name.into();
        self
    }

    /// Set the bounded claim wait.
    pub fn with_claim_block(mut self, ms: u64) -> Self {
        self.claim_block_ms = ms;
        self
    }

    /// Set the per-stage execution ceiling.
    pub fn with_task_timeout(mut self, secs: u64) -> Self {
        self.task_timeout_secs = secs;
        self
    }

    /// Enable or disable task processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the task worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A task was claimed and started.
    TaskStarted { task_id: Uuid, task_type: TaskType },
    /// Task progress checkpoint.
    TaskProgress { task_id: Uuid, percent: i32 },
    /// A task completed successfully.
    TaskCompleted { task_id: Uuid, task_type: TaskType },
    /// A task failed.
    TaskFailed {
        task_id: Uuid,
        task_type: TaskType,
        error: String,
    },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx.send(()).await.map_err(|_| {
            lexgraph_core::Error::Internal("Failed to send shutdown signal".into())
        })?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Task worker that processes entries from the delivery stream.
pub struct TaskWorker {
    db: Database,
    config: WorkerConfig,
    handlers: Arc<RwLock<HashMap<TaskType, Arc<dyn TaskHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl TaskWorker {
    /// Create a new task worker.
    pub fn new(db: Database, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            db,
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        }
    }

    /// Register a handler for a task type.
    pub async fn register_handler<H: TaskHandler + 'static>(&self, handler: H) {
        let task_type = handler.task_type();
        let mut handlers = self.handlers.write().await;
        handlers.insert(task_type, Arc::new(handler));
        debug!(?task_type, "Registered task handler");
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Get the unacknowledged entry count.
    pub async fn pending_count(&self) -> Result<i64> {
        self.db.tasks.pending_entry_count().await
    }

    /// Run the blocking claim-execute-acknowledge loop.
    ///
    /// The claim wait is bounded, so the loop re-checks the shutdown signal
    /// at least once per `claim_block_ms` even when the stream is idle.
    #[instrument(skip(self, shutdown_rx), fields(consumer = %self.config.consumer_name))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Task worker is disabled, not starting");
            return;
        }

        info!(
            claim_block_ms = self.config.claim_block_ms,
            task_timeout_secs = self.config.task_timeout_secs,
            "Task worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let claim_wait = Duration::from_millis(self.config.claim_block_ms);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Task worker received shutdown signal");
                break;
            }

            match self
                .db
                .tasks
                .claim_entry(&self.config.consumer_name, claim_wait)
                .await
            {
                Ok(Some(entry)) => self.execute_entry(entry).await,
                Ok(None) => {
                    // Bounded wait elapsed with nothing to do; loop to
                    // re-check shutdown.
                }
                Err(e) => {
                    error!(error = %e, "Failed to claim from the task stream");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Task worker stopped");
    }

    /// Execute a single claimed entry.
    async fn execute_entry(&self, entry: QueueEntry) {
        let start = Instant::now();
        let task_id = entry.task_id;
        let task_type = entry.task_type;

        info!(%task_id, ?task_type, entry_id = entry.entry_id, "Processing task");
        let _ = self
            .event_tx
            .send(WorkerEvent::TaskStarted { task_id, task_type });

        // The claiming worker owns the task lifecycle from here on.
        if let Err(e) = self
            .db
            .tasks
            .update_status(task_id, TaskStatus::InProgress, 0, None, None)
            .await
        {
            error!(error = %e, %task_id, "Failed to mark task in progress");
        }

        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&task_type).cloned()
        };

        let outcome = match handler {
            Some(handler) => {
                let ctx = TaskContext::new(entry.clone())
                    .with_database(self.db.clone())
                    .with_event_sender(self.event_tx.clone());

                let task_timeout = Duration::from_secs(self.config.task_timeout_secs);
                match tokio::time::timeout(task_timeout, handler.execute(ctx)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(
                            %task_id,
                            ?task_type,
                            "Task exceeded timeout of {}s",
                            self.config.task_timeout_secs
                        );
                        TaskOutcome::Failed(format!(
                            "Task exceeded timeout of {}s",
                            self.config.task_timeout_secs
                        ))
                    }
                }
            }
            None => {
                warn!(?task_type, "No handler registered for task type");
                TaskOutcome::Failed(format!("No handler for task type: {}", task_type))
            }
        };

        match outcome {
            TaskOutcome::Success(result) => {
                if let Err(e) = self
                    .db
                    .tasks
                    .update_status(task_id, TaskStatus::Completed, 100, Some(result), None)
                    .await
                {
                    error!(error = %e, %task_id, "Failed to mark task as completed");
                } else {
                    info!(
                        %task_id,
                        ?task_type,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Task completed successfully"
                    );
                    let _ = self
                        .event_tx
                        .send(WorkerEvent::TaskCompleted { task_id, task_type });
                }
            }
            TaskOutcome::Failed(error) => {
                if let Err(e) = self
                    .db
                    .tasks
                    .update_status(task_id, TaskStatus::Failed, 0, None, Some(&error))
                    .await
                {
                    error!(error = %e, %task_id, "Failed to mark task as failed");
                } else {
                    warn!(
                        %task_id,
                        ?task_type,
                        %error,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Task failed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::TaskFailed {
                        task_id,
                        task_type,
                        error,
                    });
                }
            }
        }

        // Acknowledge unconditionally, success or failure, so a single bad
        // task cannot block the stream. Retries are new entries.
        if let Err(e) = self.db.tasks.ack_entry(entry.entry_id).await {
            error!(error = %e, entry_id = entry.entry_id, "Failed to acknowledge entry");
        }
    }
}

/// Builder for creating a task worker with handlers.
pub struct WorkerBuilder {
    db: Database,
    config: WorkerConfig,
    handlers: Vec<Box<dyn TaskHandler>>,
}

impl WorkerBuilder {
    /// Create a new worker builder.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            config: WorkerConfig::default(),
            handlers: Vec::new(),
        }
    }

    /// Set the worker configuration.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a handler.
    pub fn with_handler<H: TaskHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Build and return the worker.
    pub async fn build(self) -> TaskWorker {
        let worker = TaskWorker::new(self.db, self.config);

        for handler in self.handlers {
            let task_type = handler.task_type();
            let mut handlers = worker.handlers.write().await;
            handlers.insert(task_type, Arc::from(handler));
        }

        worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.consumer_name, "worker-1");
        assert_eq!(config.claim_block_ms, CLAIM_BLOCK_MS);
        assert_eq!(config.task_timeout_secs, TASK_TIMEOUT_SECS);
        assert!(config.enabled);
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::default()
            .with_consumer_name("worker-7")
            .with_claim_block(1000)
            .with_task_timeout(30)
            .with_enabled(false);

        assert_eq!(config.consumer_name, "worker-7");
        assert_eq!(config.claim_block_ms, 1000);
        assert_eq!(config.task_timeout_secs, 30);
        assert!(!config.enabled);
    }

    #[test]
    fn test_worker_config_chaining_order_independence() {
        let a = WorkerConfig::default()
            .with_enabled(false)
            .with_claim_block(3000);
        let b = WorkerConfig::default()
            .with_claim_block(3000)
            .with_enabled(false);

        assert_eq!(a.claim_block_ms, b.claim_block_ms);
        assert_eq!(a.enabled, b.enabled);
    }

    #[test]
    fn test_worker_event_task_started() {
        let task_id = Uuid::new_v4();
        let event = WorkerEvent::TaskStarted {
            task_id,
            task_type: TaskType::TextExtraction,
        };

        match event {
            WorkerEvent::TaskStarted {
                task_id: id,
                task_type,
            } => {
                assert_eq!(id, task_id);
                assert_eq!(task_type, TaskType::TextExtraction);
            }
            _ => panic!("Wrong event variant"),
        }
    }

    #[test]
    fn test_worker_event_task_failed_carries_error() {
        let event = WorkerEvent::TaskFailed {
            task_id: Uuid::new_v4(),
            task_type: TaskType::EntityExtraction,
            error: "boom".to_string(),
        };

        match event {
            WorkerEvent::TaskFailed { error, .. } => assert_eq!(error, "boom"),
            _ => panic!("Wrong event variant"),
        }
    }

    #[test]
    fn test_worker_event_clone_and_debug() {
        let event = WorkerEvent::WorkerStarted;
        let cloned = event.clone();
        assert!(matches!(cloned, WorkerEvent::WorkerStarted));
        assert!(format!("{:?}", WorkerEvent::WorkerStopped).contains("WorkerStopped"));
    }
}
