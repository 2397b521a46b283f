//! # lexgraph-db
//!
//! PostgreSQL database layer for lexgraph.
//!
//! This crate provides:
//! - Connection pool management
//! - The durable task store and append-only delivery stream
//! - Case and entity repositories consumed by the pipeline
//! - The entity network views (I/O shell over the pure builder)
//!
//! ## Example
//!
//! ```rust,ignore
//! use lexgraph_db::Database;
//! use lexgraph_core::{TaskRepository, TaskType};
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/lexgraph").await?;
//!     db.migrate().await?;
//!
//!     let task = db
//!         .tasks
//!         .create(TaskType::TextExtraction, Uuid::new_v4(), Uuid::new_v4())
//!         .await?;
//!     println!("Queued task: {}", task.id);
//!     Ok(())
//! }
//! ```

pub mod cases;
pub mod entities;
pub mod pool;
pub mod tasks;

// Test fixtures for integration tests.
// Always compiled so downstream crates' tests/ can use them.
pub mod test_fixtures;

// Re-export core types
pub use lexgraph_core::*;

// Re-export repository implementations
pub use cases::PgCaseRepository;
pub use entities::PgEntityRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tasks::PgTaskRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Task store and delivery stream.
    pub tasks: PgTaskRepository,
    /// Case repository consumed by the pipeline.
    pub cases: PgCaseRepository,
    /// Entity repository and network views.
    pub entities: PgEntityRepository,
}

impl Database {
    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::from_pool(pool))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        Ok(Self::from_pool(pool))
    }

    /// Build a Database from an existing pool.
    pub fn from_pool(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            tasks: PgTaskRepository::new(pool.clone()),
            cases: PgCaseRepository::new(pool.clone()),
            entities: PgEntityRepository::new(pool.clone()),
            pool,
        }
    }

    /// Run embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("Migration failed: {}", e)))
    }
}
