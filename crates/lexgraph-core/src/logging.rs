//! Structured logging schema and field name constants for lexgraph.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (entity rows, pages) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "jobs", "extract", "network"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "worker", "task_stream", "pdf", "ner"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create", "claim_entry", "ack_entry", "extract", "build_network"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Task UUID being processed.
pub const TASK_ID: &str = "task_id";

/// Task type enum variant.
pub const TASK_TYPE: &str = "task_type";

/// Case UUID being operated on.
pub const CASE_ID: &str = "case_id";

/// Owner user UUID.
pub const USER_ID: &str = "user_id";

/// Stream entry sequence number.
pub const ENTRY_ID: &str = "entry_id";

/// Consumer name claiming entries from the stream.
pub const CONSUMER: &str = "consumer";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of pages extracted from a document.
pub const PAGE_COUNT: &str = "page_count";

/// Number of entity rows produced or persisted.
pub const ENTITY_COUNT: &str = "entity_count";

/// Number of nodes in a built network graph.
pub const NODE_COUNT: &str = "node_count";

/// Number of edges in a built network graph.
pub const EDGE_COUNT: &str = "edge_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";
