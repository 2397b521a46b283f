//! Centralized default constants for the lexgraph system.
//!
//! **This module is the single source of truth** for all shared default
//! values. All crates reference these constants instead of defining their
//! own magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// TASKS
// =============================================================================

/// Maximum number of retry attempts chained to one logical unit of work.
/// A failed task may be retried until the new task would carry this count.
pub const MAX_TASK_RETRIES: i32 = 3;

/// Days a task record is kept before it may be purged, regardless of
/// terminal status.
pub const TASK_RETENTION_DAYS: i64 = 7;

/// Hard ceiling on a single stage execution; a handler that exceeds it is
/// failed rather than left running forever.
pub const TASK_TIMEOUT_SECS: u64 = 600;

// =============================================================================
// QUEUE
// =============================================================================

/// How long a claim call blocks waiting for a new stream entry.
pub const CLAIM_BLOCK_MS: u64 = 5000;

/// Re-poll interval while blocked on a claim (backstop for a missed notify).
pub const CLAIM_POLL_INTERVAL_MS: u64 = 500;

/// Seconds after which a claimed-but-unacked entry becomes claimable again.
/// Covers consumers that crashed mid-stage.
pub const QUEUE_REDELIVERY_SECS: i64 = 300;

/// Capacity of the worker event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Per-command timeout for external extraction tools (pdftotext, pdfinfo).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// NER
// =============================================================================

/// Maximum characters sent to the NER sidecar in one request.
pub const NER_MAX_TEXT_CHARS: usize = 30_000;

/// Request timeout for the NER sidecar.
pub const NER_TIMEOUT_SECS: u64 = 30;

/// Entity names shorter than this are discarded as noise.
pub const NER_MIN_NAME_LEN: usize = 2;

/// Entity names longer than this are discarded as extraction artifacts.
pub const NER_MAX_NAME_LEN: usize = 100;

// =============================================================================
// NETWORK
// =============================================================================

/// Number of top co-occurring entities returned in the entity detail view.
pub const TOP_CONNECTIONS_LIMIT: usize = 10;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for task list endpoints.
pub const PAGE_LIMIT: i64 = 50;

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

/// PostgreSQL connection string.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Base URL of the NER sidecar. Empty string disables NER.
pub const ENV_NER_BASE_URL: &str = "NER_BASE_URL";
