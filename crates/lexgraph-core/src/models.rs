//! Core data models shared across lexgraph crates.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// TASK TYPES
// =============================================================================

/// The pipeline stage a task executes.
///
/// A closed set: dispatch is always an exhaustive match or a typed lookup
/// table, never string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Extract full and per-page text from the case's stored document.
    TextExtraction,
    /// Run NER over the extracted text and persist entity rows.
    EntityExtraction,
}

impl TaskType {
    /// Wire/database name for this task type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::TextExtraction => "text_extraction",
            TaskType::EntityExtraction => "entity_extraction",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a task in the store.
///
/// Transitions only along `Pending -> InProgress -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Wire/database name for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Whether this status ends the task lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// One unit of asynchronous pipeline work tied to a case and user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub task_type: TaskType,
    pub owner_user_id: Uuid,
    pub case_id: Uuid,
    pub status: TaskStatus,
    /// 0-100; monotonically non-decreasing within one execution attempt.
    pub progress: i32,
    /// Structured payload, set only on `Completed`.
    pub result: Option<JsonValue>,
    /// Human-readable message, set only on `Failed`.
    pub error: Option<String>,
    /// Prior retry attempts chained to this logical unit of work.
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    /// Set only on a terminal transition.
    pub completed_at: Option<DateTime<Utc>>,
}

/// An immutable, ordered record in the delivery log referencing a task.
///
/// The payload fields never change after append; only the consumer-group
/// bookkeeping (claim/ack) does, and that lives in the database, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Monotone sequence number assigned at append time.
    pub entry_id: i64,
    pub task_id: Uuid,
    pub task_type: TaskType,
    pub user_id: Uuid,
    pub case_id: Uuid,
    pub appended_at: DateTime<Utc>,
}

/// Task store statistics summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStats {
    pub pending: i64,
    pub in_progress: i64,
    pub completed_last_hour: i64,
    pub failed_last_hour: i64,
    pub total: i64,
}

// =============================================================================
// CASE TYPES
// =============================================================================

/// Processing status of a case document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pending,
    Processing,
    /// Text extraction finished; entities not yet extracted.
    OcrComplete,
    Complete,
    Failed,
}

impl CaseStatus {
    /// Wire/database name for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Pending => "pending",
            CaseStatus::Processing => "processing",
            CaseStatus::OcrComplete => "ocr_complete",
            CaseStatus::Complete => "complete",
            CaseStatus::Failed => "failed",
        }
    }
}

/// A legal case document (consumed by the pipeline, owned by the CRUD layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub case_id: Uuid,
    pub uploaded_by: Uuid,
    pub filename: String,
    /// Reference to the stored document; absent until upload completes.
    pub file_path: Option<String>,
    /// Full extracted text; written by the text_extraction stage.
    pub raw_text: Option<String>,
    pub status: CaseStatus,
    pub court_name: Option<String>,
    pub case_date: Option<NaiveDate>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// ENTITY TYPES
// =============================================================================

/// Closed vocabulary of entity types. Labels outside this set are discarded
/// at the recognition boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Person,
    Org,
    Date,
    Location,
    Court,
}

impl EntityType {
    /// All members of the vocabulary, in canonical order.
    pub const ALL: [EntityType; 5] = [
        EntityType::Person,
        EntityType::Org,
        EntityType::Date,
        EntityType::Location,
        EntityType::Court,
    ];

    /// Wire/database name for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "PERSON",
            EntityType::Org => "ORG",
            EntityType::Date => "DATE",
            EntityType::Location => "LOCATION",
            EntityType::Court => "COURT",
        }
    }

    /// Parse a label, case-insensitively. Returns `None` for labels outside
    /// the vocabulary so callers can discard them.
    pub fn parse(label: &str) -> Option<EntityType> {
        match label.trim().to_uppercase().as_str() {
            "PERSON" => Some(EntityType::Person),
            "ORG" => Some(EntityType::Org),
            "DATE" => Some(EntityType::Date),
            "LOCATION" => Some(EntityType::Location),
            "COURT" => Some(EntityType::Court),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An extracted entity row, persisted per case and consumed by the network
/// graph builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: Uuid,
    pub case_id: Uuid,
    pub owner_user_id: Uuid,
    pub entity_type: EntityType,
    pub entity_name: String,
    /// Case/whitespace-folded identity key used to merge mentions.
    pub normalized_name: Option<String>,
    pub confidence: Option<f64>,
    pub page_number: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    /// Identity key for node grouping: normalized name if present, else the
    /// surface name, lowercased.
    pub fn identity_key(&self) -> String {
        self.normalized_name
            .as_deref()
            .unwrap_or(&self.entity_name)
            .to_lowercase()
    }
}

/// Request to persist one entity row.
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub case_id: Uuid,
    pub owner_user_id: Uuid,
    pub entity_type: EntityType,
    pub entity_name: String,
    pub normalized_name: String,
    pub confidence: f64,
    pub page_number: i32,
}

// =============================================================================
// COLLABORATOR OUTPUT TYPES
// =============================================================================

/// Text of one document page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    pub page_number: i32,
    pub text: String,
}

/// Output of the text extraction collaborator.
#[derive(Debug, Clone)]
pub struct DocumentText {
    pub full_text: String,
    pub pages: Vec<PageText>,
}

/// One entity mention produced by the recognition collaborator, before
/// deduplication and persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEntity {
    pub name: String,
    pub entity_type: EntityType,
    pub confidence: f64,
    pub page_number: i32,
}

// =============================================================================
// NETWORK GRAPH TYPES
// =============================================================================

/// One deduplicated entity in the network view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkNode {
    /// Ordinal node identifier within one built graph.
    pub id: String,
    /// Surface name of the first row encountered for this identity.
    pub label: String,
    pub entity_type: EntityType,
    /// Number of distinct cases this identity appears in.
    pub case_count: usize,
    pub case_ids: Vec<Uuid>,
    /// All underlying entity row ids aggregated into this node.
    pub entity_ids: Vec<Uuid>,
}

/// An undirected co-occurrence edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Number of distinct cases in which both endpoints appear.
    pub weight: i64,
}

/// Summary statistics for a built graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    /// Node counts keyed by entity type wire name.
    pub entity_types: HashMap<String, i64>,
    /// Average node degree: `2 * edges / nodes`, 0.0 when there are no nodes.
    pub avg_connections: f64,
}

/// The full network view for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityNetwork {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
    pub stats: NetworkStats,
}

/// Case reference shown in the entity detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRef {
    pub case_id: Uuid,
    pub filename: String,
    pub court_name: Option<String>,
    pub case_date: Option<NaiveDate>,
}

/// One co-occurring entity in the detail view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConnection {
    pub name: String,
    pub entity_type: EntityType,
    pub count: i64,
}

/// Detail view for a single canonical entity across all of a user's cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDetail {
    pub entity_name: String,
    pub entity_type: EntityType,
    pub normalized_name: Option<String>,
    /// Total matching rows across cases.
    pub occurrence_count: usize,
    pub case_count: usize,
    pub cases: Vec<CaseRef>,
    /// Co-occurring entities ranked by count descending, top 10.
    pub top_connections: Vec<EntityConnection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_as_str() {
        assert_eq!(TaskType::TextExtraction.as_str(), "text_extraction");
        assert_eq!(TaskType::EntityExtraction.as_str(), "entity_extraction");
    }

    #[test]
    fn test_task_type_serde_snake_case() {
        let json = serde_json::to_string(&TaskType::TextExtraction).unwrap();
        assert_eq!(json, "\"text_extraction\"");
        let back: TaskType = serde_json::from_str("\"entity_extraction\"").unwrap();
        assert_eq!(back, TaskType::EntityExtraction);
    }

    #[test]
    fn test_task_status_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_case_status_as_str() {
        assert_eq!(CaseStatus::OcrComplete.as_str(), "ocr_complete");
        assert_eq!(CaseStatus::Complete.as_str(), "complete");
    }

    #[test]
    fn test_entity_type_parse_valid() {
        assert_eq!(EntityType::parse("PERSON"), Some(EntityType::Person));
        assert_eq!(EntityType::parse("org"), Some(EntityType::Org));
        assert_eq!(EntityType::parse(" Court "), Some(EntityType::Court));
    }

    #[test]
    fn test_entity_type_parse_outside_vocabulary() {
        assert_eq!(EntityType::parse("GPE"), None);
        assert_eq!(EntityType::parse(""), None);
        assert_eq!(EntityType::parse("CITATION"), None);
    }

    #[test]
    fn test_entity_type_serde_uppercase() {
        let json = serde_json::to_string(&EntityType::Location).unwrap();
        assert_eq!(json, "\"LOCATION\"");
    }

    #[test]
    fn test_entity_identity_key_prefers_normalized() {
        let e = Entity {
            entity_id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            owner_user_id: Uuid::new_v4(),
            entity_type: EntityType::Person,
            entity_name: "John Smith".to_string(),
            normalized_name: Some("john smith".to_string()),
            confidence: Some(0.9),
            page_number: Some(1),
            created_at: Utc::now(),
        };
        assert_eq!(e.identity_key(), "john smith");
    }

    #[test]
    fn test_entity_identity_key_falls_back_to_name() {
        let e = Entity {
            entity_id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            owner_user_id: Uuid::new_v4(),
            entity_type: EntityType::Org,
            entity_name: "State Bank of India".to_string(),
            normalized_name: None,
            confidence: None,
            page_number: None,
            created_at: Utc::now(),
        };
        assert_eq!(e.identity_key(), "state bank of india");
    }

    #[test]
    fn test_task_serde_roundtrip() {
        let task = Task {
            id: Uuid::new_v4(),
            task_type: TaskType::TextExtraction,
            owner_user_id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            status: TaskStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            retry_count: 0,
            created_at: Utc::now(),
            completed_at: None,
        };
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, task.id);
        assert_eq!(back.status, TaskStatus::Pending);
    }
}
