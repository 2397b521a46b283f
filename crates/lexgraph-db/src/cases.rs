//! Case repository implementation.
//!
//! The pipeline consumes cases; full case CRUD lives in the API layer. This
//! repository covers the fields the pipeline reads and writes, plus an
//! insert used by fixtures and the upload path.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use lexgraph_core::{Case, CaseRepository, CaseStatus, Error, Result};

/// PostgreSQL implementation of CaseRepository.
#[derive(Clone)]
pub struct PgCaseRepository {
    pool: Pool<Postgres>,
}

impl PgCaseRepository {
    /// Create a new PgCaseRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert CaseStatus to string for the database.
    fn case_status_to_str(status: CaseStatus) -> &'static str {
        status.as_str()
    }

    /// Convert string from the database to CaseStatus.
    fn str_to_case_status(s: &str) -> CaseStatus {
        match s {
            "pending" => CaseStatus::Pending,
            "processing" => CaseStatus::Processing,
            "ocr_complete" => CaseStatus::OcrComplete,
            "complete" => CaseStatus::Complete,
            "failed" => CaseStatus::Failed,
            _ => CaseStatus::Pending, // fallback
        }
    }

    /// Parse a case row into a Case struct.
    pub(crate) fn parse_case_row(row: sqlx::postgres::PgRow) -> Case {
        Case {
            case_id: row.get("case_id"),
            uploaded_by: row.get("uploaded_by"),
            filename: row.get("filename"),
            file_path: row.get("file_path"),
            raw_text: row.get("raw_text"),
            status: Self::str_to_case_status(row.get("status")),
            court_name: row.get("court_name"),
            case_date: row.get("case_date"),
            is_deleted: row.get("is_deleted"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Insert a new case row (upload path and test fixtures).
    pub async fn insert(&self, case: &Case) -> Result<()> {
        sqlx::query(
            "INSERT INTO cases (case_id, uploaded_by, filename, file_path, raw_text, status,
                                court_name, case_date, is_deleted, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6::case_status, $7, $8, $9, $10, $11)",
        )
        .bind(case.case_id)
        .bind(case.uploaded_by)
        .bind(&case.filename)
        .bind(&case.file_path)
        .bind(&case.raw_text)
        .bind(Self::case_status_to_str(case.status))
        .bind(&case.court_name)
        .bind(case.case_date)
        .bind(case.is_deleted)
        .bind(case.created_at)
        .bind(case.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl CaseRepository for PgCaseRepository {
    async fn get(&self, case_id: Uuid) -> Result<Option<Case>> {
        let row = sqlx::query(
            "SELECT case_id, uploaded_by, filename, file_path, raw_text, status::text,
                    court_name, case_date, is_deleted, created_at, updated_at
             FROM cases WHERE case_id = $1",
        )
        .bind(case_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_case_row))
    }

    async fn get_many(&self, case_ids: &[Uuid]) -> Result<Vec<Case>> {
        let rows = sqlx::query(
            "SELECT case_id, uploaded_by, filename, file_path, raw_text, status::text,
                    court_name, case_date, is_deleted, created_at, updated_at
             FROM cases WHERE case_id = ANY($1)",
        )
        .bind(case_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_case_row).collect())
    }

    async fn set_extracted_text(
        &self,
        case_id: Uuid,
        raw_text: &str,
        status: CaseStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE cases
             SET raw_text = $2, status = $3::case_status, updated_at = $4
             WHERE case_id = $1",
        )
        .bind(case_id)
        .bind(raw_text)
        .bind(Self::case_status_to_str(status))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::CaseNotFound(case_id));
        }
        Ok(())
    }

    async fn set_status(&self, case_id: Uuid, status: CaseStatus) -> Result<()> {
        let result = sqlx::query(
            "UPDATE cases SET status = $2::case_status, updated_at = $3 WHERE case_id = $1",
        )
        .bind(case_id)
        .bind(Self::case_status_to_str(status))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::CaseNotFound(case_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_status_round_trip() {
        for status in [
            CaseStatus::Pending,
            CaseStatus::Processing,
            CaseStatus::OcrComplete,
            CaseStatus::Complete,
            CaseStatus::Failed,
        ] {
            let s = PgCaseRepository::case_status_to_str(status);
            assert_eq!(PgCaseRepository::str_to_case_status(s), status);
        }
    }

    #[test]
    fn test_str_to_case_status_unknown_fallback() {
        assert_eq!(
            PgCaseRepository::str_to_case_status("weird"),
            CaseStatus::Pending
        );
    }
}
