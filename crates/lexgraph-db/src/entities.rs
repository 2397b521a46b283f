//! Entity repository implementation.
//!
//! The pipeline writes entity rows; the network view reads them. Writes are
//! idempotent upserts keyed by `(case_id, identity, entity_type)` so a
//! redelivered entity_extraction entry can safely re-run.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use lexgraph_core::{
    build_network, new_v7, Case, Entity, EntityDetail, EntityNetwork, EntityRepository,
    EntityType, Error, NewEntity, Result,
};

/// PostgreSQL implementation of EntityRepository plus the network views.
#[derive(Clone)]
pub struct PgEntityRepository {
    pool: Pool<Postgres>,
}

impl PgEntityRepository {
    /// Create a new PgEntityRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert string from the database to EntityType.
    fn str_to_entity_type(s: &str) -> EntityType {
        EntityType::parse(s).unwrap_or(EntityType::Org) // fallback
    }

    /// Parse an entity row into an Entity struct.
    fn parse_entity_row(row: sqlx::postgres::PgRow) -> Entity {
        Entity {
            entity_id: row.get("entity_id"),
            case_id: row.get("case_id"),
            owner_user_id: row.get("owner_user_id"),
            entity_type: Self::str_to_entity_type(row.get("entity_type")),
            entity_name: row.get("entity_name"),
            normalized_name: row.get("normalized_name"),
            confidence: row.get("confidence"),
            page_number: row.get("page_number"),
            created_at: row.get("created_at"),
        }
    }

    /// List a user's entities, optionally filtered by type.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        entity_type: Option<EntityType>,
        limit: i64,
    ) -> Result<Vec<Entity>> {
        let mut conditions = vec!["owner_user_id = $1".to_string()];
        let mut param_idx = 2;

        if entity_type.is_some() {
            conditions.push(format!("entity_type::text = ${}", param_idx));
            param_idx += 1;
        }

        let query = format!(
            "SELECT entity_id, case_id, owner_user_id, entity_type::text, entity_name,
                    normalized_name, confidence, page_number, created_at
             FROM entities
             WHERE {}
             LIMIT ${}",
            conditions.join(" AND "),
            param_idx
        );

        let mut q = sqlx::query(&query).bind(user_id);
        if let Some(t) = entity_type {
            q = q.bind(t.as_str());
        }
        q = q.bind(limit);

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::parse_entity_row).collect())
    }

    /// Fetch all of a user's entity rows in non-deleted cases.
    async fn fetch_user_rows(&self, user_id: Uuid, exclude_dates: bool) -> Result<Vec<Entity>> {
        let date_clause = if exclude_dates {
            "AND e.entity_type <> 'DATE'::entity_type"
        } else {
            ""
        };

        let query = format!(
            "SELECT e.entity_id, e.case_id, e.owner_user_id, e.entity_type::text,
                    e.entity_name, e.normalized_name, e.confidence, e.page_number, e.created_at
             FROM entities e
             JOIN cases c ON c.case_id = e.case_id
             WHERE e.owner_user_id = $1
               AND c.is_deleted = FALSE
               {}",
            date_clause
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_entity_row).collect())
    }

    /// Build the co-occurrence network for a user from committed entity
    /// rows. Pure graph construction lives in `lexgraph_core::network`; this
    /// is only the I/O shell.
    pub async fn network(&self, user_id: Uuid) -> Result<EntityNetwork> {
        let rows = self.fetch_user_rows(user_id, true).await?;
        let network = build_network(&rows);

        debug!(
            subsystem = "db",
            component = "entities",
            op = "build_network",
            %user_id,
            node_count = network.stats.total_nodes,
            edge_count = network.stats.total_edges,
            "Built entity network"
        );
        Ok(network)
    }

    /// Detail view for one canonical entity name across a user's cases.
    pub async fn entity_detail(
        &self,
        user_id: Uuid,
        entity_name: &str,
    ) -> Result<Option<EntityDetail>> {
        let rows = self.fetch_user_rows(user_id, false).await?;

        let needle = entity_name.to_lowercase();
        let case_ids: Vec<Uuid> = {
            let mut ids: Vec<Uuid> = rows
                .iter()
                .filter(|e| e.entity_name.to_lowercase() == needle)
                .map(|e| e.case_id)
                .collect();
            ids.sort();
            ids.dedup();
            ids
        };
        if case_ids.is_empty() {
            return Ok(None);
        }

        let cases = self.fetch_cases(&case_ids).await?;
        Ok(lexgraph_core::entity_detail(&rows, &cases, entity_name))
    }

    async fn fetch_cases(&self, case_ids: &[Uuid]) -> Result<Vec<Case>> {
        let rows = sqlx::query(
            "SELECT case_id, uploaded_by, filename, file_path, raw_text, status::text,
                    court_name, case_date, is_deleted, created_at, updated_at
             FROM cases WHERE case_id = ANY($1)",
        )
        .bind(case_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(crate::cases::PgCaseRepository::parse_case_row)
            .collect())
    }
}

#[async_trait]
impl EntityRepository for PgEntityRepository {
    async fn upsert_many(&self, entities: &[NewEntity]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let now = Utc::now();

        for entity in entities {
            sqlx::query(
                "INSERT INTO entities (entity_id, case_id, owner_user_id, entity_type,
                                       entity_name, normalized_name, confidence, page_number, created_at)
                 VALUES ($1, $2, $3, $4::entity_type, $5, $6, $7, $8, $9)
                 ON CONFLICT (case_id, lower(coalesce(normalized_name, entity_name)), entity_type)
                 DO UPDATE SET entity_name = EXCLUDED.entity_name,
                               confidence = GREATEST(entities.confidence, EXCLUDED.confidence),
                               page_number = EXCLUDED.page_number",
            )
            .bind(new_v7())
            .bind(entity.case_id)
            .bind(entity.owner_user_id)
            .bind(entity.entity_type.as_str())
            .bind(&entity.entity_name)
            .bind(&entity.normalized_name)
            .bind(entity.confidence)
            .bind(entity.page_number)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(entities.len() as u64)
    }

    async fn delete_for_case(&self, case_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM entities WHERE case_id = $1")
            .bind(case_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_to_entity_type_vocabulary() {
        assert_eq!(
            PgEntityRepository::str_to_entity_type("PERSON"),
            EntityType::Person
        );
        assert_eq!(
            PgEntityRepository::str_to_entity_type("COURT"),
            EntityType::Court
        );
    }

    #[test]
    fn test_str_to_entity_type_unknown_fallback() {
        assert_eq!(
            PgEntityRepository::str_to_entity_type("GPE"),
            EntityType::Org
        );
    }
}
