//! Segment repository

use sentra_common::types::SegmentStatus;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateSegment, Segment, UpdateSegment};

/// Segment repository
#[derive(Clone)]
pub struct SegmentRepository {
    pool: PgPool,
}

impl SegmentRepository {
    /// Create a new segment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new segment
    pub async fn create(&self, input: CreateSegment) -> Result<Segment, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, Segment>(
            r#"
            INSERT INTO segments (id, owner_id, name, description, emails)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.owner_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.emails)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a segment by id, scoped to its owner
    pub async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Segment>, sqlx::Error> {
        sqlx::query_as::<_, Segment>("SELECT * FROM segments WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List active segments for an owner
    pub async fn list_by_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Segment>, sqlx::Error> {
        sqlx::query_as::<_, Segment>(
            r#"
            SELECT * FROM segments
            WHERE owner_id = $1 AND status = 'active'
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Update a segment's metadata and, optionally, its full email list
    pub async fn update(
        &self,
        owner_id: Uuid,
        id: Uuid,
        input: UpdateSegment,
    ) -> Result<Option<Segment>, sqlx::Error> {
        sqlx::query_as::<_, Segment>(
            r#"
            UPDATE segments
            SET name = COALESCE($3, name),
                description = COALESCE($4, description),
                emails = COALESCE($5, emails),
                updated_at = NOW()
            WHERE id = $1 AND owner_id = $2 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.emails)
        .fetch_optional(&self.pool)
        .await
    }

    /// Replace the email list of a segment
    pub async fn set_emails(
        &self,
        owner_id: Uuid,
        id: Uuid,
        emails: &[String],
    ) -> Result<Option<Segment>, sqlx::Error> {
        sqlx::query_as::<_, Segment>(
            r#"
            UPDATE segments
            SET emails = $3, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(emails)
        .fetch_optional(&self.pool)
        .await
    }

    /// Soft-delete a segment
    pub async fn set_status(
        &self,
        owner_id: Uuid,
        id: Uuid,
        status: SegmentStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE segments SET status = $3, updated_at = NOW() WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .bind(status.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Derived contact counts for all active segments of an owner
    pub async fn contact_counts(&self, owner_id: Uuid) -> Result<Vec<(Uuid, i64)>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, cardinality(emails)::BIGINT
            FROM segments
            WHERE owner_id = $1 AND status = 'active'
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }
}
