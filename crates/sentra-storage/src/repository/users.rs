//! User repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateUser, User};

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, input: CreateUser) -> Result<User, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, api_key_prefix, api_key_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.api_key_prefix)
        .bind(&input.api_key_hash)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a user by id
    pub async fn get(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find candidate users by API key prefix. The prefix is an index hint;
    /// callers must still compare the full key hash.
    pub async fn find_by_api_key_prefix(&self, prefix: &str) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE api_key_prefix = $1 AND status = 'active'",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
    }

    /// Replace a user's API key hash and prefix
    pub async fn update_api_key(
        &self,
        id: Uuid,
        prefix: &str,
        hash: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET api_key_prefix = $2, api_key_hash = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(prefix)
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
    }

    /// Record a successful login
    pub async fn touch_last_login(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
