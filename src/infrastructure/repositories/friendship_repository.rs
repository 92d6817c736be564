//! Friendship Repository Implementation
//!
//! PostgreSQL implementation of the FriendshipRepository trait.
//!
//! The pair unique index on `(LEAST(user_id, friend_id), GREATEST(user_id, friend_id))`
//! guarantees one row per pair. Transitions use conditional statements so a
//! row that changed since it was read is left untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Friendship, FriendshipFilter, FriendshipRepository, FriendshipStatus};
use crate::shared::error::AppError;

const FRIENDSHIP_COLUMNS: &str =
    "id, user_id, friend_id, status, blocked_by, created_at, updated_at, accepted_at";

#[derive(Debug, sqlx::FromRow)]
struct FriendshipRow {
    id: i64,
    user_id: i64,
    friend_id: i64,
    status: String,
    blocked_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
}

impl FriendshipRow {
    fn into_friendship(self) -> Friendship {
        Friendship {
            id: self.id,
            user_id: self.user_id,
            friend_id: self.friend_id,
            status: FriendshipStatus::from_str(&self.status),
            blocked_by: self.blocked_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            accepted_at: self.accepted_at,
        }
    }
}

/// WHERE clause for a listing filter; `$1` is the user.
fn filter_clause(filter: FriendshipFilter) -> &'static str {
    match filter {
        FriendshipFilter::Friends => "status = 'accepted' AND (user_id = $1 OR friend_id = $1)",
        FriendshipFilter::Incoming => "status = 'pending' AND friend_id = $1",
        FriendshipFilter::Outgoing => "status = 'pending' AND user_id = $1",
        FriendshipFilter::BlockedByMe => "status = 'blocked' AND blocked_by = $1",
    }
}

#[derive(Clone)]
pub struct PgFriendshipRepository {
    pool: PgPool,
}

impl PgFriendshipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FriendshipRepository for PgFriendshipRepository {
    async fn find_between(&self, a: i64, b: i64) -> Result<Option<Friendship>, AppError> {
        let row = sqlx::query_as::<_, FriendshipRow>(&format!(
            r#"
            SELECT {FRIENDSHIP_COLUMNS}
            FROM friendships
            WHERE (user_id = $1 AND friend_id = $2) OR (user_id = $2 AND friend_id = $1)
            "#
        ))
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FriendshipRow::into_friendship))
    }

    async fn create(&self, friendship: &Friendship) -> Result<Friendship, AppError> {
        let row = sqlx::query_as::<_, FriendshipRow>(&format!(
            r#"
            INSERT INTO friendships (id, user_id, friend_id, status, blocked_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {FRIENDSHIP_COLUMNS}
            "#
        ))
        .bind(friendship.id)
        .bind(friendship.user_id)
        .bind(friendship.friend_id)
        .bind(friendship.status.as_str())
        .bind(friendship.blocked_by)
        .bind(friendship.created_at)
        .bind(friendship.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("A relationship between these users already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_friendship())
    }

    async fn accept(&self, id: i64) -> Result<Option<Friendship>, AppError> {
        let row = sqlx::query_as::<_, FriendshipRow>(&format!(
            r#"
            UPDATE friendships
            SET status = 'accepted', accepted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {FRIENDSHIP_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FriendshipRow::into_friendship))
    }

    async fn upsert_block(&self, id: i64, blocker: i64, target: i64) -> Result<Option<Friendship>, AppError> {
        let row = sqlx::query_as::<_, FriendshipRow>(&format!(
            r#"
            INSERT INTO friendships (id, user_id, friend_id, status, blocked_by)
            VALUES ($1, $2, $3, 'blocked', $2)
            ON CONFLICT ((LEAST(user_id, friend_id)), (GREATEST(user_id, friend_id)))
            DO UPDATE SET status = 'blocked',
                          blocked_by = EXCLUDED.blocked_by,
                          accepted_at = NULL,
                          updated_at = NOW()
            WHERE friendships.status <> 'blocked'
            RETURNING {FRIENDSHIP_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(blocker)
        .bind(target)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FriendshipRow::into_friendship))
    }

    async fn delete_with_status(&self, id: i64, expected: FriendshipStatus) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM friendships WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        filter: FriendshipFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Friendship>, AppError> {
        let rows = sqlx::query_as::<_, FriendshipRow>(&format!(
            r#"
            SELECT {FRIENDSHIP_COLUMNS}
            FROM friendships
            WHERE {}
            ORDER BY updated_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            filter_clause(filter)
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FriendshipRow::into_friendship).collect())
    }

    async fn count_for_user(&self, user_id: i64, filter: FriendshipFilter) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM friendships WHERE {}",
            filter_clause(filter)
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn friend_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT CASE WHEN user_id = $1 THEN friend_id ELSE user_id END
            FROM friendships
            WHERE status = 'accepted' AND (user_id = $1 OR friend_id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
