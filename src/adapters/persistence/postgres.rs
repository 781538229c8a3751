//! PostgreSQL implementation of MatchStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};

use crate::domain::foundation::{DomainError, ErrorCode, SessionId, Timestamp, UserId};
use crate::domain::matching::{MatchSession, MatchSessionStatus, Rating};
use crate::ports::{MatchStore, SessionRecord, SessionUpdate, UserProfile};

#[derive(Clone)]
pub struct PostgresMatchStore {
    pool: PgPool,
}

impl PostgresMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(action: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to {}: {}", action, e))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get {}: {}", name, e),
        )
    })
}

#[async_trait]
impl MatchStore for PostgresMatchStore {
    async fn create_session(&self, session: &MatchSession) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO match_sessions (id, status, interests, media_channel_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(session.id().as_uuid())
        .bind(session.status().as_str())
        .bind(session.common_interests())
        .bind(session.media_channel_id())
        .bind(session.created_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("insert match session"))?;

        Ok(())
    }

    async fn update_session(
        &self,
        id: &SessionId,
        update: SessionUpdate,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE match_sessions SET
                status = COALESCE($2, status),
                started_at = COALESCE($3, started_at),
                ends_at = COALESCE($4, ends_at),
                actual_ended_at = COALESCE($5, actual_ended_at)
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.started_at.map(|t| *t.as_datetime()))
        .bind(update.ends_at.map(|t| *t.as_datetime()))
        .bind(update.actual_ended_at.map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(db_error("update match session"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::SessionNotFound,
                format!("Session not found: {}", id),
            ));
        }

        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, status, interests, media_channel_id, started_at, ends_at, actual_ended_at
            FROM match_sessions
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch match session"))?;

        row.map(|row| row_to_session_record(&row)).transpose()
    }

    async fn add_participant(&self, id: &SessionId, user: &UserId) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO match_participants (session_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (session_id, user_id) DO NOTHING
            "#,
        )
        .bind(id.as_uuid())
        .bind(user.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("insert match participant"))?;

        Ok(())
    }

    async fn rate_participant(
        &self,
        id: &SessionId,
        user: &UserId,
        rating: Rating,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE match_participants SET rating = $3 WHERE session_id = $1 AND user_id = $2",
        )
        .bind(id.as_uuid())
        .bind(user.as_str())
        .bind(rating.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("update match participant"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::NotParticipant,
                format!("User {} did not take part in session {}", user, id),
            ));
        }

        Ok(())
    }

    async fn set_online(&self, user: &UserId, online: bool) -> Result<(), DomainError> {
        sqlx::query("UPDATE users SET is_online = $2, updated_at = NOW() WHERE id = $1")
            .bind(user.as_str())
            .bind(online)
            .execute(&self.pool)
            .await
            .map_err(db_error("update presence"))?;

        Ok(())
    }

    async fn get_profile(&self, user: &UserId) -> Result<Option<UserProfile>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT nickname, interests, total_calls, total_minutes, is_online
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch user profile"))?;

        match row {
            Some(row) => Ok(Some(UserProfile {
                nickname: column(&row, "nickname")?,
                interests: column(&row, "interests")?,
                total_calls: column(&row, "total_calls")?,
                total_minutes: column(&row, "total_minutes")?,
                is_online: column(&row, "is_online")?,
            })),
            None => Ok(None),
        }
    }

    async fn update_user_stats(
        &self,
        user: &UserId,
        calls: i64,
        minutes: i64,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                total_calls = total_calls + $2,
                total_minutes = total_minutes + $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.as_str())
        .bind(calls)
        .bind(minutes)
        .execute(&self.pool)
        .await
        .map_err(db_error("update user stats"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::UserNotFound,
                format!("User not found: {}", user),
            ));
        }

        Ok(())
    }

    async fn online_count(&self) -> Result<u64, DomainError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE is_online")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count online users"))?;

        Ok(count.max(0) as u64)
    }
}

fn row_to_session_record(row: &PgRow) -> Result<SessionRecord, DomainError> {
    let id: uuid::Uuid = column(row, "id")?;
    let status: String = column(row, "status")?;
    let status: MatchSessionStatus = status.parse()?;
    let started_at: Option<DateTime<Utc>> = column(row, "started_at")?;
    let ends_at: Option<DateTime<Utc>> = column(row, "ends_at")?;
    let actual_ended_at: Option<DateTime<Utc>> = column(row, "actual_ended_at")?;

    Ok(SessionRecord {
        id: SessionId::from_uuid(id),
        status,
        common_interests: column(row, "interests")?,
        media_channel_id: column(row, "media_channel_id")?,
        started_at: started_at.map(Timestamp::from_datetime),
        ends_at: ends_at.map(Timestamp::from_datetime),
        actual_ended_at: actual_ended_at.map(Timestamp::from_datetime),
    })
}
