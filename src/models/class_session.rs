use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Derived session status. The stored `is_active` flag alone never grants
/// access, and expiry is judged by the clock before the flag: a session the
/// background sweep has already flagged inactive still reads as expired,
/// not deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Expired,
    Deactivated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Expired => "expired",
            SessionStatus::Deactivated => "deactivated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassSession {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    /// HMAC-SHA256 hex of the QR payload, kept so the rendered code can be
    /// reproduced without re-signing.
    pub qr_signature: String,
}

#[derive(Debug, Clone)]
pub struct CreateSessionData {
    pub instructor_id: Uuid,
    pub title: String,
    pub expires_at: DateTime<Utc>,
}

impl ClassSession {
    /// True iff the session is still accepting attendance at `now`.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.expires_at
    }

    pub fn status(&self, now: DateTime<Utc>) -> SessionStatus {
        if now >= self.expires_at {
            SessionStatus::Expired
        } else if !self.is_active {
            SessionStatus::Deactivated
        } else {
            SessionStatus::Open
        }
    }

    /// Creates a session row with a placeholder signature; the caller signs
    /// the payload (which needs the generated id and created_at) and stores
    /// it via [`ClassSession::set_qr_signature`].
    pub async fn create(pool: &PgPool, data: CreateSessionData) -> Result<Self, sqlx::Error> {
        let session = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO class_sessions (instructor_id, title, expires_at, qr_signature)
            VALUES ($1, $2, $3, '')
            RETURNING *
            "#,
        )
        .bind(data.instructor_id)
        .bind(&data.title)
        .bind(data.expires_at)
        .fetch_one(pool)
        .await?;

        Ok(session)
    }

    pub async fn set_qr_signature(
        pool: &PgPool,
        id: Uuid,
        signature: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE class_sessions SET qr_signature = $2 WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(signature)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let session = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM class_sessions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    pub async fn list_by_instructor(
        pool: &PgPool,
        instructor_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sessions = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM class_sessions
            WHERE instructor_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(instructor_id)
        .fetch_all(pool)
        .await?;

        Ok(sessions)
    }

    /// Deactivate a session (soft delete). Idempotent.
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE class_sessions
            SET is_active = FALSE
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Hard delete; attendance records cascade.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            DELETE FROM class_sessions WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM class_sessions
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Flags all sessions past expiry as inactive, returning how many rows
    /// changed. Used by the periodic sweep; correctness never depends on it
    /// because status is derived.
    pub async fn flag_overdue_inactive(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE class_sessions
            SET is_active = FALSE
            WHERE is_active = TRUE AND expires_at < NOW()
            "#,
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(is_active: bool, expires_in: Duration) -> ClassSession {
        let now = Utc::now();
        ClassSession {
            id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
            title: "Lecture 1".to_string(),
            created_at: now,
            expires_at: now + expires_in,
            is_active,
            qr_signature: String::new(),
        }
    }

    #[test]
    fn open_while_active_and_unexpired() {
        let s = session(true, Duration::hours(1));
        assert!(s.is_open(Utc::now()));
        assert_eq!(s.status(Utc::now()), SessionStatus::Open);
    }

    #[test]
    fn expired_reads_non_open_regardless_of_flag() {
        let s = session(true, Duration::minutes(-1));
        assert!(!s.is_open(Utc::now()));
        assert_eq!(s.status(Utc::now()), SessionStatus::Expired);
    }

    #[test]
    fn deactivated_while_unexpired() {
        let s = session(false, Duration::hours(1));
        assert!(!s.is_open(Utc::now()));
        assert_eq!(s.status(Utc::now()), SessionStatus::Deactivated);
    }

    #[test]
    fn swept_session_still_reads_expired() {
        // the background sweep flags overdue sessions inactive; that must
        // not relabel them as deactivated
        let s = session(false, Duration::hours(-1));
        assert!(!s.is_open(Utc::now()));
        assert_eq!(s.status(Utc::now()), SessionStatus::Expired);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let s = session(true, Duration::zero());
        assert!(!s.is_open(s.expires_at));
    }
}
