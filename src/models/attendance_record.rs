use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A session title paired with a usage count, for the analytics "most used"
/// query.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SessionUsage {
    pub session_id: Uuid,
    pub title: String,
    pub records: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StudentActivity {
    pub student_id: Uuid,
    pub student_name: String,
    pub records: i64,
}

/// One day of attendance volume.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyCount {
    pub day: DateTime<Utc>,
    pub records: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRecordCount {
    pub session_id: Uuid,
    pub records: i64,
}

/// One row of a student's attendance history, joined with the session title.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StudentHistoryEntry {
    pub session_id: Uuid,
    pub session_title: String,
    pub created_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Inserts a record for (student, session) atomically. Returns `None`
    /// when a record already exists; the unique key makes concurrent
    /// duplicate submissions lose the race instead of double-writing.
    pub async fn insert_once(
        pool: &PgPool,
        student_id: Uuid,
        student_name: &str,
        session_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO attendance_records (student_id, student_name, session_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (student_id, session_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(student_id)
        .bind(student_name)
        .bind(session_id)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    pub async fn list_by_session(
        pool: &PgPool,
        session_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let records = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM attendance_records
            WHERE session_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }

    /// A student's history, newest first, with session titles resolved in
    /// one query.
    pub async fn history_for_student(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<StudentHistoryEntry>, sqlx::Error> {
        let entries = sqlx::query_as::<_, StudentHistoryEntry>(
            r#"
            SELECT a.session_id, s.title AS session_title, a.created_at
            FROM attendance_records a
            JOIN class_sessions s ON s.id = a.session_id
            WHERE a.student_id = $1
            ORDER BY a.created_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM attendance_records
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Record counts for every session belonging to one instructor, grouped
    /// in SQL rather than queried per row.
    pub async fn counts_by_instructor(
        pool: &PgPool,
        instructor_id: Uuid,
    ) -> Result<Vec<SessionRecordCount>, sqlx::Error> {
        let counts = sqlx::query_as::<_, SessionRecordCount>(
            r#"
            SELECT s.id AS session_id, COUNT(a.id) AS records
            FROM class_sessions s
            LEFT JOIN attendance_records a ON a.session_id = s.id
            WHERE s.instructor_id = $1
            GROUP BY s.id
            "#,
        )
        .bind(instructor_id)
        .fetch_all(pool)
        .await?;

        Ok(counts)
    }

    /// The session with the most records, if any attendance exists.
    pub async fn most_used_session(pool: &PgPool) -> Result<Option<SessionUsage>, sqlx::Error> {
        let usage = sqlx::query_as::<_, SessionUsage>(
            r#"
            SELECT a.session_id, s.title, COUNT(*) AS records
            FROM attendance_records a
            JOIN class_sessions s ON s.id = a.session_id
            GROUP BY a.session_id, s.title
            ORDER BY records DESC, s.title ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(pool)
        .await?;

        Ok(usage)
    }

    /// The student with the most records, if any attendance exists.
    pub async fn most_active_student(
        pool: &PgPool,
    ) -> Result<Option<StudentActivity>, sqlx::Error> {
        let activity = sqlx::query_as::<_, StudentActivity>(
            r#"
            SELECT student_id, student_name, COUNT(*) AS records
            FROM attendance_records
            GROUP BY student_id, student_name
            ORDER BY records DESC, student_name ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(pool)
        .await?;

        Ok(activity)
    }

    /// Attendance volume bucketed by day, oldest first.
    pub async fn daily_counts(pool: &PgPool) -> Result<Vec<DailyCount>, sqlx::Error> {
        let counts = sqlx::query_as::<_, DailyCount>(
            r#"
            SELECT date_trunc('day', created_at) AS day, COUNT(*) AS records
            FROM attendance_records
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(counts)
    }
}
