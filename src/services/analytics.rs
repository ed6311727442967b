use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::models::attendance_record::{
    AttendanceRecord, DailyCount, SessionUsage, StudentActivity,
};
use crate::models::{ClassSession, Role, User};

/// Session counts by derived status, computed against NOW() in SQL.
/// Expiry is judged by the clock alone, so the sweep flipping `is_active`
/// on an overdue session never moves it between buckets.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusDistribution {
    pub open: i64,
    pub expired: i64,
    pub deactivated: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub records: i64,
}

/// Everything the analytics dashboard shows, aggregated server-side in a
/// handful of queries instead of shipping whole collections to the client.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub total_sessions: i64,
    pub total_records: i64,
    pub total_students: i64,
    pub average_records_per_session: f64,
    pub most_used_session: Option<SessionUsage>,
    pub most_active_student: Option<StudentActivity>,
    pub status_distribution: StatusDistribution,
    pub daily_trend: Vec<TrendPoint>,
}

pub async fn build_report(pool: &PgPool) -> Result<AnalyticsReport, sqlx::Error> {
    let total_sessions = ClassSession::count(pool).await?;
    let total_records = AttendanceRecord::count(pool).await?;
    let total_students = User::count_by_role(pool, Role::Student).await?;

    let most_used_session = AttendanceRecord::most_used_session(pool).await?;
    let most_active_student = AttendanceRecord::most_active_student(pool).await?;

    let status_distribution = status_distribution(pool).await?;

    let daily_trend = AttendanceRecord::daily_counts(pool)
        .await?
        .into_iter()
        .map(trend_point)
        .collect();

    Ok(AnalyticsReport {
        total_sessions,
        total_records,
        total_students,
        average_records_per_session: average(total_records, total_sessions),
        most_used_session,
        most_active_student,
        status_distribution,
        daily_trend,
    })
}

async fn status_distribution(pool: &PgPool) -> Result<StatusDistribution, sqlx::Error> {
    let distribution = sqlx::query_as::<_, StatusDistribution>(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE is_active AND expires_at > NOW()) AS open,
            COUNT(*) FILTER (WHERE expires_at <= NOW()) AS expired,
            COUNT(*) FILTER (WHERE NOT is_active AND expires_at > NOW()) AS deactivated
        FROM class_sessions
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(distribution)
}

fn trend_point(count: DailyCount) -> TrendPoint {
    TrendPoint {
        date: count.day.format("%Y-%m-%d").to_string(),
        records: count.records,
    }
}

fn average(records: i64, sessions: i64) -> f64 {
    if sessions == 0 {
        0.0
    } else {
        records as f64 / sessions as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn average_guards_empty_denominator() {
        assert_eq!(average(10, 0), 0.0);
        assert_eq!(average(10, 4), 2.5);
    }

    #[test]
    fn trend_point_formats_day() {
        let point = trend_point(DailyCount {
            day: Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap(),
            records: 7,
        });
        assert_eq!(point.date, "2026-03-14");
        assert_eq!(point.records, 7);
    }
}
