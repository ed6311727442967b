use askama::Template;
use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::session::AppState;
use crate::error::AppError;
use crate::services::analytics::{self, AnalyticsReport};

struct TrendRow {
    date: String,
    records: i64,
}

#[derive(Template)]
#[template(path = "analytics/dashboard.html")]
struct AnalyticsTemplate {
    total_sessions: i64,
    total_records: i64,
    total_students: i64,
    average: String,
    most_used_session: String,
    most_active_student: String,
    open: i64,
    expired: i64,
    deactivated: i64,
    trend: Vec<TrendRow>,
}

/// Analytics dashboard page
async fn dashboard(State(state): State<AppState>) -> Result<AnalyticsTemplate, AppError> {
    let report = analytics::build_report(&state.pool).await?;

    Ok(AnalyticsTemplate {
        total_sessions: report.total_sessions,
        total_records: report.total_records,
        total_students: report.total_students,
        average: format!("{:.2}", report.average_records_per_session),
        most_used_session: report
            .most_used_session
            .map(|u| format!("{} ({} records)", u.title, u.records))
            .unwrap_or_else(|| "N/A".to_string()),
        most_active_student: report
            .most_active_student
            .map(|a| format!("{} ({} records)", a.student_name, a.records))
            .unwrap_or_else(|| "N/A".to_string()),
        open: report.status_distribution.open,
        expired: report.status_distribution.expired,
        deactivated: report.status_distribution.deactivated,
        trend: report
            .daily_trend
            .into_iter()
            .map(|p| TrendRow {
                date: p.date,
                records: p.records,
            })
            .collect(),
    })
}

/// Raw report for API consumers
async fn report_json(State(state): State<AppState>) -> Result<Json<AnalyticsReport>, AppError> {
    let report = analytics::build_report(&state.pool).await?;
    Ok(Json(report))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/my-account/instructor/analytics", get(dashboard))
        .route("/my-account/instructor/analytics.json", get(report_json))
}
