use askama::Template;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::collections::HashMap;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::auth::{current_identity, AuthenticatedUser};
use crate::api::middleware::session::AppState;
use crate::error::AppError;
use crate::models::{user::Role, AttendanceRecord, ClassSession, User};
use crate::services::{qr_code, signature};

async fn identity(session: &Session) -> Result<AuthenticatedUser, AppError> {
    use crate::api::middleware::auth::RoleGateError;

    current_identity(session).await.map_err(|e| match e {
        RoleGateError::SessionError => AppError::Session("Session store unavailable".to_string()),
        _ => AppError::Unauthorized,
    })
}

/// Loads a session and checks the caller owns it. Foreign sessions read as
/// not found, never as forbidden.
async fn owned_session(
    state: &AppState,
    session_id: Uuid,
    instructor_id: Uuid,
) -> Result<ClassSession, AppError> {
    let session = ClassSession::find_by_id(&state.pool, session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    if session.instructor_id != instructor_id {
        return Err(AppError::NotFound("Session not found".to_string()));
    }

    Ok(session)
}

// Templates

struct SessionRow {
    id: String,
    title: String,
    created: String,
    expires: String,
    status: &'static str,
    records: i64,
}

#[derive(Template)]
#[template(path = "sessions/list.html")]
struct SessionListTemplate {
    sessions: Vec<SessionRow>,
}

/// Instructor dashboard: create-session form plus the session list
async fn dashboard(
    State(state): State<AppState>,
    session: Session,
) -> Result<SessionListTemplate, AppError> {
    let me = identity(&session).await?;

    let sessions = ClassSession::list_by_instructor(&state.pool, me.user_id).await?;

    let counts: HashMap<Uuid, i64> = AttendanceRecord::counts_by_instructor(&state.pool, me.user_id)
        .await?
        .into_iter()
        .map(|c| (c.session_id, c.records))
        .collect();

    let now = Utc::now();
    let rows = sessions
        .into_iter()
        .map(|s| SessionRow {
            id: s.id.to_string(),
            title: s.title.clone(),
            created: s.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            expires: s.expires_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            status: s.status(now).as_str(),
            records: counts.get(&s.id).copied().unwrap_or(0),
        })
        .collect();

    Ok(SessionListTemplate { sessions: rows })
}

#[derive(Debug, Deserialize)]
struct CreateSessionForm {
    title: String,
    expires_at: String,
}

/// Accepts RFC 3339 or the `datetime-local` input format (naive, taken as
/// UTC).
fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|_| "Expiration must be a valid date and time".to_string())
}

fn validate_new_session(
    title: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title is required".to_string());
    }
    if expires_at <= now {
        return Err("Expiration must be in the future".to_string());
    }
    Ok(())
}

async fn create_session(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CreateSessionForm>,
) -> Result<Redirect, AppError> {
    let me = identity(&session).await?;

    let expires_at = parse_expiry(&form.expires_at).map_err(AppError::Validation)?;
    let now = Utc::now();
    validate_new_session(&form.title, expires_at, now).map_err(AppError::Validation)?;

    let created = ClassSession::create(
        &state.pool,
        crate::models::class_session::CreateSessionData {
            instructor_id: me.user_id,
            title: form.title.trim().to_string(),
            expires_at,
        },
    )
    .await?;

    // The payload embeds the generated id and created_at, so signing
    // happens after the insert.
    let signing_key = signature::derive_key(state.config.qr_secret.expose_secret());
    let payload = qr_code::SessionQrPayload::from_session(&created);
    let sig = payload
        .sign(&signing_key)
        .map_err(|e| AppError::Internal(e.into()))?;
    ClassSession::set_qr_signature(&state.pool, created.id, &sig).await?;

    tracing::info!(session_id = %created.id, expires_at = %created.expires_at, "Session created");

    Ok(Redirect::to(&format!(
        "/my-account/instructor/sessions/{}",
        created.id
    )))
}

async fn show_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    session: Session,
) -> Result<Html<String>, AppError> {
    let me = identity(&session).await?;
    let class_session = owned_session(&state, session_id, me.user_id).await?;

    let records = AttendanceRecord::list_by_session(&state.pool, class_session.id).await?;

    let records_html: String = if records.is_empty() {
        r#"<p class="empty">No attendance yet.</p>"#.to_string()
    } else {
        let rows: String = records
            .iter()
            .map(|r| {
                format!(
                    "<tr><td>{}</td><td>{}</td></tr>",
                    html_escape::encode_text(&r.student_name),
                    r.created_at.format("%Y-%m-%d %H:%M UTC")
                )
            })
            .collect();
        format!(
            r#"<table><tr><th>Student</th><th>Recorded at</th></tr>{}</table>"#,
            rows
        )
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title} - QRoll</title>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: Arial, sans-serif; max-width: 700px; margin: 50px auto; padding: 20px; }}
        h1 {{ color: #1E3A5F; }}
        .meta {{ color: #666; margin-bottom: 20px; }}
        .qr {{ margin: 24px 0; }}
        .qr img {{ max-width: 280px; border: 2px solid #ddd; padding: 10px; background: white; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ text-align: left; padding: 8px; border-bottom: 1px solid #eee; }}
        .actions {{ margin-top: 24px; }}
        .button {{ display: inline-block; background: #1E3A5F; color: #fff; padding: 10px 18px; text-decoration: none; border-radius: 4px; border: none; font-size: 14px; cursor: pointer; }}
        .button.danger {{ background: #8C4A3F; }}
        .empty {{ color: #666; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <p class="meta">Status: <strong>{status}</strong> · expires {expires}</p>
    <div class="qr">
        <p><strong>Scan to record attendance:</strong></p>
        <img src="/my-account/instructor/sessions/{id}/qr.svg" alt="Session QR code">
    </div>
    <p>
        <a href="/my-account/instructor/sessions/{id}/qr.png" download="session-{id}.png" class="button">Download PNG</a>
    </p>
    <h2>Attendance</h2>
    {records}
    <div class="actions">
        <form action="/my-account/instructor/sessions/{id}/deactivate" method="POST" style="display:inline">
            <button type="submit" class="button">Deactivate</button>
        </form>
        <form action="/my-account/instructor/sessions/{id}/delete" method="POST" style="display:inline">
            <button type="submit" class="button danger">Delete</button>
        </form>
        <a href="/my-account/instructor" class="button">Back</a>
    </div>
</body>
</html>"#,
        title = html_escape::encode_text(&class_session.title),
        status = class_session.status(Utc::now()).as_str(),
        expires = class_session.expires_at.format("%Y-%m-%d %H:%M UTC"),
        id = class_session.id,
        records = records_html,
    );

    Ok(Html(html))
}

async fn session_qr_svg(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    session: Session,
) -> Result<Response, AppError> {
    let me = identity(&session).await?;
    let class_session = owned_session(&state, session_id, me.user_id).await?;

    let payload = qr_code::SessionQrPayload::from_session(&class_session);
    let svg = qr_code::generate_qr_svg(&payload, &class_session.qr_signature)
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/svg+xml")],
        svg,
    )
        .into_response())
}

async fn session_qr_png(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    session: Session,
) -> Result<Response, AppError> {
    let me = identity(&session).await?;
    let class_session = owned_session(&state, session_id, me.user_id).await?;

    let payload = qr_code::SessionQrPayload::from_session(&class_session);
    let png = qr_code::generate_qr_png(&payload, &class_session.qr_signature)
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], png).into_response())
}

async fn deactivate_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    session: Session,
) -> Result<Redirect, AppError> {
    let me = identity(&session).await?;
    let class_session = owned_session(&state, session_id, me.user_id).await?;

    ClassSession::deactivate(&state.pool, class_session.id).await?;

    tracing::info!(session_id = %class_session.id, "Session deactivated");

    Ok(Redirect::to(&format!(
        "/my-account/instructor/sessions/{}",
        class_session.id
    )))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    session: Session,
) -> Result<Redirect, AppError> {
    let me = identity(&session).await?;
    let class_session = owned_session(&state, session_id, me.user_id).await?;

    ClassSession::delete(&state.pool, class_session.id).await?;

    tracing::info!(session_id = %class_session.id, "Session deleted");

    Ok(Redirect::to("/my-account/instructor"))
}

/// Student roster
async fn student_roster(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let students = User::list_by_role(&state.pool, Role::Student).await?;

    let rows: String = students
        .iter()
        .map(|s| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                html_escape::encode_text(&s.display_name()),
                html_escape::encode_text(&s.email),
                s.created_at.format("%Y-%m-%d")
            )
        })
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Students - QRoll</title>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; max-width: 700px; margin: 50px auto; padding: 20px; }}
        h1 {{ color: #1E3A5F; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ text-align: left; padding: 8px; border-bottom: 1px solid #eee; }}
        a {{ color: #1E3A5F; }}
    </style>
</head>
<body>
    <h1>Registered students</h1>
    <table><tr><th>Name</th><th>Email</th><th>Joined</th></tr>{}</table>
    <p><a href="/my-account/instructor">Back to dashboard</a></p>
</body>
</html>"#,
        rows
    );

    Ok(Html(html))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/my-account/instructor", get(dashboard))
        .route("/my-account/instructor/sessions", post(create_session))
        .route("/my-account/instructor/sessions/:id", get(show_session))
        .route(
            "/my-account/instructor/sessions/:id/qr.svg",
            get(session_qr_svg),
        )
        .route(
            "/my-account/instructor/sessions/:id/qr.png",
            get(session_qr_png),
        )
        .route(
            "/my-account/instructor/sessions/:id/deactivate",
            post(deactivate_session),
        )
        .route(
            "/my-account/instructor/sessions/:id/delete",
            post(delete_session),
        )
        .route("/my-account/instructor/students", get(student_roster))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn parses_datetime_local_input() {
        let dt = parse_expiry("2026-09-01T10:30").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2026-09-01 10:30");
    }

    #[test]
    fn parses_rfc3339_input() {
        let dt = parse_expiry("2026-09-01T10:30:00Z").unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "10:30");
    }

    #[test]
    fn rejects_unparseable_expiry() {
        assert!(parse_expiry("next tuesday").is_err());
        assert!(parse_expiry("").is_err());
    }

    #[test]
    fn rejects_blank_title() {
        let now = Utc::now();
        assert!(validate_new_session("  ", now + Duration::hours(1), now).is_err());
    }

    #[test]
    fn rejects_past_or_present_expiry() {
        let now = Utc::now();
        assert!(validate_new_session("Lecture", now - Duration::minutes(1), now).is_err());
        assert!(validate_new_session("Lecture", now, now).is_err());
        assert!(validate_new_session("Lecture", now + Duration::minutes(1), now).is_ok());
    }
}
