use askama::Template;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::api::middleware::auth::current_identity;
use crate::api::middleware::session::AppState;
use crate::error::AppError;
use crate::models::{AttendanceRecord, User};
use crate::services::attendance::{self, SubmissionOutcome};
use crate::services::{qr_decoder, signature};

#[derive(Template)]
#[template(path = "attendance/scan.html")]
struct ScanPageTemplate {
    student_name: String,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(flatten)]
    pub outcome: SubmissionOutcome,
}

#[derive(Debug, Deserialize)]
pub struct SubmitPayloadRequest {
    /// QR content decoded client-side (camera path).
    pub payload: String,
}

fn outcome_response(outcome: SubmissionOutcome) -> (StatusCode, Json<ScanResponse>) {
    let status_code = match &outcome {
        SubmissionOutcome::Recorded { .. } => StatusCode::CREATED,
        SubmissionOutcome::SessionNotFound { .. } => StatusCode::NOT_FOUND,
        SubmissionOutcome::SessionDeactivated { .. }
        | SubmissionOutcome::SessionExpired { .. }
        | SubmissionOutcome::AlreadySubmitted { .. } => StatusCode::CONFLICT,
        SubmissionOutcome::InvalidSignature => StatusCode::UNPROCESSABLE_ENTITY,
    };

    let response = ScanResponse {
        status: outcome.result_type(),
        message: outcome.message(),
        outcome,
    };

    (status_code, Json(response))
}

async fn current_student(state: &AppState, session: &Session) -> Result<User, AppError> {
    let me = current_identity(session)
        .await
        .map_err(|_| AppError::Unauthorized)?;

    User::find_by_id(&state.pool, me.user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

/// Scan page: image upload plus a paste box for camera-decoded payloads
async fn scan_page(
    State(state): State<AppState>,
    session: Session,
) -> Result<ScanPageTemplate, AppError> {
    let student = current_student(&state, &session).await?;

    Ok(ScanPageTemplate {
        student_name: student.display_name(),
    })
}

/// Records attendance from an uploaded QR image
async fn scan_image(
    State(state): State<AppState>,
    session: Session,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ScanResponse>), AppError> {
    let student = current_student(&state, &session).await?;

    let mut image_bytes = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid upload: {}", e)))?
    {
        if field.name() == Some("image") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Invalid upload: {}", e)))?;
            image_bytes = Some(bytes);
        }
    }

    let bytes =
        image_bytes.ok_or_else(|| AppError::Validation("An image file is required".to_string()))?;

    let payload = qr_decoder::decode_and_parse(&bytes)?;

    let signing_key = signature::derive_key(state.config.qr_secret.expose_secret());
    let outcome =
        attendance::submit_payload(&state.pool, &signing_key, &payload, &student, Utc::now())
            .await?;

    Ok(outcome_response(outcome))
}

/// Records attendance from a payload string decoded client-side
async fn submit_payload(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<SubmitPayloadRequest>,
) -> Result<(StatusCode, Json<ScanResponse>), AppError> {
    let student = current_student(&state, &session).await?;

    let payload = qr_decoder::parse_payload(&request.payload)?;

    let signing_key = signature::derive_key(state.config.qr_secret.expose_secret());
    let outcome =
        attendance::submit_payload(&state.pool, &signing_key, &payload, &student, Utc::now())
            .await?;

    Ok(outcome_response(outcome))
}

/// The student's own attendance history
async fn history(
    State(state): State<AppState>,
    session: Session,
) -> Result<Html<String>, AppError> {
    let student = current_student(&state, &session).await?;

    let entries = AttendanceRecord::history_for_student(&state.pool, student.id).await?;

    let body = if entries.is_empty() {
        r#"<p class="empty">No attendance recorded yet.</p>"#.to_string()
    } else {
        let rows: String = entries
            .iter()
            .map(|e| {
                format!(
                    "<tr><td>{}</td><td>{}</td></tr>",
                    html_escape::encode_text(&e.session_title),
                    e.created_at.format("%Y-%m-%d %H:%M UTC")
                )
            })
            .collect();
        format!(
            r#"<table><tr><th>Session</th><th>Recorded at</th></tr>{}</table>"#,
            rows
        )
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>My attendance - QRoll</title>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; max-width: 700px; margin: 50px auto; padding: 20px; }}
        h1 {{ color: #1E3A5F; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ text-align: left; padding: 8px; border-bottom: 1px solid #eee; }}
        .empty {{ color: #666; }}
        a {{ color: #1E3A5F; }}
    </style>
</head>
<body>
    <h1>My attendance</h1>
    {}
    <p><a href="/my-account/student">Back to scanner</a></p>
</body>
</html>"#,
        body
    );

    Ok(Html(html))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/my-account/student", get(scan_page))
        .route("/my-account/student/scan", post(scan_image))
        .route("/my-account/student/submit", post(submit_payload))
        .route("/my-account/student/history", get(history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn recorded_maps_to_created() {
        let record = crate::models::AttendanceRecord {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            student_name: "Ada Lovelace".to_string(),
            session_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        let (code, _) = outcome_response(SubmissionOutcome::Recorded { record });
        assert_eq!(code, StatusCode::CREATED);
    }

    #[test]
    fn rejections_map_to_conflict_family() {
        let id = Uuid::new_v4();
        let (code, _) = outcome_response(SubmissionOutcome::SessionNotFound { session_id: id });
        assert_eq!(code, StatusCode::NOT_FOUND);

        let (code, _) = outcome_response(SubmissionOutcome::SessionExpired { session_id: id });
        assert_eq!(code, StatusCode::CONFLICT);

        let (code, _) = outcome_response(SubmissionOutcome::AlreadySubmitted { session_id: id });
        assert_eq!(code, StatusCode::CONFLICT);

        let (code, _) = outcome_response(SubmissionOutcome::InvalidSignature);
        assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn response_body_carries_outcome_tag() {
        let id = Uuid::new_v4();
        let (_, Json(body)) = outcome_response(SubmissionOutcome::SessionExpired { session_id: id });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "session_expired");
        assert_eq!(json["outcome"], "session_expired");
        assert!(json["message"].as_str().unwrap().contains("expired"));
    }
}
