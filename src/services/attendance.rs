use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::class_session::SessionStatus;
use crate::models::{AttendanceRecord, ClassSession, User};
use crate::services::qr_code::SessionQrPayload;

/// Outcome of one attendance submission attempt.
///
/// Everything but `Recorded` leaves the database untouched.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Recorded { record: AttendanceRecord },
    SessionNotFound { session_id: Uuid },
    SessionDeactivated { session_id: Uuid },
    SessionExpired { session_id: Uuid },
    AlreadySubmitted { session_id: Uuid },
    InvalidSignature,
}

impl SubmissionOutcome {
    /// Returns the outcome type as a string for logging
    pub fn result_type(&self) -> &'static str {
        match self {
            SubmissionOutcome::Recorded { .. } => "recorded",
            SubmissionOutcome::SessionNotFound { .. } => "session_not_found",
            SubmissionOutcome::SessionDeactivated { .. } => "session_deactivated",
            SubmissionOutcome::SessionExpired { .. } => "session_expired",
            SubmissionOutcome::AlreadySubmitted { .. } => "already_submitted",
            SubmissionOutcome::InvalidSignature => "invalid_signature",
        }
    }

    pub fn message(&self) -> String {
        match self {
            SubmissionOutcome::Recorded { .. } => "Attendance recorded".to_string(),
            SubmissionOutcome::SessionNotFound { .. } => "Session not found".to_string(),
            SubmissionOutcome::SessionDeactivated { .. } => {
                "Session has been deactivated".to_string()
            }
            SubmissionOutcome::SessionExpired { .. } => "Session has expired".to_string(),
            SubmissionOutcome::AlreadySubmitted { .. } => {
                "Attendance already submitted for this session".to_string()
            }
            SubmissionOutcome::InvalidSignature => "QR payload signature is invalid".to_string(),
        }
    }
}

/// Records attendance for a student against a session id.
///
/// This function:
/// 1. Looks up the session; absent sessions are reported, not errors
/// 2. Rejects sessions past expiry (row value, not the scanned payload);
///    expiry is judged before the stored flag, so a session the sweep has
///    flagged inactive still reports as expired
/// 3. Rejects deactivated sessions
/// 4. Inserts atomically; a unique-key conflict means already submitted
#[tracing::instrument(skip(pool, student), fields(student_id = %student.id))]
pub async fn submit_for_session(
    pool: &PgPool,
    session_id: Uuid,
    student: &User,
    now: DateTime<Utc>,
) -> Result<SubmissionOutcome, sqlx::Error> {
    let session = match ClassSession::find_by_id(pool, session_id).await? {
        Some(s) => s,
        None => {
            tracing::warn!(session_id = %session_id, "Session not found");
            return Ok(SubmissionOutcome::SessionNotFound { session_id });
        }
    };

    match session.status(now) {
        SessionStatus::Expired => {
            tracing::info!(session_id = %session.id, expires_at = %session.expires_at, "Session expired");
            return Ok(SubmissionOutcome::SessionExpired {
                session_id: session.id,
            });
        }
        SessionStatus::Deactivated => {
            tracing::info!(session_id = %session.id, "Session deactivated");
            return Ok(SubmissionOutcome::SessionDeactivated {
                session_id: session.id,
            });
        }
        SessionStatus::Open => {}
    }

    let record = AttendanceRecord::insert_once(
        pool,
        student.id,
        &student.display_name(),
        session.id,
    )
    .await?;

    match record {
        Some(record) => {
            tracing::info!(
                session_id = %session.id,
                record_id = %record.id,
                "Attendance recorded"
            );
            Ok(SubmissionOutcome::Recorded { record })
        }
        None => {
            tracing::info!(session_id = %session.id, "Duplicate submission");
            Ok(SubmissionOutcome::AlreadySubmitted {
                session_id: session.id,
            })
        }
    }
}

/// Records attendance from a scanned payload, verifying its signature
/// before any database work.
pub async fn submit_payload(
    pool: &PgPool,
    signing_key: &[u8],
    payload: &SessionQrPayload,
    student: &User,
    now: DateTime<Utc>,
) -> Result<SubmissionOutcome, sqlx::Error> {
    if !payload.verify(signing_key) {
        tracing::warn!(session_id = %payload.session_id, "Rejected payload with bad signature");
        return Ok(SubmissionOutcome::InvalidSignature);
    }

    submit_for_session(pool, payload.session_id, student, now).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_result_types() {
        let id = Uuid::new_v4();
        assert_eq!(
            SubmissionOutcome::SessionNotFound { session_id: id }.result_type(),
            "session_not_found"
        );
        assert_eq!(
            SubmissionOutcome::AlreadySubmitted { session_id: id }.result_type(),
            "already_submitted"
        );
        assert_eq!(
            SubmissionOutcome::InvalidSignature.result_type(),
            "invalid_signature"
        );
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let id = Uuid::new_v4();
        let json =
            serde_json::to_value(SubmissionOutcome::SessionExpired { session_id: id }).unwrap();
        assert_eq!(json["outcome"], "session_expired");
        assert_eq!(json["session_id"], id.to_string());
    }
}
