use sqlx::PgPool;

use crate::models::ClassSession;

#[derive(Debug)]
pub struct SweepStats {
    pub flagged_inactive: u64,
}

/// Background job that reconciles the `is_active` flag with expiry.
///
/// Effective status is always derived from `expires_at`, so this sweep only
/// keeps listings and the status distribution tidy; a session the sweep has
/// not reached yet still reads as expired everywhere that matters.
pub async fn expire_overdue_sessions(pool: &PgPool) -> Result<SweepStats, sqlx::Error> {
    let flagged_inactive = ClassSession::flag_overdue_inactive(pool).await?;

    if flagged_inactive > 0 {
        tracing::info!(flagged_inactive, "Session expiry sweep flagged overdue sessions");
    } else {
        tracing::debug!("Session expiry sweep found nothing overdue");
    }

    Ok(SweepStats { flagged_inactive })
}
