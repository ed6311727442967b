use axum::extract::FromRef;
use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

/// Session keys used in the application
pub const SESSION_KEY_USER_ID: &str = "user_id";
pub const SESSION_KEY_ROLE: &str = "role";

/// Creates the cookie session layer backed by PostgreSQL.
///
/// The session secret is reserved for cookie signing; the store itself
/// keys sessions by random id.
pub async fn create_session_layer(
    pool: PgPool,
    _session_secret: &[u8],
    base_url: &str,
) -> Result<SessionManagerLayer<PostgresStore>, sqlx::Error> {
    let session_store = PostgresStore::new(pool);
    session_store.migrate().await?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(base_url.starts_with("https://"))
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(24)));

    Ok(session_layer)
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: crate::config::Config,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.pool.clone()
    }
}
