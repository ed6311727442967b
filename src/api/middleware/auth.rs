use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use super::session::{SESSION_KEY_ROLE, SESSION_KEY_USER_ID};
use crate::models::Role;

/// Role-gate failures. Unauthenticated users go back to the login page,
/// authenticated users with the wrong role land on the unauthorized page.
#[derive(Debug)]
pub enum RoleGateError {
    NotLoggedIn,
    WrongRole,
    SessionError,
}

impl IntoResponse for RoleGateError {
    fn into_response(self) -> Response {
        match self {
            RoleGateError::NotLoggedIn => Redirect::to("/login").into_response(),
            RoleGateError::WrongRole => Redirect::to("/unauthorized").into_response(),
            RoleGateError::SessionError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Session error occurred.").into_response()
            }
        }
    }
}

/// The identity stored in the server session
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
}

/// Extracts the logged-in identity from the session
pub async fn current_identity(session: &Session) -> Result<AuthenticatedUser, RoleGateError> {
    let user_id: Uuid = session
        .get(SESSION_KEY_USER_ID)
        .await
        .map_err(|_| RoleGateError::SessionError)?
        .ok_or(RoleGateError::NotLoggedIn)?;

    let role: Role = session
        .get(SESSION_KEY_ROLE)
        .await
        .map_err(|_| RoleGateError::SessionError)?
        .ok_or(RoleGateError::NotLoggedIn)?;

    Ok(AuthenticatedUser { user_id, role })
}

async fn require_role(
    session: Session,
    required: Role,
    request: Request,
    next: Next,
) -> Result<Response, RoleGateError> {
    let identity = current_identity(&session).await?;

    if identity.role != required {
        return Err(RoleGateError::WrongRole);
    }

    Ok(next.run(request).await)
}

/// Middleware guarding `/my-account/instructor/*`
pub async fn require_instructor(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, RoleGateError> {
    require_role(session, Role::Instructor, request, next).await
}

/// Middleware guarding `/my-account/student/*`
pub async fn require_student(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, RoleGateError> {
    require_role(session, Role::Student, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    #[test]
    fn unauthenticated_redirects_to_login() {
        let response = RoleGateError::NotLoggedIn.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[test]
    fn wrong_role_redirects_to_unauthorized() {
        let response = RoleGateError::WrongRole.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/unauthorized");
    }

    #[test]
    fn session_failure_is_a_server_error() {
        let response = RoleGateError::SessionError.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
