use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::session::{AppState, SESSION_KEY_ROLE, SESSION_KEY_USER_ID};
use crate::models::user::{CreateUserData, Role, User};

#[derive(Debug)]
pub enum AuthError {
    Validation(String),
    WrongCredentials,
    EmailTaken,
    Hash(String),
    DatabaseError(sqlx::Error),
    SessionError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthError::WrongCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
            ),
            AuthError::EmailTaken => (
                StatusCode::CONFLICT,
                "An account with this email already exists".to_string(),
            ),
            AuthError::Hash(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Password hashing error: {}", msg),
            ),
            AuthError::DatabaseError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", e),
            ),
            AuthError::SessionError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Session error: {}", msg),
            ),
        };

        (status, message).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

fn dashboard_path(role: Role) -> &'static str {
    match role {
        Role::Instructor => "/my-account/instructor",
        Role::Student => "/my-account/student",
    }
}

fn validate_registration(form: &RegisterForm) -> Result<(), String> {
    if form.first_name.trim().is_empty() {
        return Err("First name is required".to_string());
    }
    if form.last_name.trim().is_empty() {
        return Err("Last name is required".to_string());
    }
    let email = form.email.trim();
    if email.is_empty() || !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err("A valid email address is required".to_string());
    }
    if form.password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored_hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| AuthError::Hash(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::WrongCredentials)
}

async fn establish_session(session: &Session, user: &User) -> Result<(), AuthError> {
    session
        .insert(SESSION_KEY_USER_ID, user.id)
        .await
        .map_err(|e| AuthError::SessionError(e.to_string()))?;

    session
        .insert(SESSION_KEY_ROLE, user.role)
        .await
        .map_err(|e| AuthError::SessionError(e.to_string()))?;

    Ok(())
}

async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Redirect, AuthError> {
    validate_registration(&form).map_err(AuthError::Validation)?;

    let password_hash = hash_password(&form.password)?;

    let created = User::create(
        &state.pool,
        CreateUserData {
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            email: form.email.trim().to_lowercase(),
            password_hash,
            role: form.role,
        },
    )
    .await;

    let user = match created {
        Ok(user) => user,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(AuthError::EmailTaken);
        }
        Err(e) => return Err(AuthError::DatabaseError(e)),
    };

    establish_session(&session, &user).await?;

    tracing::info!(user_id = %user.id, role = %user.role, "Account registered");

    Ok(Redirect::to(dashboard_path(user.role)))
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, AuthError> {
    let user = User::find_by_email(&state.pool, &form.email.trim().to_lowercase())
        .await
        .map_err(AuthError::DatabaseError)?
        .ok_or(AuthError::WrongCredentials)?;

    verify_password(&form.password, &user.password_hash)?;

    establish_session(&session, &user).await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Redirect::to(dashboard_path(user.role)))
}

/// Logs out the user
async fn logout(session: Session) -> Result<Redirect, AuthError> {
    session
        .flush()
        .await
        .map_err(|e| AuthError::SessionError(e.to_string()))?;

    Ok(Redirect::to("/"))
}

/// Shows the home page; links depend on login state
async fn home_page(session: Session) -> Result<Html<String>, AuthError> {
    let role: Option<Role> = session
        .get(SESSION_KEY_ROLE)
        .await
        .map_err(|e| AuthError::SessionError(e.to_string()))?;

    let menu = match role {
        Some(Role::Instructor) => {
            r#"<a class="button" href="/my-account/instructor">Instructor dashboard</a>
               <a class="button" href="/my-account/instructor/analytics">Analytics</a>
               <a class="button danger" href="/logout">Sign out</a>"#
        }
        Some(Role::Student) => {
            r#"<a class="button" href="/my-account/student">Scan attendance</a>
               <a class="button" href="/my-account/student/history">My attendance</a>
               <a class="button danger" href="/logout">Sign out</a>"#
        }
        None => {
            r#"<a class="button" href="/login">Log in</a>
               <a class="button" href="/register">Register</a>"#
        }
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>QRoll</title>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: Arial, sans-serif; max-width: 600px; margin: 50px auto; padding: 20px; }}
        h1 {{ color: #1E3A5F; font-size: 56px; margin-bottom: 4px; }}
        .subtitle {{ color: #666; text-transform: uppercase; letter-spacing: 2px; font-size: 13px; margin-bottom: 40px; }}
        .menu {{ display: flex; flex-direction: column; gap: 8px; max-width: 320px; }}
        .button {{ background: #1E3A5F; color: #fff; padding: 14px 18px; text-decoration: none; border-radius: 4px; }}
        .button:hover {{ background: #16304e; }}
        .button.danger {{ background: #8C4A3F; }}
    </style>
</head>
<body>
    <h1>QRoll</h1>
    <p class="subtitle">QR-code class attendance</p>
    <div class="menu">{}</div>
</body>
</html>"#,
        menu
    );

    Ok(Html(html))
}

async fn register_page() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Register - QRoll</title>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body { font-family: Arial, sans-serif; max-width: 480px; margin: 50px auto; padding: 20px; }
        h1 { color: #1E3A5F; }
        label { display: block; margin-bottom: 5px; font-weight: bold; }
        input, select { width: 100%; padding: 10px; margin-bottom: 18px; border: 1px solid #ddd; border-radius: 4px; box-sizing: border-box; }
        button { background-color: #1E3A5F; color: white; padding: 12px 20px; border: none; border-radius: 4px; cursor: pointer; font-size: 16px; width: 100%; }
    </style>
</head>
<body>
    <h1>Create an account</h1>
    <form action="/register" method="POST">
        <label for="first_name">First name</label>
        <input type="text" name="first_name" id="first_name" required>
        <label for="last_name">Last name</label>
        <input type="text" name="last_name" id="last_name" required>
        <label for="email">Email</label>
        <input type="email" name="email" id="email" required>
        <label for="password">Password (8+ characters)</label>
        <input type="password" name="password" id="password" required minlength="8">
        <label for="role">Role</label>
        <select name="role" id="role">
            <option value="student">Student</option>
            <option value="instructor">Instructor</option>
        </select>
        <button type="submit">Register</button>
    </form>
    <p><a href="/login">Already have an account? Log in</a></p>
</body>
</html>"#,
    )
}

async fn login_page() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Log in - QRoll</title>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body { font-family: Arial, sans-serif; max-width: 480px; margin: 50px auto; padding: 20px; }
        h1 { color: #1E3A5F; }
        label { display: block; margin-bottom: 5px; font-weight: bold; }
        input { width: 100%; padding: 10px; margin-bottom: 18px; border: 1px solid #ddd; border-radius: 4px; box-sizing: border-box; }
        button { background-color: #1E3A5F; color: white; padding: 12px 20px; border: none; border-radius: 4px; cursor: pointer; font-size: 16px; width: 100%; }
    </style>
</head>
<body>
    <h1>Log in</h1>
    <form action="/login" method="POST">
        <label for="email">Email</label>
        <input type="email" name="email" id="email" required>
        <label for="password">Password</label>
        <input type="password" name="password" id="password" required>
        <button type="submit">Log in</button>
    </form>
    <p><a href="/register">Need an account? Register</a></p>
</body>
</html>"#,
    )
}

async fn unauthorized_page() -> (StatusCode, Html<&'static str>) {
    (
        StatusCode::FORBIDDEN,
        Html(
            r#"<!DOCTYPE html>
<html>
<head>
    <title>Unauthorized - QRoll</title>
    <meta charset="UTF-8">
    <style>
        body { font-family: Arial, sans-serif; max-width: 480px; margin: 80px auto; padding: 20px; text-align: center; }
        h1 { color: #8C4A3F; }
        a { color: #1E3A5F; }
    </style>
</head>
<body>
    <h1>Not allowed</h1>
    <p>Your account does not have access to that page.</p>
    <p><a href="/">Back to home</a></p>
</body>
</html>"#,
        ),
    )
}

/// Creates the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home_page))
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
        .route("/unauthorized", get(unauthorized_page))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(email: &str, password: &str) -> RegisterForm {
        RegisterForm {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Role::Student,
        }
    }

    #[test]
    fn registration_accepts_sane_input() {
        assert!(validate_registration(&form("ada@example.com", "longenough")).is_ok());
    }

    #[test]
    fn registration_rejects_bad_email() {
        assert!(validate_registration(&form("not-an-email", "longenough")).is_err());
        assert!(validate_registration(&form("@example.com", "longenough")).is_err());
        assert!(validate_registration(&form("", "longenough")).is_err());
    }

    #[test]
    fn registration_rejects_short_password() {
        assert!(validate_registration(&form("ada@example.com", "short")).is_err());
    }

    #[test]
    fn registration_rejects_blank_names() {
        let mut f = form("ada@example.com", "longenough");
        f.first_name = "  ".to_string();
        assert!(validate_registration(&f).is_err());
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::WrongCredentials)
        ));
    }

    #[test]
    fn dashboard_paths_by_role() {
        assert_eq!(dashboard_path(Role::Instructor), "/my-account/instructor");
        assert_eq!(dashboard_path(Role::Student), "/my-account/student");
    }
}
