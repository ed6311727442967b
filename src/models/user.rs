use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUserData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Creates a new user record. Fails with a unique violation if the
    /// email is already registered.
    pub async fn create(pool: &PgPool, data: CreateUserData) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO users (first_name, last_name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(data.role)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM users WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM users WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Lists all users with a given role, newest first.
    pub async fn list_by_role(pool: &PgPool, role: Role) -> Result<Vec<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM users
            WHERE role = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(role)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    pub async fn count_by_role(pool: &PgPool, role: Role) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM users WHERE role = $1
            "#,
        )
        .bind(role)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Student).unwrap(), "\"student\"");
        assert_eq!(
            serde_json::to_string(&Role::Instructor).unwrap(),
            "\"instructor\""
        );
    }

    #[test]
    fn role_deserializes_from_form_values() {
        let role: Role = serde_json::from_str("\"instructor\"").unwrap();
        assert_eq!(role, Role::Instructor);
        assert!(serde_json::from_str::<Role>("\"admin\"").is_err());
    }

    #[test]
    fn display_name_joins_first_and_last() {
        let user = User {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Student,
            created_at: Utc::now(),
        };
        assert_eq!(user.display_name(), "Ada Lovelace");
    }
}
