//! User queries
//!
//! Passwords and sign-in live in the authentication front end; this table only
//! holds profile data and the role used for authorization.

use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::models::{Role, User};
use crate::error::FieldError;
use crate::ratings::RatingsEngine;
use crate::{time, uuid_utils, Error, Result};

/// Client-supplied user fields
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub photo: Option<String>,
    // Owned by the authentication front end; present only to be rejected
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

impl UserInput {
    pub fn validate(&self, require_all: bool) -> Result<()> {
        let mut errors = Vec::new();

        match self.name.as_deref().map(str::trim) {
            Some(name) if name.chars().count() < 2 => errors.push(FieldError::new(
                "name",
                "Name must be more or equal than 2",
            )),
            None if require_all => errors.push(FieldError::new("name", "Please provide a name")),
            _ => {}
        }

        match self.email.as_deref().map(str::trim) {
            Some(email) if !looks_like_email(email) => {
                errors.push(FieldError::new("email", "Please enter a valid email"))
            }
            None if require_all => {
                errors.push(FieldError::new("email", "Please provide an email"))
            }
            _ => {}
        }

        if let Some(role) = &self.role {
            if role.parse::<Role>().is_err() {
                errors.push(FieldError::new(
                    "role",
                    "Role is either: user, guide, lead-guide, admin",
                ));
            }
        }

        if self.password.is_some() || self.password_confirm.is_some() {
            errors.push(FieldError::new(
                "password",
                "Passwords cannot be changed here. Please use /update-my-password",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }

    fn normalized_email(&self) -> Option<String> {
        self.email.as_deref().map(|e| e.trim().to_lowercase())
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

pub async fn get_user(db: &SqlitePool, id: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE guid = ?")
        .bind(id)
        .fetch_optional(db)
        .await?;
    row.map(|r| User::from_row(&r)).transpose().map_err(Into::into)
}

/// Active user by id, for resolving a caller
pub async fn get_active_user(db: &SqlitePool, id: &str) -> Result<Option<User>> {
    Ok(get_user(db, id).await?.filter(|u| u.active))
}

async fn ensure_email_free(db: &SqlitePool, email: &str, except_id: Option<&str>) -> Result<()> {
    let taken: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM users WHERE email = ? AND guid != ?")
            .bind(email)
            .bind(except_id.unwrap_or(""))
            .fetch_optional(db)
            .await?;
    if taken.is_some() {
        return Err(Error::Conflict(
            "This email is taken by another user, please use another email".to_string(),
        ));
    }
    Ok(())
}

pub async fn create_user(db: &SqlitePool, input: &UserInput) -> Result<User> {
    input.validate(true)?;
    let email = input.normalized_email().unwrap_or_default();
    ensure_email_free(db, &email, None).await?;

    let role = input.role.as_deref().unwrap_or(Role::User.as_str());
    let now = time::now();
    let row = sqlx::query(
        r#"
        INSERT INTO users (guid, name, email, role, photo, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(uuid_utils::generate())
    .bind(input.name.as_deref().map(str::trim))
    .bind(&email)
    .bind(role)
    .bind(&input.photo)
    .bind(now)
    .bind(now)
    .fetch_one(db)
    .await?;

    Ok(User::from_row(&row)?)
}

/// Partial update; `allow_role` is false when users edit their own profile
pub async fn update_user(
    db: &SqlitePool,
    id: &str,
    input: &UserInput,
    allow_role: bool,
) -> Result<User> {
    input.validate(false)?;
    if !allow_role && input.role.is_some() {
        return Err(Error::invalid("role", "You cannot change your own role"));
    }

    let email = input.normalized_email();
    if let Some(email) = &email {
        ensure_email_free(db, email, Some(id)).await?;
    }

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE users SET version = version + 1, updated_at = ");
    qb.push_bind(time::now());
    if let Some(name) = input.name.as_deref().map(str::trim) {
        qb.push(", name = ").push_bind(name.to_string());
    }
    if let Some(email) = email {
        qb.push(", email = ").push_bind(email);
    }
    if let Some(role) = &input.role {
        qb.push(", role = ").push_bind(role.clone());
    }
    if let Some(photo) = &input.photo {
        qb.push(", photo = ").push_bind(photo.clone());
    }
    qb.push(" WHERE guid = ").push_bind(id.to_string());
    qb.push(" AND active = 1 RETURNING *");

    let row = qb
        .build()
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No user found with id {}", id)))?;

    Ok(User::from_row(&row)?)
}

/// Soft delete: the user stays in place (with their reviews) but can no
/// longer authenticate or appear in lists
pub async fn deactivate_user(db: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET active = 0, version = version + 1, updated_at = ? WHERE guid = ? AND active = 1",
    )
    .bind(time::now())
    .bind(id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("No user found with id {}", id)));
    }
    Ok(())
}

/// Hard delete; the user's reviews cascade and the tours they reviewed are
/// refreshed afterwards
pub async fn delete_user(db: &SqlitePool, engine: &RatingsEngine, id: &str) -> Result<()> {
    let affected_tours = engine.begin_user_removal(id).await?;

    let result = sqlx::query("DELETE FROM users WHERE guid = ?")
        .bind(id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("No user found with id {}", id)));
    }

    engine.commit_user_removal(affected_tours).await;
    Ok(())
}
