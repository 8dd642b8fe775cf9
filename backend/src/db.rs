use std::str::FromStr;

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use validator::Validate;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{Group, User};
use crate::serializers::{BLANK, validation_errors};

// Setup the database and execute any migrations
pub async fn setup_database(config: &AppConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database.url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(options)
        .await?;

    if config.database.run_migrations {
        migrate(&pool).await?;
    }

    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Migrations executed");
    Ok(())
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(e) if e.is_unique_violation())
}

#[derive(Debug, Validate)]
pub struct NewUser {
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub username: String,
}

#[derive(Debug, Validate)]
pub struct NewGroup {
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub title: String,
    pub slug: String,
    pub description: String,
}

pub async fn create_user(pool: &SqlitePool, new: NewUser) -> Result<User, AppError> {
    let mut errors = new.validate().err().map(validation_errors).unwrap_or_default();
    if new.username.is_empty() {
        errors
            .entry("username".to_string())
            .or_default()
            .push(BLANK.to_string());
    } else if !new
        .username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        errors.entry("username".to_string()).or_default().push(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        );
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, username_folded, is_active, date_joined) VALUES (?, ?, 1, ?)
         RETURNING id, username, is_active, date_joined",
    )
    .bind(&new.username)
    .bind(new.username.to_lowercase())
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::field("username", "A user with that username already exists.")
        } else {
            AppError::from(e)
        }
    })?;

    tracing::info!(user_id = user.id, username = %user.username, "user created");
    Ok(user)
}

/// Removes the user together with their posts, comments and follows.
pub async fn delete_user(pool: &SqlitePool, username: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE username = ?")
        .bind(username)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_user_active(
    pool: &SqlitePool,
    username: &str,
    active: bool,
) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE users SET is_active = ? WHERE username = ?")
        .bind(active)
        .bind(username)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_user(pool: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, is_active, date_joined FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn find_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, is_active, date_joined FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn create_group(pool: &SqlitePool, new: NewGroup) -> Result<Group, AppError> {
    let mut errors = new.validate().err().map(validation_errors).unwrap_or_default();
    if new.title.trim().is_empty() {
        errors
            .entry("title".to_string())
            .or_default()
            .push(BLANK.to_string());
    }
    if new.slug.is_empty()
        || !new
            .slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        errors.entry("slug".to_string()).or_default().push(
            "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens."
                .to_string(),
        );
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let group = sqlx::query_as::<_, Group>(
        "INSERT INTO post_groups (title, slug, description) VALUES (?, ?, ?)
         RETURNING id, title, slug, description",
    )
    .bind(&new.title)
    .bind(&new.slug)
    .bind(&new.description)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::field("slug", "group with this slug already exists.")
        } else {
            AppError::from(e)
        }
    })?;

    tracing::info!(group_id = group.id, slug = %group.slug, "group created");
    Ok(group)
}

/// Removes the group; its posts stay and lose their group reference.
pub async fn delete_group(pool: &SqlitePool, slug: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM post_groups WHERE slug = ?")
        .bind(slug)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_pool;

    #[tokio::test]
    async fn usernames_are_unique() {
        let pool = memory_pool().await;
        create_user(&pool, NewUser { username: "alice".into() }).await.unwrap();

        let err = create_user(&pool, NewUser { username: "alice".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.contains_key("username")));
    }

    #[tokio::test]
    async fn rejects_bad_slug_and_long_title() {
        let pool = memory_pool().await;
        let err = create_group(
            &pool,
            NewGroup {
                title: "t".repeat(201),
                slug: "not a slug".into(),
                description: String::new(),
            },
        )
        .await
        .unwrap_err();

        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("title"));
        assert!(errors.contains_key("slug"));
    }

    #[tokio::test]
    async fn deleting_missing_rows_reports_false() {
        let pool = memory_pool().await;
        assert!(!delete_user(&pool, "ghost").await.unwrap());
        assert!(!delete_group(&pool, "ghost").await.unwrap());
    }
}
