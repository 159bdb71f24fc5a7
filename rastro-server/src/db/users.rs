//! User table operations

use rastro_common::db::models::User;
use rastro_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Check whether an email is already registered
pub async fn email_exists(db: &SqlitePool, email: &str) -> Result<bool> {
    let existing: Option<String> =
        sqlx::query_scalar("SELECT guid FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(db)
            .await?;
    Ok(existing.is_some())
}

/// Insert a new user and return the created row
pub async fn insert_user(db: &SqlitePool, email: &str, password_hash: &str) -> Result<User> {
    let guid = Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().to_rfc3339();

    sqlx::query("INSERT INTO users (guid, email, password_hash, created_at) VALUES (?, ?, ?, ?)")
        .bind(&guid)
        .bind(email)
        .bind(password_hash)
        .bind(&created_at)
        .execute(db)
        .await?;

    Ok(User {
        guid,
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        created_at,
    })
}

/// Look up a user by email
pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT guid, email, password_hash, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rastro_common::db::init_memory_database;

    #[tokio::test]
    async fn test_insert_and_find_user() {
        let db = init_memory_database().await.unwrap();

        assert!(!email_exists(&db, "a@example.com").await.unwrap());

        let user = insert_user(&db, "a@example.com", "hash").await.unwrap();
        assert!(email_exists(&db, "a@example.com").await.unwrap());

        let found = find_by_email(&db, "a@example.com").await.unwrap().unwrap();
        assert_eq!(found.guid, user.guid);
        assert_eq!(found.password_hash, "hash");

        assert!(find_by_email(&db, "b@example.com").await.unwrap().is_none());
    }
}
