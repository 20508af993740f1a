//! db - postgres-backed account storage
//!
//! two tables, `profile_information` and `profile_authentication`, mirror
//! `core/db.py`'s `profile.information` / `profile.authentication` rows.
//! Only the `auth` adapter and the binary's startup code touch this
//! module; the core (board/game/registry/dispatch/peer) never imports it.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// a stored account plus its credentials row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountCredentials {
    pub user_id: i64,
    pub username: String,
    pub salt: String,
    pub password_hash: String,
}

/// connects to `database_url` and runs the embedded migrations.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// looks up an account plus credentials by username, if one exists
pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<AccountCredentials>, sqlx::Error> {
    sqlx::query_as::<_, AccountCredentials>(
        r#"
        SELECT i.id AS user_id, i.username, a.salt, a.password_hash
        FROM profile_information i
        JOIN profile_authentication a ON a.user_id = i.id
        WHERE i.username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

/// inserts a fresh account + credentials row in one transaction; fails if
/// `username` is already taken (unique constraint on `profile_information`).
pub async fn create_account(
    pool: &PgPool,
    username: &str,
    salt: &str,
    password_hash: &str,
) -> Result<i64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let user_id: i64 = sqlx::query_scalar("INSERT INTO profile_information (username) VALUES ($1) RETURNING id")
        .bind(username)
        .fetch_one(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO profile_authentication (user_id, salt, password_hash) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(salt)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(user_id)
}
