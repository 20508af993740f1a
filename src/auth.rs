//! auth - login/register adapters
//!
//! mirrors `handlers/login.py` / `handlers/register.py`: bcrypt-family
//! password hashing, a bearer token on success. The Python prototype
//! returns the literal placeholder token `"test"`; here a random opaque
//! token is minted instead, since nothing downstream inspects its shape.

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::db;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username or password is incorrect")]
    InvalidCredentials,
    #[error("Username already exists")]
    UsernameTaken,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthSuccess {
    pub token: String,
    pub user_id: i64,
}

/// verifies `username`/`password` against the stored credentials row.
pub async fn login(pool: &PgPool, username: &str, password: &str) -> Result<AuthSuccess, AuthError> {
    let account = db::find_by_username(pool, username).await?.ok_or(AuthError::InvalidCredentials)?;
    if !bcrypt::verify(password, &account.password_hash)? {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(AuthSuccess { token: Uuid::new_v4().to_string(), user_id: account.user_id })
}

/// creates a new account with a freshly salted bcrypt hash; fails if
/// `username` is already registered.
pub async fn register(pool: &PgPool, username: &str, password: &str) -> Result<AuthSuccess, AuthError> {
    if db::find_by_username(pool, username).await?.is_some() {
        return Err(AuthError::UsernameTaken);
    }
    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    // bcrypt embeds its own salt in the hash string; we still persist a
    // salt column to match the source table layout (core/db.py), deriving
    // it from the hash's own salt segment.
    let salt = password_hash.splitn(4, '$').nth(3).map(|s| s[..22].to_string()).unwrap_or_default();
    let user_id = db::create_account(pool, username, &salt, &password_hash).await?;
    Ok(AuthSuccess { token: Uuid::new_v4().to_string(), user_id })
}
