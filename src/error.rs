//! error - binary-edge error type
//!
//! startup failures (bad config, unreachable database) are the only place
//! this process exits non-zero; everything past that point is absorbed by
//! the dispatcher or the peer adapter and turned into a payload instead.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
}
