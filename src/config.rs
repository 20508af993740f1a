//! config - environment-driven startup configuration
//!
//! loaded once at process start; a malformed value is a fatal startup
//! error (the one place this binary is allowed to fail hard, since it
//! happens before any peer connects).

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not a valid socket address: {1}")]
    InvalidBindAddr(String, std::net::AddrParseError),
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
}

/// startup configuration, read from the environment (with `.env` support
/// via `dotenvy`).
#[derive(Clone, Debug)]
pub struct Config {
    /// address the HTTP/websocket listener binds to
    pub bind_addr: SocketAddr,
    /// postgres connection string for the `db` adapter
    pub database_url: String,
    /// base URL used to build the `create_session` join link
    pub base_url: String,
}

impl Config {
    /// reads `BIND_ADDR` (default `0.0.0.0:8080`), `DATABASE_URL`
    /// (required), and `BASE_URL` (default `http://localhost:8080/`) from
    /// the environment. Call `dotenvy::dotenv()` before this if a `.env`
    /// file should be consulted.
    pub fn from_env() -> Result<Config, ConfigError> {
        let bind_addr_raw = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_addr = bind_addr_raw
            .parse()
            .map_err(|e| ConfigError::InvalidBindAddr(bind_addr_raw.clone(), e))?;

        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let base_url = std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080/".to_string());

        Ok(Config { bind_addr, database_url, base_url })
    }

    /// the join link for a freshly created lobby session
    pub fn lobby_link(&self, code: &str) -> String {
        format!("{}/lobby/{code}", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_link_joins_base_url_and_code() {
        let config = Config { bind_addr: "0.0.0.0:8080".parse().unwrap(), database_url: String::new(), base_url: "http://example.com".to_string() };
        assert_eq!(config.lobby_link("ABCD"), "http://example.com/lobby/ABCD");
    }

    #[test]
    fn lobby_link_tolerates_trailing_slash_in_base_url() {
        let config = Config { bind_addr: "0.0.0.0:8080".parse().unwrap(), database_url: String::new(), base_url: "http://example.com/".to_string() };
        assert_eq!(config.lobby_link("ABCD"), "http://example.com/lobby/ABCD");
    }
}
