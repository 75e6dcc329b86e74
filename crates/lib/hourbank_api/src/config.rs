//! API server configuration.

use hourbank_core::auth::{AuthError, resolve_jwt_secret};

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Secret used to verify access tokens.
    pub jwt_secret: String,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable       | Default                                  |
    /// |----------------|------------------------------------------|
    /// | `BIND_ADDR`    | `127.0.0.1:8080`                         |
    /// | `DATABASE_URL` | `postgres://localhost:5432/hourbank`     |
    /// | `JWT_SECRET`   | required                                 |
    pub fn from_env() -> Result<Self, AuthError> {
        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/hourbank".into()),
            jwt_secret: resolve_jwt_secret()?,
        })
    }
}
