//! Access token claims and verification.
//!
//! Tokens are HS256 JWTs minted by the identity service. This crate only
//! verifies them; [`issue_access_token`] exists for tooling and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TenantId;

/// Default lifetime of tokens issued by [`issue_access_token`].
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 15 * 60;

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_HR: &str = "hr";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT_SECRET is not set")]
    MissingSecret,

    #[error("Token error: {0}")]
    TokenError(String),
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id.
    pub sub: String,
    pub tenant_id: TenantId,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl TokenClaims {
    /// Owners and HR may use the time-bank.
    pub fn can_manage_time_bank(&self) -> bool {
        self.role == ROLE_OWNER || self.role == ROLE_HR
    }

    /// Only HR may write into closed periods.
    pub fn is_hr(&self) -> bool {
        self.role == ROLE_HR
    }
}

/// Sign a token for `user_id` in `tenant_id`.
pub fn issue_access_token(
    user_id: &str,
    tenant_id: TenantId,
    role: &str,
    ttl: Duration,
    secret: &[u8],
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = TokenClaims {
        sub: user_id.to_string(),
        tenant_id,
        role: role.to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
}

/// Verify a token, returning its claims when the signature and expiry hold.
pub fn verify_access_token(token: &str, secret: &[u8]) -> Option<TokenClaims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<TokenClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

/// Read `JWT_SECRET` from the environment.
pub fn resolve_jwt_secret() -> Result<String, AuthError> {
    std::env::var("JWT_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::MissingSecret)
}
