//! Authentication middleware: Bearer token extraction, JWT verification and
//! the role gate for time-bank routes.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use hourbank_core::auth::{TokenClaims, verify_access_token};

use crate::AppState;
use crate::error::AppError;

/// Key used to store `TokenClaims` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenClaims);

impl AuthenticatedUser {
    pub fn tenant_id(&self) -> i64 {
        self.0.tenant_id
    }

    pub fn user_id(&self) -> &str {
        &self.0.sub
    }
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the JWT,
/// and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let claims = verify_access_token(token, state.config.jwt_secret.as_bytes())
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;

    if claims.tenant_id <= 0 {
        return Err(AppError::Unauthorized("Token has no tenant".into()));
    }

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

/// Axum middleware: only owners and HR may reach the wrapped routes.
/// Must run after [`require_auth`].
pub async fn require_manager(request: Request, next: Next) -> Result<Response, AppError> {
    let allowed = request
        .extensions()
        .get::<AuthenticatedUser>()
        .is_some_and(|u| u.0.can_manage_time_bank());
    if !allowed {
        return Err(AppError::Forbidden("owner or hr role required".into()));
    }
    Ok(next.run(request).await)
}

/// Handler-level check for HR-only options.
pub fn ensure_hr(user: &AuthenticatedUser, what: &str) -> Result<(), AppError> {
    if user.0.is_hr() {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("{what} requires the hr role")))
    }
}
