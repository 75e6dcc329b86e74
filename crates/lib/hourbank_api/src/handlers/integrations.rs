//! Time provider integration handlers.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use hourbank_core::dates::sync_range;
use hourbank_core::ingest::{SyncRequest, SyncSummary, sync_configured_tenant, verify_credentials};
use hourbank_core::models::provider::{Connection, IdentityLink, mask_secret};
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::JsonBody;
use crate::middleware::auth::{AuthenticatedUser, ensure_hr};
use crate::models::{
    ConnectionRequest, ConnectionResponse, IntegrationStatusResponse, LinkBody, LinksResponse,
    SyncBody,
};

/// Unmapped employees listed on the status page.
const UNMAPPED_PREVIEW_LIMIT: i64 = 20;

fn connection_response(connection: Option<Connection>) -> ConnectionResponse {
    match connection {
        None => ConnectionResponse::default(),
        Some(c) => ConnectionResponse {
            configured: true,
            workspace_id: Some(c.workspace_id),
            api_key_masked: Some(mask_secret(&c.api_key)),
            updated_by: c.updated_by,
            updated_at: Some(c.updated_at),
            users_found: None,
        },
    }
}

/// `GET /integrations/provider`: current configuration with a masked key.
pub async fn get_provider(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<ConnectionResponse>> {
    let connection = state.store.get_connection(user.tenant_id()).await?;
    Ok(Json(connection_response(connection)))
}

/// `POST /integrations/provider`: validate a credential, then store it.
pub async fn save_provider(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    JsonBody(body): JsonBody<ConnectionRequest>,
) -> AppResult<Json<ConnectionResponse>> {
    let api_key = body.api_key.trim();
    let workspace_id = body.workspace_id.trim();
    if api_key.is_empty() || workspace_id.is_empty() {
        return Err(AppError::Validation(
            "api_key and workspace_id are required".into(),
        ));
    }

    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();
    let users = verify_credentials(state.providers.as_ref(), workspace_id, api_key, &cancel).await?;

    let connection = state
        .store
        .upsert_connection(user.tenant_id(), workspace_id, api_key, Some(user.user_id()))
        .await?;
    info!(
        tenant_id = user.tenant_id(),
        users_found = users.len(),
        "provider connection saved"
    );

    let mut response = connection_response(Some(connection));
    response.users_found = Some(users.len());
    Ok(Json(response))
}

/// `GET /integrations/provider/status`: sync and mapping statistics.
pub async fn get_status(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<IntegrationStatusResponse>> {
    let tenant_id = user.tenant_id();
    let configured = state.store.get_connection(tenant_id).await?.is_some();
    let stats = state
        .store
        .integration_stats(tenant_id, Utc::now(), UNMAPPED_PREVIEW_LIMIT)
        .await?;
    Ok(Json(IntegrationStatusResponse { configured, stats }))
}

/// `POST /integrations/provider/sync`: run a sync pass for the caller's tenant.
///
/// The pass is cancelled if the request is dropped or the server shuts down.
pub async fn sync(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    body: Option<JsonBody<SyncBody>>,
) -> AppResult<Json<SyncSummary>> {
    let body = body.map(|JsonBody(b)| b).unwrap_or_default();
    if body.allow_closed_period {
        ensure_hr(&user, "allow_closed_period")?;
    }
    let range = sync_range(
        body.start_date.as_deref(),
        body.end_date.as_deref(),
        Utc::now().date_naive(),
    )
    .map_err(AppError::Validation)?;

    let request = SyncRequest {
        tenant_id: user.tenant_id(),
        range,
        allow_closed_period: body.allow_closed_period,
    };
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();
    let summary =
        sync_configured_tenant(state.store.as_ref(), state.providers.as_ref(), &request, &cancel)
            .await?;
    Ok(Json(summary))
}

/// `GET /integrations/provider/links`: persisted identity links.
pub async fn list_links(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<LinksResponse>> {
    let links = state.store.list_links(user.tenant_id()).await?;
    Ok(Json(LinksResponse { links }))
}

/// `PUT /integrations/provider/links`: link a provider user to an employee by hand.
pub async fn put_link(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    JsonBody(body): JsonBody<LinkBody>,
) -> AppResult<Json<IdentityLink>> {
    let tenant_id = user.tenant_id();
    let external_user_id = body.external_user_id.trim();
    if body.employee_id <= 0 {
        return Err(AppError::Validation("employee_id is required".into()));
    }
    if external_user_id.is_empty() {
        return Err(AppError::Validation("external_user_id is required".into()));
    }
    if state
        .store
        .get_employee(tenant_id, body.employee_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound("employee not found".into()));
    }

    let trimmed = |v: Option<String>| {
        v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    };
    let link = IdentityLink {
        tenant_id,
        employee_id: body.employee_id,
        external_user_id: external_user_id.to_string(),
        external_user_name: trimmed(body.external_user_name),
        external_user_email: trimmed(body.external_user_email),
        last_synced_at: None,
    };
    let saved = state.store.replace_link(&link).await?;
    info!(
        tenant_id,
        employee_id = saved.employee_id,
        external_user_id = %saved.external_user_id,
        "identity link set"
    );
    Ok(Json(saved))
}
