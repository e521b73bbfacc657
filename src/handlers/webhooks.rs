//! HTTP handlers for webhook endpoint management.
//!
//! Admins register the endpoints that receive signed wallet events.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::handlers::ApiResponse;
use crate::middleware::auth::AuthContext;
use crate::models::webhook::{WebhookEndpointRequest, WebhookEndpointResponse};
use crate::services::webhook_service;

/// Register a new webhook endpoint.
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://example.com/webhook"
/// }
/// ```
///
/// # Response
///
/// Returns 201 Created with the webhook endpoint details.
/// The `secret` is only returned once during creation.
///
/// # Security
///
/// - HTTPS URLs required (HTTP localhost allowed for development)
/// - Secret is 64-character hex string for HMAC-SHA256
pub async fn create_webhook(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<WebhookEndpointRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WebhookEndpointResponse>>), AppError> {
    let endpoint =
        webhook_service::create_webhook_endpoint(&pool, auth.api_key_id, request).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Webhook endpoint registered", endpoint),
    ))
}

/// List all active webhook endpoints. Secrets are never returned here.
pub async fn list_webhooks(
    State(pool): State<DbPool>,
) -> Result<Json<ApiResponse<Vec<WebhookEndpointResponse>>>, AppError> {
    let webhooks = webhook_service::list_webhook_endpoints(&pool).await?;

    Ok(ApiResponse::ok(webhooks))
}

/// Delete a webhook endpoint (soft delete).
///
/// Sets `is_active = false` to preserve delivery history. Returns 204 No Content.
pub async fn delete_webhook(
    State(pool): State<DbPool>,
    Path(webhook_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    webhook_service::delete_webhook_endpoint(&pool, webhook_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
