//! Webhook models for endpoint registration and wallet event delivery.
//!
//! # Webhook Flow
//!
//! 1. An admin registers a webhook endpoint via `POST /api/admin/webhooks`
//! 2. System generates a secret for HMAC signature verification
//! 3. When a wallet changes, the notification dispatcher sends a signed payload
//! 4. The receiver verifies the signature using the secret
//!
//! # Security
//!
//! - Secrets are only shown once during registration
//! - Payloads are signed using HMAC-SHA256
//! - HTTPS is required for production endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::notification_service::WalletEvent;

/// Webhook endpoint registered by an admin.
///
/// # Secret Storage
///
/// The `secret` is stored in plaintext (required for HMAC generation)
/// but never returned in list operations.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub api_key_id: Uuid,
    pub url: String,
    pub secret: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Request to register a new webhook endpoint.
///
/// # Validation
///
/// - URL must be valid HTTPS (HTTP allowed for localhost in development)
/// - URL must not exceed 2048 characters
#[derive(Debug, Deserialize)]
pub struct WebhookEndpointRequest {
    pub url: String,
}

/// Response when registering or listing webhook endpoints.
///
/// The `secret` field is ONLY included when creating a new endpoint.
#[derive(Debug, Serialize)]
pub struct WebhookEndpointResponse {
    pub id: Uuid,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<WebhookEndpoint> for WebhookEndpointResponse {
    fn from(endpoint: WebhookEndpoint) -> Self {
        Self {
            id: endpoint.id,
            url: endpoint.url,
            secret: None, // Never include secret by default
            is_active: endpoint.is_active,
            created_at: endpoint.created_at,
        }
    }
}

impl WebhookEndpointResponse {
    /// Create response with secret included (only for registration).
    pub fn with_secret(mut self, secret: String) -> Self {
        self.secret = Some(secret);
        self
    }
}

/// Body POSTed to webhook endpoints.
///
/// # Example
///
/// ```json
/// {
///   "event_type": "withdrawal.declined",
///   "event_id": "550e8400-e29b-41d4-a716-446655440000",
///   "vendor_id": "0f8fad5b-d9cb-469f-a165-70867728950e",
///   "created_at": "2025-01-15T10:30:00Z",
///   "data": { "withdrawal": { … }, "refund": { … } }
/// }
/// ```
///
/// # Signature Verification
///
/// The request carries an `X-Webhook-Signature` header of the form
/// `sha256=<hex_encoded_hmac>` computed as HMAC-SHA256(secret, json_body).
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub event_type: &'static str,
    pub event_id: Uuid,
    pub vendor_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub data: &'a WalletEvent,
}

impl<'a> WebhookPayload<'a> {
    pub fn new(event_id: Uuid, event: &'a WalletEvent) -> Self {
        Self {
            event_type: event.event_type(),
            event_id,
            vendor_id: event.vendor_id(),
            created_at: Utc::now(),
            data: event,
        }
    }
}
