//! Webhook service for managing endpoints and delivering wallet events.
//!
//! This module handles webhook endpoint registration, event delivery,
//! and signature generation for secure webhook verification.

use std::time::Duration;

use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::webhook::{
    WebhookEndpoint, WebhookEndpointRequest, WebhookEndpointResponse, WebhookPayload,
};
use crate::services::notification_service::WalletEvent;
use crate::services::signature;

/// Build the HTTP client used for deliveries.
pub fn delivery_client(timeout_secs: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

/// Create a new webhook endpoint.
///
/// # Process
///
/// 1. Validate URL format
/// 2. Generate cryptographically secure secret (32 bytes)
/// 3. Store endpoint in database
/// 4. Return endpoint with secret (only shown once)
pub async fn create_webhook_endpoint(
    pool: &DbPool,
    api_key_id: Uuid,
    request: WebhookEndpointRequest,
) -> Result<WebhookEndpointResponse, AppError> {
    validate_webhook_url(&request.url)?;

    let secret = generate_secret();

    let endpoint = sqlx::query_as::<_, WebhookEndpoint>(
        r#"
        INSERT INTO webhook_endpoints (api_key_id, url, secret)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(api_key_id)
    .bind(&request.url)
    .bind(&secret)
    .fetch_one(pool)
    .await?;

    tracing::info!(endpoint_id = %endpoint.id, url = %endpoint.url, "Webhook endpoint registered");

    Ok(WebhookEndpointResponse::from(endpoint).with_secret(secret))
}

/// List all active webhook endpoints. Secrets are not returned.
pub async fn list_webhook_endpoints(
    pool: &DbPool,
) -> Result<Vec<WebhookEndpointResponse>, AppError> {
    let endpoints = sqlx::query_as::<_, WebhookEndpoint>(
        "SELECT * FROM webhook_endpoints WHERE is_active = true ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(endpoints.into_iter().map(Into::into).collect())
}

/// Delete a webhook endpoint (soft delete, preserving delivery history).
pub async fn delete_webhook_endpoint(pool: &DbPool, endpoint_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE webhook_endpoints SET is_active = false WHERE id = $1 AND is_active = true",
    )
    .bind(endpoint_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::WebhookNotFound);
    }

    Ok(())
}

/// Deliver one wallet event to every active endpoint.
///
/// Individual delivery failures are logged and recorded; they never stop delivery to
/// the remaining endpoints.
pub async fn deliver_event(
    pool: &DbPool,
    client: &reqwest::Client,
    event: &WalletEvent,
) -> Result<(), AppError> {
    let endpoints = sqlx::query_as::<_, WebhookEndpoint>(
        "SELECT * FROM webhook_endpoints WHERE is_active = true",
    )
    .fetch_all(pool)
    .await?;

    for endpoint in endpoints {
        if let Err(e) = send_webhook(pool, client, &endpoint, event).await {
            tracing::error!("Failed to send webhook to {}: {:?}", endpoint.url, e);
        }
    }

    Ok(())
}

/// Send a single webhook with HMAC signature and record the attempt.
///
/// # Headers Sent
///
/// - `Content-Type: application/json`
/// - `X-Webhook-Signature: sha256=<hex>`
/// - `X-Webhook-Event-Id: <uuid>`
/// - `X-Webhook-Event-Type: <event type>`
async fn send_webhook(
    pool: &DbPool,
    client: &reqwest::Client,
    endpoint: &WebhookEndpoint,
    event: &WalletEvent,
) -> Result<(), AppError> {
    let event_id = Uuid::new_v4();

    let payload = WebhookPayload::new(event_id, event);
    let payload_value = serde_json::to_value(&payload)
        .map_err(|e| AppError::Validation(format!("Failed to serialize payload: {}", e)))?;
    let payload_json = payload_value.to_string();

    let signature = generate_signature(&endpoint.secret, &payload_json)?;

    let response = client
        .post(&endpoint.url)
        .header("Content-Type", "application/json")
        .header("X-Webhook-Signature", &signature)
        .header("X-Webhook-Event-Id", event_id.to_string())
        .header("X-Webhook-Event-Type", event.event_type())
        .body(payload_json)
        .send()
        .await;

    let (status, body) = match response {
        Ok(resp) => {
            let status = i32::from(resp.status().as_u16());
            if !resp.status().is_success() {
                tracing::warn!(url = %endpoint.url, status, "Webhook endpoint rejected event");
            }
            (Some(status), resp.text().await.ok())
        }
        Err(e) => {
            let error_msg = format!("Request failed: {}", e);
            tracing::error!("{}", error_msg);
            (None, Some(error_msg))
        }
    };

    sqlx::query(
        r#"
        INSERT INTO webhook_events (
            event_id,
            webhook_endpoint_id,
            event_type,
            vendor_id,
            payload,
            response_status,
            response_body
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(event_id)
    .bind(endpoint.id)
    .bind(event.event_type())
    .bind(event.vendor_id())
    .bind(payload_value)
    .bind(status)
    .bind(body)
    .execute(pool)
    .await?;

    Ok(())
}

/// Generate the `X-Webhook-Signature` header value: `sha256=<hex_encoded_hmac>`.
fn generate_signature(secret: &str, payload: &str) -> Result<String, AppError> {
    Ok(format!("sha256={}", signature::sign_hex(secret, payload)?))
}

/// Generate cryptographically secure random secret (64 hex characters).
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Validate webhook URL format.
///
/// # Rules
///
/// - Must be valid URL
/// - Must be HTTPS (HTTP localhost allowed for development)
/// - Maximum 2048 characters
fn validate_webhook_url(url: &str) -> Result<(), AppError> {
    if url.len() > 2048 {
        return Err(AppError::InvalidWebhookUrl(
            "URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidWebhookUrl("Invalid URL format".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            if matches!(
                parsed.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("0.0.0.0")
            ) {
                Ok(())
            } else {
                Err(AppError::InvalidWebhookUrl(
                    "HTTP is only allowed for localhost. Use HTTPS for production.".to_string(),
                ))
            }
        }
        _ => Err(AppError::InvalidWebhookUrl(
            "URL must use HTTP or HTTPS".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https_and_local_http() {
        assert!(validate_webhook_url("https://hooks.example.com/wallet").is_ok());
        assert!(validate_webhook_url("http://localhost:8080/hook").is_ok());
        assert!(validate_webhook_url("http://127.0.0.1/hook").is_ok());
    }

    #[test]
    fn rejects_plain_http_and_other_schemes() {
        assert!(matches!(
            validate_webhook_url("http://hooks.example.com"),
            Err(AppError::InvalidWebhookUrl(_))
        ));
        assert!(validate_webhook_url("ftp://example.com").is_err());
        assert!(validate_webhook_url("not a url").is_err());
        let long = format!("https://example.com/{}", "a".repeat(2048));
        assert!(validate_webhook_url(&long).is_err());
    }

    #[test]
    fn signature_header_is_prefixed_and_verifiable() {
        let header = generate_signature("whsec", "{\"a\":1}").unwrap();
        let hex_part = header.strip_prefix("sha256=").unwrap();
        assert!(signature::verify_hex("whsec", "{\"a\":1}", hex_part).unwrap());
    }

    #[test]
    fn secrets_are_64_hex_chars_and_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
