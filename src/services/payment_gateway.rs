//! Payment gateway client.
//!
//! Creates orders for vendor deposits and verifies the signature the gateway returns
//! to the client after payment: HMAC-SHA256 over `"<order_id>|<payment_id>"` keyed with
//! the merchant secret.

use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError, services::signature};

#[derive(Debug, Clone)]
struct Credentials {
    base_url: String,
    key_id: String,
    key_secret: String,
}

/// Thin client over the gateway's REST API. Without credentials every call fails with
/// a gateway error, so the rest of the service runs unchanged in development.
#[derive(Debug, Clone)]
pub struct PaymentGateway {
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'static str,
    receipt: &'a str,
}

/// Order as returned by the gateway.
#[derive(Debug, Deserialize, Serialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

impl PaymentGateway {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        let credentials = match (
            &config.payment_gateway_url,
            &config.payment_key_id,
            &config.payment_key_secret,
        ) {
            (Some(base_url), Some(key_id), Some(key_secret)) => Some(Credentials {
                base_url: base_url.trim_end_matches('/').to_string(),
                key_id: key_id.clone(),
                key_secret: key_secret.clone(),
            }),
            _ => None,
        };

        if credentials.is_none() {
            tracing::warn!("Payment gateway credentials not configured; deposit orders disabled");
        }

        Self {
            client,
            credentials,
        }
    }

    #[cfg(test)]
    pub fn with_secret(secret: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials: Some(Credentials {
                base_url: "http://127.0.0.1:9".to_string(),
                key_id: "test_key".to_string(),
                key_secret: secret.to_string(),
            }),
        }
    }

    fn credentials(&self) -> Result<&Credentials, AppError> {
        self.credentials
            .as_ref()
            .ok_or_else(|| AppError::PaymentGateway("gateway is not configured".to_string()))
    }

    /// Create an INR order for `amount_paise`.
    ///
    /// Network and non-2xx failures surface immediately; there is no retry.
    pub async fn create_order(
        &self,
        amount_paise: i64,
        receipt: &str,
    ) -> Result<GatewayOrder, AppError> {
        let credentials = self.credentials()?;

        let response = self
            .client
            .post(format!("{}/v1/orders", credentials.base_url))
            .basic_auth(&credentials.key_id, Some(&credentials.key_secret))
            .json(&CreateOrderBody {
                amount: amount_paise,
                currency: "INR",
                receipt,
            })
            .send()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("order request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "Payment gateway rejected order");
            return Err(AppError::PaymentGateway(format!(
                "order creation returned {status}"
            )));
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("malformed order response: {e}")))
    }

    /// Check a client-supplied payment signature.
    pub fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature_hex: &str,
    ) -> Result<(), AppError> {
        let credentials = self.credentials()?;
        let message = format!("{order_id}|{payment_id}");

        if signature::verify_hex(&credentials.key_secret, &message, signature_hex)? {
            Ok(())
        } else {
            tracing::warn!(order_id, payment_id, "Payment signature mismatch");
            Err(AppError::PaymentVerificationFailed)
        }
    }
}
