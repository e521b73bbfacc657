//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::money::format_paise;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and a stable rule code
/// that clients can branch on.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Invalid or missing API keys, wrong role
/// - **Resource Errors**: Wallet, withdrawal request, order or webhook not found
/// - **Business Logic Errors**: Operations that violate wallet rules
/// - **Validation Errors**: Invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Authenticated caller lacks the role the route needs.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request body or parameters are invalid.
    #[error("Invalid request")]
    Validation(String),

    /// A settlement calculation produced a negative amount.
    #[error("Calculation anomaly: {0}")]
    CalculationAnomaly(String),

    /// The wallet balance does not cover the debit.
    #[error(
        "Insufficient balance: required {}, available {}",
        format_paise(*required),
        format_paise(*available)
    )]
    InsufficientBalance { required: i64, available: i64 },

    /// Vendor has taken a first task but has not paid the mandatory deposit.
    #[error("Mandatory deposit required before accepting new tasks")]
    DepositRequired,

    #[error("Wallet not found")]
    WalletNotFound,

    #[error("Withdrawal request not found")]
    WithdrawalNotFound,

    #[error("Payment order not found")]
    PaymentOrderNotFound,

    #[error("Webhook not found")]
    WebhookNotFound,

    /// A second withdrawal request while one is still pending.
    #[error("A withdrawal request is already pending")]
    DuplicatePendingRequest,

    /// The requested status change is not allowed from the current status.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// The wallet changed between read and write.
    #[error("Wallet was modified concurrently, retry the request")]
    ConcurrentModification,

    /// Payment signature did not match.
    #[error("Payment verification failed")]
    PaymentVerificationFailed,

    /// Payment gateway unreachable or returned an error.
    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Invalid webhook URL: {0}")]
    InvalidWebhookUrl(String),
}

impl AppError {
    /// Stable snake_case code sent in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "internal_error",
            AppError::InvalidApiKey => "invalid_api_key",
            AppError::Forbidden(_) => "forbidden",
            AppError::Validation(_) => "validation_error",
            AppError::CalculationAnomaly(_) => "calculation_anomaly",
            AppError::InsufficientBalance { .. } => "insufficient_balance",
            AppError::DepositRequired => "deposit_required",
            AppError::WalletNotFound => "wallet_not_found",
            AppError::WithdrawalNotFound => "withdrawal_not_found",
            AppError::PaymentOrderNotFound => "payment_order_not_found",
            AppError::WebhookNotFound => "webhook_not_found",
            AppError::DuplicatePendingRequest => "duplicate_pending_request",
            AppError::InvalidStateTransition { .. } => "invalid_state_transition",
            AppError::ConcurrentModification => "concurrent_modification",
            AppError::PaymentVerificationFailed => "payment_verification_failed",
            AppError::PaymentGateway(_) => "payment_gateway_error",
            AppError::InvalidWebhookUrl(_) => "invalid_webhook_url",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::DepositRequired => StatusCode::FORBIDDEN,
            AppError::Validation(_)
            | AppError::CalculationAnomaly(_)
            | AppError::PaymentVerificationFailed
            | AppError::InvalidWebhookUrl(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::WalletNotFound
            | AppError::WithdrawalNotFound
            | AppError::PaymentOrderNotFound
            | AppError::WebhookNotFound => StatusCode::NOT_FOUND,
            AppError::DuplicatePendingRequest
            | AppError::InvalidStateTransition { .. }
            | AppError::ConcurrentModification => StatusCode::CONFLICT,
            AppError::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "success": false,
///   "message": "Human-readable error message",
///   "error": "insufficient_balance"
/// }
/// ```
///
/// Database errors are logged and replaced by a generic message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                "An internal error occurred".to_string()
            }
            AppError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "message": message,
            "error": self.code(),
        }));

        (self.status(), body).into_response()
    }
}
