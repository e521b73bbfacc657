//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Resolves amounts and the caller's wallet
//! 3. Calls a service and wraps the result in [`ApiResponse`]

use axum::{Json, http::StatusCode};
use serde::Serialize;

use crate::services::wallet_service::Recorded;

/// Admin wallet operations
pub mod admin;
/// Liveness probe
pub mod health;
/// Vendor wallet endpoints
pub mod wallet;
/// Admin webhook management
pub mod webhooks;
/// Withdrawal request workflow
pub mod withdrawals;

/// Success envelope shared by every endpoint.
///
/// ```json
/// { "success": true, "message": "Deposit recorded", "data": { … } }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data,
        })
    }
}

/// 201 for a new ledger entry, 200 when an identical settlement already existed.
pub(crate) fn recorded(
    what: &str,
    recorded: Recorded,
) -> (StatusCode, Json<ApiResponse<Recorded>>) {
    if recorded.duplicate {
        (
            StatusCode::OK,
            ApiResponse::with_message(format!("{what} already recorded"), recorded),
        )
    } else {
        (
            StatusCode::CREATED,
            ApiResponse::with_message(format!("{what} recorded"), recorded),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_absent_message() {
        let Json(body) = ApiResponse::ok(5);
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value, serde_json::json!({ "success": true, "data": 5 }));
    }

    #[test]
    fn envelope_carries_message() {
        let Json(body) = ApiResponse::with_message("Done", "x");
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["message"], "Done");
        assert_eq!(value["data"], "x");
    }
}
