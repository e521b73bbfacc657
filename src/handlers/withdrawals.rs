//! Withdrawal request handlers.
//!
//! Vendors open requests against their own wallet; admins list and settle them.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::ApiResponse,
    middleware::auth::AuthContext,
    models::{
        money::require_positive,
        pagination::{Page, PageParams},
        withdrawal::{
            CreateWithdrawalRequest, SettleWithdrawalRequest, WithdrawalQuery, WithdrawalRequest,
        },
    },
    services::withdrawal_service::{self, CreatedWithdrawal},
    state::AppState,
};

/// Open a withdrawal request.
///
/// # Request Body
///
/// ```json
/// { "amount": 6000 }
/// ```
///
/// # Rules
///
/// - Available balance (balance above the security deposit) must be at least ₹5,000
/// - `0 < amount <= available`
/// - Only one pending request per vendor (409 `duplicate_pending_request`)
///
/// The amount is debited immediately and held as a pending entry until an admin
/// approves or declines the request.
pub async fn create_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedWithdrawal>>), AppError> {
    let vendor_id = auth.vendor_id()?;
    let amount_paise = require_positive("amount", &request.amount)?;

    let created = withdrawal_service::create_withdrawal_request(
        &state.pool,
        &state.notifier,
        &state.settings,
        vendor_id,
        amount_paise,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Withdrawal request submitted", created),
    ))
}

/// The caller's own requests, newest first.
pub async fn list_own_withdrawals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<WithdrawalQuery>,
) -> Result<Json<ApiResponse<Page<WithdrawalRequest>>>, AppError> {
    let vendor_id = auth.vendor_id()?;
    let page = withdrawal_service::list_withdrawals(
        &state.pool,
        Some(vendor_id),
        query.status,
        PageParams::new(query.page, query.limit),
    )
    .await?;

    Ok(ApiResponse::ok(page))
}

/// `GET /api/admin/withdrawals?status=pending`
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Query(query): Query<WithdrawalQuery>,
) -> Result<Json<ApiResponse<Page<WithdrawalRequest>>>, AppError> {
    let page = withdrawal_service::list_withdrawals(
        &state.pool,
        None,
        query.status,
        PageParams::new(query.page, query.limit),
    )
    .await?;

    Ok(ApiResponse::ok(page))
}

pub async fn approve_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<SettleWithdrawalRequest>>,
) -> Result<Json<ApiResponse<WithdrawalRequest>>, AppError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();

    let request = withdrawal_service::approve_withdrawal(
        &state.pool,
        &state.notifier,
        request_id,
        &auth.owner_name,
        body.admin_notes,
    )
    .await?;

    Ok(ApiResponse::with_message("Withdrawal approved", request))
}

/// Decline a pending request; the debited amount is refunded to the wallet.
pub async fn decline_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<SettleWithdrawalRequest>>,
) -> Result<Json<ApiResponse<WithdrawalRequest>>, AppError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();

    let request = withdrawal_service::decline_withdrawal(
        &state.pool,
        &state.notifier,
        request_id,
        &auth.owner_name,
        body.admin_notes,
    )
    .await?;

    Ok(ApiResponse::with_message("Withdrawal declined", request))
}
