//! Admin wallet handlers.
//!
//! Admin routes never create wallets; acting on an unknown vendor is a 404.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::{ApiResponse, recorded},
    middleware::auth::AuthContext,
    models::{
        money::{AmountInput, require_positive},
        pagination::{Page, PageParams},
        transaction::{TransactionQuery, WalletTransaction},
        wallet::{Eligibility, ReconciliationReport, VendorWallet},
    },
    services::wallet_service,
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct WalletListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Signed correction with a mandatory reason.
///
/// ```json
/// { "amount": "-250", "reason": "Duplicate earning reversed" }
/// ```
#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    pub amount: AmountInput,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct DirectWithdrawalRequest {
    pub amount: AmountInput,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WalletDetail {
    pub wallet: VendorWallet,
    pub available_balance_paise: i64,
    pub eligibility: Eligibility,
}

pub async fn list_wallets(
    State(state): State<AppState>,
    Query(query): Query<WalletListQuery>,
) -> Result<Json<ApiResponse<Page<VendorWallet>>>, AppError> {
    let page =
        wallet_service::list_wallets(&state.pool, PageParams::new(query.page, query.limit)).await?;

    Ok(ApiResponse::ok(page))
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
) -> Result<Json<ApiResponse<WalletDetail>>, AppError> {
    let wallet = wallet_service::get_wallet(&state.pool, vendor_id)
        .await?
        .ok_or(AppError::WalletNotFound)?;

    Ok(ApiResponse::ok(WalletDetail {
        available_balance_paise: wallet.available_balance(),
        eligibility: Eligibility::of(&wallet, &state.settings),
        wallet,
    }))
}

pub async fn list_wallet_transactions(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<ApiResponse<Page<WalletTransaction>>>, AppError> {
    wallet_service::get_wallet(&state.pool, vendor_id)
        .await?
        .ok_or(AppError::WalletNotFound)?;
    let page = wallet_service::list_transactions(&state.pool, vendor_id, &query).await?;

    Ok(ApiResponse::ok(page))
}

/// Recompute the wallet from its ledger and report any drift.
pub async fn reconcile_wallet(
    State(state): State<AppState>,
    Path(vendor_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReconciliationReport>>, AppError> {
    let report = wallet_service::reconcile_wallet(&state.pool, vendor_id).await?;
    let message = if report.consistent {
        "Wallet is consistent with its ledger"
    } else {
        "Wallet does not match its ledger"
    };

    Ok(ApiResponse::with_message(message, report))
}

pub async fn manual_adjustment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(vendor_id): Path<Uuid>,
    Json(request): Json<AdjustmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let amount_paise = request
        .amount
        .to_paise()
        .map_err(|err| AppError::Validation(format!("amount: {err}")))?;

    let result = wallet_service::record_manual_adjustment(
        &state.pool,
        &state.notifier,
        vendor_id,
        amount_paise,
        &auth.owner_name,
        &request.reason,
    )
    .await?;

    Ok(recorded("Adjustment", result))
}

/// Pay out directly, bypassing the request workflow. Bounded by available balance.
pub async fn direct_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(vendor_id): Path<Uuid>,
    Json(request): Json<DirectWithdrawalRequest>,
) -> Result<impl IntoResponse, AppError> {
    let amount_paise = require_positive("amount", &request.amount)?;

    let result = wallet_service::record_direct_withdrawal(
        &state.pool,
        &state.notifier,
        vendor_id,
        amount_paise,
        &auth.owner_name,
        request.description,
    )
    .await?;

    Ok(recorded("Withdrawal", result))
}
