//! Vendor wallet HTTP handlers.
//!
//! Every route here acts on the wallet named by the caller's vendor API key:
//! - GET  /api/vendor/wallet - balance, totals, eligibility and recent entries
//! - GET  /api/vendor/wallet/transactions - filtered, paginated ledger
//! - GET  /api/vendor/wallet/eligibility - task-acceptance gate
//! - POST /api/vendor/wallet/earning - credit an online-paid task
//! - POST /api/vendor/wallet/penalty - debit a rejection/cancellation penalty
//! - POST /api/vendor/wallet/task-fee - debit the task acceptance fee
//! - POST /api/vendor/wallet/cash-collection - debit the platform share of a cash task
//! - POST /api/vendor/wallet/deposit - credit a deposit
//! - POST /api/vendor/wallet/deposit/order - create a payment gateway order
//! - POST /api/vendor/wallet/deposit/verify - verify a gateway payment and credit it

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    handlers::{ApiResponse, recorded},
    middleware::auth::AuthContext,
    models::{
        money::{AmountInput, AmountParsePolicy, AmountResolver, require_positive},
        pagination::Page,
        payment::{CreateOrderRequest, PaymentOrder, VerifyPaymentRequest},
        transaction::{PaymentMethod, PenaltyKind, TransactionQuery, WalletTransaction},
        wallet::{Eligibility, TaskSettlement, VendorWallet},
    },
    services::{wallet_calculation::SettlementInput, wallet_service},
    state::AppState,
};

const RECENT_TRANSACTIONS: i64 = 10;

/// Request body for earning and cash-collection settlements.
///
/// Amounts may be JSON numbers or strings such as `"₹1,180.00"`. Unparsable amounts
/// are handled per the configured parse policy.
///
/// ```json
/// {
///   "case_id": "CASE-1001",
///   "billing_amount": 1180,
///   "spare_amount": "180",
///   "travelling_amount": 100,
///   "payment_method": "online",
///   "gst_included": true
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct SettlementRequest {
    #[serde(alias = "caseId")]
    pub case_id: String,
    #[serde(default, alias = "billingAmount")]
    pub billing_amount: Option<AmountInput>,
    #[serde(default, alias = "spareAmount")]
    pub spare_amount: Option<AmountInput>,
    #[serde(default, alias = "travellingAmount")]
    pub travelling_amount: Option<AmountInput>,
    #[serde(default, alias = "bookingAmount")]
    pub booking_amount: Option<AmountInput>,
    #[serde(default, alias = "paymentMethod")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, alias = "gstIncluded")]
    pub gst_included: bool,
    pub description: Option<String>,
}

impl SettlementRequest {
    fn into_settlement(
        self,
        policy: AmountParsePolicy,
        payment_method: PaymentMethod,
    ) -> Result<TaskSettlement, AppError> {
        let mut resolver = AmountResolver::new(policy);
        let input = SettlementInput {
            billing_paise: resolver.resolve("billing_amount", self.billing_amount.as_ref())?,
            spare_paise: resolver.resolve("spare_amount", self.spare_amount.as_ref())?,
            travelling_paise: resolver
                .resolve("travelling_amount", self.travelling_amount.as_ref())?,
            booking_paise: resolver.resolve("booking_amount", self.booking_amount.as_ref())?,
            payment_method,
            gst_included: self.gst_included,
        };
        input.validate()?;

        let mut settlement = TaskSettlement::new(self.case_id, input);
        settlement.defaulted_fields = resolver.into_defaulted();
        settlement.description = self.description;
        Ok(settlement)
    }
}

#[derive(Debug, Deserialize)]
pub struct PenaltyRequest {
    #[serde(alias = "caseId")]
    pub case_id: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: PenaltyKind,
    /// Overrides the configured default for the penalty kind.
    #[serde(default)]
    pub amount: Option<AmountInput>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TaskFeeRequest {
    #[serde(alias = "caseId")]
    pub case_id: String,
    #[serde(alias = "taskMRP", alias = "task_mrp_amount")]
    pub task_mrp: AmountInput,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: AmountInput,
    pub description: Option<String>,
}

/// Wallet overview returned by `GET /api/vendor/wallet`.
#[derive(Debug, Serialize)]
pub struct WalletSummary {
    pub wallet: VendorWallet,
    pub available_balance_paise: i64,
    pub eligibility: Eligibility,
    pub recent_transactions: Vec<WalletTransaction>,
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let vendor_id = auth.vendor_id()?;
    let wallet =
        wallet_service::get_or_create_wallet(&state.pool, vendor_id, &state.settings).await?;
    let recent_transactions =
        wallet_service::recent_transactions(&state.pool, vendor_id, RECENT_TRANSACTIONS).await?;

    Ok(ApiResponse::ok(WalletSummary {
        available_balance_paise: wallet.available_balance(),
        eligibility: Eligibility::of(&wallet, &state.settings),
        wallet,
        recent_transactions,
    }))
}

/// `GET /api/vendor/wallet/transactions?type=earning&status=completed&page=1&limit=20`
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<ApiResponse<Page<WalletTransaction>>>, AppError> {
    let vendor_id = auth.vendor_id()?;
    let page = wallet_service::list_transactions(&state.pool, vendor_id, &query).await?;

    Ok(ApiResponse::ok(page))
}

pub async fn eligibility(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Eligibility>>, AppError> {
    let vendor_id = auth.vendor_id()?;
    let wallet =
        wallet_service::get_or_create_wallet(&state.pool, vendor_id, &state.settings).await?;

    Ok(ApiResponse::ok(Eligibility::of(&wallet, &state.settings)))
}

/// Credit an online-paid task.
///
/// # Response
///
/// 201 with the new transaction, or 200 with the original one when the case was
/// already settled. Cash-paid tasks are rejected with a pointer to cash collection.
pub async fn record_earning(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<SettlementRequest>,
) -> Result<impl IntoResponse, AppError> {
    let vendor_id = auth.vendor_id()?;
    let payment_method = request.payment_method.unwrap_or(PaymentMethod::Online);
    let settlement =
        request.into_settlement(state.settings.amount_parse_policy, payment_method)?;

    let result = wallet_service::record_earning(
        &state.pool,
        &state.notifier,
        &state.settings,
        vendor_id,
        settlement,
    )
    .await?;

    Ok(recorded("Earning", result))
}

pub async fn record_penalty(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<PenaltyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let vendor_id = auth.vendor_id()?;
    let amount_paise = request
        .amount
        .as_ref()
        .map(|amount| require_positive("amount", amount))
        .transpose()?;

    let result = wallet_service::record_penalty(
        &state.pool,
        &state.notifier,
        &state.settings,
        vendor_id,
        &request.case_id,
        request.kind,
        amount_paise,
        request.description,
    )
    .await?;

    Ok(recorded("Penalty", result))
}

/// Debit the acceptance fee for a task.
///
/// Refused with `deposit_required` once the first task has been taken and the
/// mandatory deposit is still outstanding.
pub async fn record_task_fee(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<TaskFeeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let vendor_id = auth.vendor_id()?;
    let task_mrp_paise = require_positive("task_mrp", &request.task_mrp)?;

    let result = wallet_service::record_task_acceptance_fee(
        &state.pool,
        &state.notifier,
        &state.settings,
        vendor_id,
        &request.case_id,
        task_mrp_paise,
        request.description,
    )
    .await?;

    Ok(recorded("Task acceptance fee", result))
}

pub async fn record_cash_collection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<SettlementRequest>,
) -> Result<impl IntoResponse, AppError> {
    let vendor_id = auth.vendor_id()?;
    let settlement =
        request.into_settlement(state.settings.amount_parse_policy, PaymentMethod::Cash)?;

    let result = wallet_service::record_cash_collection(
        &state.pool,
        &state.notifier,
        &state.settings,
        vendor_id,
        settlement,
    )
    .await?;

    Ok(recorded("Cash collection", result))
}

pub async fn record_deposit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<DepositRequest>,
) -> Result<impl IntoResponse, AppError> {
    let vendor_id = auth.vendor_id()?;
    let amount_paise = require_positive("amount", &request.amount)?;

    let result = wallet_service::record_deposit(
        &state.pool,
        &state.notifier,
        &state.settings,
        vendor_id,
        amount_paise,
        request.description,
    )
    .await?;

    Ok(recorded("Deposit", result))
}

/// Create a gateway order the client pays against.
pub async fn create_deposit_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentOrder>>), AppError> {
    let vendor_id = auth.vendor_id()?;
    let amount_paise = require_positive("amount", &request.amount)?;

    let order = wallet_service::create_deposit_order(
        &state.pool,
        &state.gateway,
        &state.settings,
        vendor_id,
        amount_paise,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Deposit order created", order),
    ))
}

/// Verify the gateway's payment signature and credit the deposit once.
pub async fn verify_deposit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let vendor_id = auth.vendor_id()?;

    let result = wallet_service::verify_deposit_payment(
        &state.pool,
        &state.notifier,
        &state.gateway,
        &state.settings,
        vendor_id,
        request,
    )
    .await?;

    Ok(recorded("Deposit", result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> SettlementRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn accepts_camel_case_and_formatted_amounts() {
        let settlement = request(serde_json::json!({
            "caseId": "CASE-1",
            "billingAmount": "₹1,180",
            "spareAmount": 180,
            "travellingAmount": "100.50",
            "gstIncluded": true
        }))
        .into_settlement(AmountParsePolicy::Strict, PaymentMethod::Online)
        .unwrap();

        assert_eq!(settlement.case_id, "CASE-1");
        assert_eq!(settlement.input.billing_paise, 118_000);
        assert_eq!(settlement.input.spare_paise, 18_000);
        assert_eq!(settlement.input.travelling_paise, 10_050);
        assert_eq!(settlement.input.booking_paise, 0);
        assert!(settlement.input.gst_included);
        assert!(settlement.defaulted_fields.is_empty());
    }

    #[test]
    fn lenient_policy_defaults_and_records_bad_fields() {
        let settlement = request(serde_json::json!({
            "case_id": "CASE-2",
            "billing_amount": 1000,
            "spare_amount": "abc"
        }))
        .into_settlement(AmountParsePolicy::Lenient, PaymentMethod::Cash)
        .unwrap();

        assert_eq!(settlement.input.spare_paise, 0);
        assert_eq!(settlement.defaulted_fields, vec!["spare_amount".to_string()]);
        assert_eq!(settlement.input.payment_method, PaymentMethod::Cash);
    }

    #[test]
    fn strict_policy_rejects_bad_fields() {
        let result = request(serde_json::json!({
            "case_id": "CASE-3",
            "billing_amount": "lots"
        }))
        .into_settlement(AmountParsePolicy::Strict, PaymentMethod::Online);

        assert!(matches!(
            result,
            Err(AppError::Validation(msg)) if msg.contains("billing_amount")
        ));
    }

    #[test]
    fn negative_amounts_are_rejected_under_both_policies() {
        let fields = [
            "billing_amount",
            "spare_amount",
            "travelling_amount",
            "booking_amount",
        ];
        for policy in [AmountParsePolicy::Strict, AmountParsePolicy::Lenient] {
            for field in fields {
                let mut body = serde_json::json!({
                    "case_id": "CASE-5",
                    "billing_amount": 1000
                });
                body[field] = serde_json::json!("-5000");

                let result = request(body).into_settlement(policy, PaymentMethod::Cash);
                let expected = format!("{field} cannot be negative");
                assert!(
                    matches!(&result, Err(AppError::Validation(msg)) if *msg == expected),
                    "{field} under {policy:?}: {result:?}"
                );
            }
        }
    }

    #[test]
    fn penalty_kind_is_read_from_type() {
        let request: PenaltyRequest = serde_json::from_value(serde_json::json!({
            "caseId": "CASE-4",
            "type": "cancellation"
        }))
        .unwrap();
        assert_eq!(request.kind, PenaltyKind::Cancellation);
        assert!(request.amount.is_none());
    }
}
