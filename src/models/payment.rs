//! Payment gateway orders used to fund vendor deposits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::money::AmountInput;

/// A gateway order created for a vendor deposit.
///
/// # Database Table
///
/// Maps to the `payment_orders` table. `status` moves from `created` to `paid`
/// exactly once, when a signed payment for the order is verified and the deposit
/// is credited.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentOrder {
    pub order_id: String,
    pub vendor_id: Uuid,
    pub amount_paise: i64,
    pub status: String,
    pub payment_id: Option<String>,
    /// Deposit entry created when the order was paid.
    pub transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentOrder {
    pub fn is_paid(&self) -> bool {
        self.status == "paid"
    }
}

/// Request body for `POST /api/vendor/wallet/deposit/order`.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub amount: AmountInput,
}

/// Request body for `POST /api/vendor/wallet/deposit/verify`.
///
/// # JSON Example
///
/// ```json
/// {
///   "order_id": "order_Nf3kz8d0",
///   "payment_id": "pay_Nf3l0Q1x",
///   "signature": "5f1c…"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}
