//! Wallet transaction model.
//!
//! This module defines:
//! - `WalletTransaction`: an immutable line item in a vendor's ledger
//! - `TransactionType` / `TransactionStatus`: the closed sets stored as text columns
//! - `TransactionMetadata`: per-type details, stored as JSONB
//! - `TransactionQuery`: filters for the paginated transaction listing

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use crate::models::pagination::PageParams;

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Earning,
    Penalty,
    Deposit,
    Withdrawal,
    WithdrawalRequest,
    CashCollection,
    TaskAcceptanceFee,
    Refund,
    ManualAdjustment,
}

impl TransactionType {
    pub const ALL: [TransactionType; 9] = [
        TransactionType::Earning,
        TransactionType::Penalty,
        TransactionType::Deposit,
        TransactionType::Withdrawal,
        TransactionType::WithdrawalRequest,
        TransactionType::CashCollection,
        TransactionType::TaskAcceptanceFee,
        TransactionType::Refund,
        TransactionType::ManualAdjustment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Earning => "earning",
            TransactionType::Penalty => "penalty",
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::WithdrawalRequest => "withdrawal_request",
            TransactionType::CashCollection => "cash_collection",
            TransactionType::TaskAcceptanceFee => "task_acceptance_fee",
            TransactionType::Refund => "refund",
            TransactionType::ManualAdjustment => "manual_adjustment",
        }
    }

    /// Types that settle a booking or support ticket and must carry a case id.
    pub fn requires_case(&self) -> bool {
        matches!(
            self,
            TransactionType::Earning
                | TransactionType::Penalty
                | TransactionType::CashCollection
                | TransactionType::TaskAcceptanceFee
        )
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A text column held a value outside its closed set.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariantError {
    kind: &'static str,
    value: String,
}

impl UnknownVariantError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl FromStr for TransactionType {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariantError::new("transaction type", s))
    }
}

/// Lifecycle status of a ledger entry.
///
/// Only `withdrawal_request` entries start as `pending`; every other entry is
/// written as `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Approved,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "approved" => Ok(TransactionStatus::Approved),
            "rejected" => Ok(TransactionStatus::Rejected),
            other => Err(UnknownVariantError::new("transaction status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Online,
    Cash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    Rejection,
    Cancellation,
}

/// Details carried by each transaction type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionMetadata {
    Earning {
        billing_paise: i64,
        spare_paise: i64,
        travelling_paise: i64,
        gst_paise: i64,
        payment_method: PaymentMethod,
        gst_included: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        defaulted_fields: Vec<String>,
    },
    CashCollection {
        billing_paise: i64,
        spare_paise: i64,
        travelling_paise: i64,
        gst_paise: i64,
        gst_included: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        defaulted_fields: Vec<String>,
    },
    Penalty {
        reason: PenaltyKind,
    },
    TaskAcceptanceFee {
        task_mrp_paise: i64,
    },
    Deposit {
        order_id: Option<String>,
        payment_id: Option<String>,
    },
    Withdrawal {
        processed_by: String,
    },
    WithdrawalRequest {
        withdrawal_request_id: Uuid,
    },
    Refund {
        withdrawal_request_id: Uuid,
    },
    ManualAdjustment {
        adjusted_by: String,
        reason: String,
    },
}

/// One ledger line.
#[derive(Debug, Clone, Serialize)]
pub struct WalletTransaction {
    pub id: Uuid,

    /// Human-readable unique reference built from the vendor id and a timestamp.
    pub transaction_ref: String,

    pub vendor_id: Uuid,

    pub transaction_type: TransactionType,

    /// Signed amount in paise: credits positive, debits negative.
    pub amount_paise: i64,

    /// Wallet balance right after this entry was applied.
    pub balance_after_paise: i64,

    pub case_id: Option<String>,

    pub status: TransactionStatus,

    pub description: Option<String>,

    pub metadata: TransactionMetadata,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Build a reference of the form `TXN-<vendor prefix>-<unix micros>-<suffix>`.
    pub fn make_ref(vendor_id: Uuid, id: Uuid, at: DateTime<Utc>) -> String {
        let vendor = vendor_id.simple().to_string();
        let suffix = id.simple().to_string();
        format!(
            "TXN-{}-{}-{}",
            &vendor[..8],
            at.timestamp_micros(),
            &suffix[..6]
        )
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for WalletTransaction {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let transaction_type: String = row.try_get("transaction_type")?;
        let status: String = row.try_get("status")?;
        let Json(metadata): Json<TransactionMetadata> = row.try_get("metadata")?;

        Ok(Self {
            id: row.try_get("id")?,
            transaction_ref: row.try_get("transaction_ref")?,
            vendor_id: row.try_get("vendor_id")?,
            transaction_type: transaction_type
                .parse()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            amount_paise: row.try_get("amount_paise")?,
            balance_after_paise: row.try_get("balance_after_paise")?,
            case_id: row.try_get("case_id")?,
            status: status
                .parse()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            description: row.try_get("description")?,
            metadata,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Query string for `GET …/transactions`.
///
/// ```text
/// ?type=earning&status=completed&from=2025-01-01T00:00:00Z&page=2&limit=50
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl TransactionQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams::new(self.page, self.limit)
    }
}
