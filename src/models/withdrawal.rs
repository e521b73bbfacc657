//! Withdrawal request model.
//!
//! A request is created `pending` (the wallet is debited at that moment) and is
//! settled exactly once by an admin: `approved` keeps the funds debited, `declined`
//! credits them back. There is no way back to `pending` and no partial approval.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{money::AmountInput, transaction::UnknownVariantError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Declined,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Declined => "declined",
        }
    }

    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        matches!(
            (self, next),
            (
                WithdrawalStatus::Pending,
                WithdrawalStatus::Approved | WithdrawalStatus::Declined
            )
        )
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "declined" => Ok(WithdrawalStatus::Declined),
            other => Err(UnknownVariantError::new("withdrawal status", other)),
        }
    }
}

/// A vendor's request to pay out part of the wallet balance.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub amount_paise: i64,
    pub status: WithdrawalStatus,
    /// The `withdrawal_request` ledger entry that debited the wallet.
    pub transaction_id: Uuid,
    pub processed_by: Option<String>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WithdrawalRequest {
    /// Move a pending request to a terminal status.
    pub fn settle(
        &mut self,
        next: WithdrawalStatus,
        processed_by: &str,
        admin_notes: Option<String>,
    ) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        let now = Utc::now();
        self.status = next;
        self.processed_by = Some(processed_by.to_string());
        self.admin_notes = admin_notes;
        self.updated_at = now;
        self.processed_at = Some(now);
        Ok(())
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for WithdrawalRequest {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;

        Ok(Self {
            id: row.try_get("id")?,
            vendor_id: row.try_get("vendor_id")?,
            amount_paise: row.try_get("amount_paise")?,
            status: status
                .parse()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            transaction_id: row.try_get("transaction_id")?,
            processed_by: row.try_get("processed_by")?,
            admin_notes: row.try_get("admin_notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            processed_at: row.try_get("processed_at")?,
        })
    }
}

/// Request body for `POST /api/vendor/wallet/withdrawal`.
#[derive(Debug, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub amount: AmountInput,
}

/// Request body for approve/decline.
#[derive(Debug, Default, Deserialize)]
pub struct SettleWithdrawalRequest {
    pub admin_notes: Option<String>,
}

/// Query string for the admin withdrawal listing.
#[derive(Debug, Default, Deserialize)]
pub struct WithdrawalQuery {
    pub status: Option<WithdrawalStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> WithdrawalRequest {
        let now = Utc::now();
        WithdrawalRequest {
            id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            amount_paise: 600_000,
            status: WithdrawalStatus::Pending,
            transaction_id: Uuid::new_v4(),
            processed_by: None,
            admin_notes: None,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    #[test]
    fn pending_settles_once() {
        let mut request = pending();
        request
            .settle(WithdrawalStatus::Approved, "ops", Some("paid".into()))
            .unwrap();
        assert_eq!(request.status, WithdrawalStatus::Approved);
        assert_eq!(request.processed_by.as_deref(), Some("ops"));
        assert!(request.processed_at.is_some());

        let err = request
            .settle(WithdrawalStatus::Declined, "ops", None)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition { .. }));
    }

    #[test]
    fn no_transition_back_to_pending() {
        let mut request = pending();
        assert!(request.settle(WithdrawalStatus::Pending, "ops", None).is_err());
        request.settle(WithdrawalStatus::Declined, "ops", None).unwrap();
        assert!(!WithdrawalStatus::Declined.can_transition_to(WithdrawalStatus::Pending));
    }
}
