//! Vendor wallet aggregate.
//!
//! `VendorWallet` is the single mutable record per vendor. Every change goes through
//! one of the `add_*` / withdrawal methods below, which append a [`WalletTransaction`]
//! and adjust the balance and exactly one running total in the same step. The
//! methods are pure in-memory operations; `wallet_service` wraps them in a database
//! transaction holding the wallet row lock.
//!
//! # Balance invariant
//!
//! Wallets are created with a zero balance, so at all times
//! `current_balance_paise == Σ transaction.amount_paise`. The security deposit is a
//! floor for withdrawals, not a credited amount.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::WalletSettings,
    error::AppError,
    models::{
        transaction::{
            PenaltyKind, TransactionMetadata, TransactionStatus, TransactionType,
            WalletTransaction,
        },
        withdrawal::{WithdrawalRequest, WithdrawalStatus},
    },
    services::wallet_calculation::{self, SettlementBreakdown, SettlementInput},
};

/// The per-vendor ledger aggregate, as stored in `vendor_wallets`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct VendorWallet {
    pub vendor_id: Uuid,

    /// Signed running balance in paise. May go negative through penalties.
    pub current_balance_paise: i64,

    /// Floor below which funds cannot be withdrawn.
    pub security_deposit_paise: i64,

    pub total_earnings_paise: i64,
    pub total_penalties_paise: i64,
    pub total_withdrawals_paise: i64,
    pub total_deposits_paise: i64,
    pub total_task_acceptance_fees_paise: i64,
    pub total_cash_collections_paise: i64,
    pub total_refunds_paise: i64,
    /// Signed sum of admin adjustments.
    pub total_manual_adjustments_paise: i64,
    pub total_tasks_completed: i64,
    pub total_tasks_rejected: i64,
    pub total_tasks_cancelled: i64,

    /// Set when the vendor is charged for a first task.
    pub has_first_task: bool,

    /// Set once cumulative deposits reach the mandatory threshold.
    pub has_mandatory_deposit: bool,

    /// The one withdrawal request allowed to be pending.
    pub pending_withdrawal_id: Option<Uuid>,

    /// Bumped on every write; the service refuses to save over a newer version.
    pub version: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inputs for settling a completed task.
#[derive(Debug, Clone)]
pub struct TaskSettlement {
    pub case_id: String,
    pub input: SettlementInput,
    /// Fields that failed to parse and were defaulted to zero.
    pub defaulted_fields: Vec<String>,
    pub description: Option<String>,
}

/// Outcome of an admin decision on a withdrawal request.
#[derive(Debug, Clone)]
pub struct WithdrawalSettlement {
    pub request: WithdrawalRequest,
    /// New status for the request's debit entry.
    pub transaction_status: TransactionStatus,
    /// Credit-back entry, present only for declines.
    pub refund: Option<WalletTransaction>,
}

impl VendorWallet {
    /// Fresh wallet with zero balance, as inserted on first access.
    pub fn new(vendor_id: Uuid, settings: &WalletSettings) -> Self {
        let now = Utc::now();
        Self {
            vendor_id,
            current_balance_paise: 0,
            security_deposit_paise: settings.security_deposit_paise,
            total_earnings_paise: 0,
            total_penalties_paise: 0,
            total_withdrawals_paise: 0,
            total_deposits_paise: 0,
            total_task_acceptance_fees_paise: 0,
            total_cash_collections_paise: 0,
            total_refunds_paise: 0,
            total_manual_adjustments_paise: 0,
            total_tasks_completed: 0,
            total_tasks_rejected: 0,
            total_tasks_cancelled: 0,
            has_first_task: false,
            has_mandatory_deposit: false,
            pending_withdrawal_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Balance above the security deposit floor.
    pub fn available_balance(&self) -> i64 {
        self.current_balance_paise
            .saturating_sub(self.security_deposit_paise)
            .max(0)
    }

    /// A vendor may take tasks freely until the first one; after that the mandatory
    /// deposit must have been paid.
    pub fn can_accept_new_tasks(&self) -> bool {
        !self.has_first_task || self.has_mandatory_deposit
    }

    /// Credit the earning for an online-paid task.
    pub fn add_earning(
        &mut self,
        settlement: TaskSettlement,
        settings: &WalletSettings,
    ) -> Result<WalletTransaction, AppError> {
        let case_id = require_case_id(&settlement.case_id)?;
        let breakdown =
            wallet_calculation::calculate_earning(&settlement.input, settings.gst_rate_percent)?;

        let metadata = TransactionMetadata::Earning {
            billing_paise: settlement.input.billing_paise,
            spare_paise: settlement.input.spare_paise,
            travelling_paise: settlement.input.travelling_paise,
            gst_paise: breakdown.gst_paise,
            payment_method: settlement.input.payment_method,
            gst_included: settlement.input.gst_included,
            defaulted_fields: settlement.defaulted_fields,
        };

        let total_earnings = grow(self.total_earnings_paise, breakdown.calculated_paise)?;
        let tasks_completed = grow(self.total_tasks_completed, 1)?;

        let transaction = self.append(
            TransactionType::Earning,
            breakdown.calculated_paise,
            Some(case_id),
            TransactionStatus::Completed,
            settlement.description,
            metadata,
        )?;
        self.total_earnings_paise = total_earnings;
        self.total_tasks_completed = tasks_completed;
        Ok(transaction)
    }

    /// Debit a penalty. No balance floor applies; the wallet may go negative.
    ///
    /// Without an explicit amount the configured default for `kind` is used.
    pub fn add_penalty(
        &mut self,
        case_id: &str,
        kind: PenaltyKind,
        amount_paise: Option<i64>,
        description: Option<String>,
        settings: &WalletSettings,
    ) -> Result<WalletTransaction, AppError> {
        let case_id = require_case_id(case_id)?;
        let amount = amount_paise.unwrap_or(match kind {
            PenaltyKind::Rejection => settings.rejection_penalty_paise,
            PenaltyKind::Cancellation => settings.cancellation_penalty_paise,
        });
        if amount <= 0 {
            return Err(AppError::Validation(
                "Penalty amount must be positive".to_string(),
            ));
        }

        let total_penalties = grow(self.total_penalties_paise, amount)?;
        let (tasks_rejected, tasks_cancelled) = match kind {
            PenaltyKind::Rejection => (
                grow(self.total_tasks_rejected, 1)?,
                self.total_tasks_cancelled,
            ),
            PenaltyKind::Cancellation => (
                self.total_tasks_rejected,
                grow(self.total_tasks_cancelled, 1)?,
            ),
        };

        let transaction = self.append(
            TransactionType::Penalty,
            -amount,
            Some(case_id),
            TransactionStatus::Completed,
            description,
            TransactionMetadata::Penalty { reason: kind },
        )?;
        self.total_penalties_paise = total_penalties;
        self.total_tasks_rejected = tasks_rejected;
        self.total_tasks_cancelled = tasks_cancelled;
        Ok(transaction)
    }

    /// Charge the task acceptance fee. Requires the deposit gate and enough balance.
    pub fn add_task_acceptance_fee(
        &mut self,
        case_id: &str,
        task_mrp_paise: i64,
        description: Option<String>,
    ) -> Result<WalletTransaction, AppError> {
        let case_id = require_case_id(case_id)?;
        if task_mrp_paise <= 0 {
            return Err(AppError::Validation("Task MRP must be positive".to_string()));
        }
        if !self.can_accept_new_tasks() {
            return Err(AppError::DepositRequired);
        }
        if self.current_balance_paise < task_mrp_paise {
            return Err(AppError::InsufficientBalance {
                required: task_mrp_paise,
                available: self.current_balance_paise,
            });
        }

        let total_fees = grow(self.total_task_acceptance_fees_paise, task_mrp_paise)?;

        let transaction = self.append(
            TransactionType::TaskAcceptanceFee,
            -task_mrp_paise,
            Some(case_id),
            TransactionStatus::Completed,
            description,
            TransactionMetadata::TaskAcceptanceFee { task_mrp_paise },
        )?;
        self.total_task_acceptance_fees_paise = total_fees;
        self.has_first_task = true;
        Ok(transaction)
    }

    /// Amount a cash collection would debit, refused when the current balance does
    /// not cover it.
    pub fn check_cash_collection(
        &self,
        settlement: &TaskSettlement,
        settings: &WalletSettings,
    ) -> Result<SettlementBreakdown, AppError> {
        let breakdown = Self::preview_cash_collection(settlement, settings)?;
        if self.current_balance_paise < breakdown.calculated_paise {
            return Err(AppError::InsufficientBalance {
                required: breakdown.calculated_paise,
                available: self.current_balance_paise,
            });
        }
        Ok(breakdown)
    }

    /// Claw back the platform share of a cash-paid task.
    ///
    /// Does not check the balance; callers must run
    /// [`Self::check_cash_collection`] first.
    pub fn add_cash_collection_deduction(
        &mut self,
        settlement: TaskSettlement,
        settings: &WalletSettings,
    ) -> Result<WalletTransaction, AppError> {
        let case_id = require_case_id(&settlement.case_id)?;
        let breakdown = Self::preview_cash_collection(&settlement, settings)?;

        let metadata = TransactionMetadata::CashCollection {
            billing_paise: settlement.input.billing_paise,
            spare_paise: settlement.input.spare_paise,
            travelling_paise: settlement.input.travelling_paise,
            gst_paise: breakdown.gst_paise,
            gst_included: settlement.input.gst_included,
            defaulted_fields: settlement.defaulted_fields,
        };

        let total_cash = grow(self.total_cash_collections_paise, breakdown.calculated_paise)?;
        let tasks_completed = grow(self.total_tasks_completed, 1)?;

        let transaction = self.append(
            TransactionType::CashCollection,
            -breakdown.calculated_paise,
            Some(case_id),
            TransactionStatus::Completed,
            settlement.description,
            metadata,
        )?;
        self.total_cash_collections_paise = total_cash;
        self.total_tasks_completed = tasks_completed;
        Ok(transaction)
    }

    /// Amount a cash collection would debit, without touching the wallet.
    pub fn preview_cash_collection(
        settlement: &TaskSettlement,
        settings: &WalletSettings,
    ) -> Result<SettlementBreakdown, AppError> {
        wallet_calculation::calculate_cash_collection_deduction(
            &settlement.input,
            settings.gst_rate_percent,
        )
    }

    /// Credit a deposit and open the task gate once cumulative deposits reach the
    /// mandatory threshold.
    pub fn add_deposit(
        &mut self,
        amount_paise: i64,
        order_id: Option<String>,
        payment_id: Option<String>,
        description: Option<String>,
        settings: &WalletSettings,
    ) -> Result<WalletTransaction, AppError> {
        if amount_paise <= 0 {
            return Err(AppError::Validation(
                "Deposit amount must be positive".to_string(),
            ));
        }

        let total_deposits = grow(self.total_deposits_paise, amount_paise)?;

        let transaction = self.append(
            TransactionType::Deposit,
            amount_paise,
            None,
            TransactionStatus::Completed,
            description,
            TransactionMetadata::Deposit {
                order_id,
                payment_id,
            },
        )?;
        self.total_deposits_paise = total_deposits;
        if self.total_deposits_paise >= settings.mandatory_deposit_threshold_paise {
            self.has_mandatory_deposit = true;
        }
        Ok(transaction)
    }

    /// Admin payout straight from the wallet, bounded by the available balance.
    pub fn add_withdrawal(
        &mut self,
        amount_paise: i64,
        processed_by: &str,
        description: Option<String>,
    ) -> Result<WalletTransaction, AppError> {
        if amount_paise <= 0 {
            return Err(AppError::Validation(
                "Withdrawal amount must be positive".to_string(),
            ));
        }
        let available = self.available_balance();
        if amount_paise > available {
            return Err(AppError::InsufficientBalance {
                required: amount_paise,
                available,
            });
        }

        let total_withdrawals = grow(self.total_withdrawals_paise, amount_paise)?;

        let transaction = self.append(
            TransactionType::Withdrawal,
            -amount_paise,
            None,
            TransactionStatus::Completed,
            description,
            TransactionMetadata::Withdrawal {
                processed_by: processed_by.to_string(),
            },
        )?;
        self.total_withdrawals_paise = total_withdrawals;
        Ok(transaction)
    }

    /// Open a withdrawal request and debit the amount immediately.
    ///
    /// Only one request may be pending, the available balance must reach the
    /// configured minimum, and the amount cannot exceed what is available.
    pub fn request_withdrawal(
        &mut self,
        amount_paise: i64,
        settings: &WalletSettings,
    ) -> Result<(WithdrawalRequest, WalletTransaction), AppError> {
        if self.pending_withdrawal_id.is_some() {
            return Err(AppError::DuplicatePendingRequest);
        }
        if amount_paise <= 0 {
            return Err(AppError::Validation(
                "Withdrawal amount must be positive".to_string(),
            ));
        }
        let available = self.available_balance();
        if available < settings.withdrawal_min_available_paise {
            return Err(AppError::InsufficientBalance {
                required: settings.withdrawal_min_available_paise,
                available,
            });
        }
        if amount_paise > available {
            return Err(AppError::InsufficientBalance {
                required: amount_paise,
                available,
            });
        }

        let request_id = Uuid::new_v4();
        let transaction = self.append(
            TransactionType::WithdrawalRequest,
            -amount_paise,
            None,
            TransactionStatus::Pending,
            Some("Withdrawal request".to_string()),
            TransactionMetadata::WithdrawalRequest {
                withdrawal_request_id: request_id,
            },
        )?;
        self.pending_withdrawal_id = Some(request_id);

        let request = WithdrawalRequest {
            id: request_id,
            vendor_id: self.vendor_id,
            amount_paise,
            status: WithdrawalStatus::Pending,
            transaction_id: transaction.id,
            processed_by: None,
            admin_notes: None,
            created_at: transaction.created_at,
            updated_at: transaction.created_at,
            processed_at: None,
        };
        Ok((request, transaction))
    }

    /// Approve a pending request. Funds were debited at request time, so only the
    /// withdrawal total changes.
    pub fn approve_withdrawal(
        &mut self,
        mut request: WithdrawalRequest,
        processed_by: &str,
        admin_notes: Option<String>,
    ) -> Result<WithdrawalSettlement, AppError> {
        self.ensure_owns_pending(&request)?;
        let total_withdrawals = grow(self.total_withdrawals_paise, request.amount_paise)?;
        request.settle(WithdrawalStatus::Approved, processed_by, admin_notes)?;

        self.total_withdrawals_paise = total_withdrawals;
        self.pending_withdrawal_id = None;
        self.touch();

        Ok(WithdrawalSettlement {
            request,
            transaction_status: TransactionStatus::Approved,
            refund: None,
        })
    }

    /// Decline a pending request and credit the amount back with a refund entry.
    pub fn decline_withdrawal(
        &mut self,
        mut request: WithdrawalRequest,
        processed_by: &str,
        admin_notes: Option<String>,
    ) -> Result<WithdrawalSettlement, AppError> {
        self.ensure_owns_pending(&request)?;
        let total_refunds = grow(self.total_refunds_paise, request.amount_paise)?;
        request.settle(WithdrawalStatus::Declined, processed_by, admin_notes)?;

        let refund = self.append(
            TransactionType::Refund,
            request.amount_paise,
            None,
            TransactionStatus::Completed,
            Some("Withdrawal request declined".to_string()),
            TransactionMetadata::Refund {
                withdrawal_request_id: request.id,
            },
        )?;
        self.total_refunds_paise = total_refunds;
        self.pending_withdrawal_id = None;

        Ok(WithdrawalSettlement {
            request,
            transaction_status: TransactionStatus::Rejected,
            refund: Some(refund),
        })
    }

    /// Admin catch-all: any non-zero signed amount with a reason.
    pub fn add_manual_adjustment(
        &mut self,
        amount_paise: i64,
        adjusted_by: &str,
        reason: &str,
    ) -> Result<WalletTransaction, AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation(
                "Adjustment reason is required".to_string(),
            ));
        }

        let total_adjustments = grow(self.total_manual_adjustments_paise, amount_paise)?;

        let transaction = self.append(
            TransactionType::ManualAdjustment,
            amount_paise,
            None,
            TransactionStatus::Completed,
            Some(reason.to_string()),
            TransactionMetadata::ManualAdjustment {
                adjusted_by: adjusted_by.to_string(),
                reason: reason.to_string(),
            },
        )?;
        self.total_manual_adjustments_paise = total_adjustments;
        Ok(transaction)
    }

    fn ensure_owns_pending(&self, request: &WithdrawalRequest) -> Result<(), AppError> {
        if request.vendor_id != self.vendor_id {
            return Err(AppError::WithdrawalNotFound);
        }
        if request.status == WithdrawalStatus::Pending
            && self.pending_withdrawal_id != Some(request.id)
        {
            return Err(AppError::InvalidStateTransition {
                from: "untracked".to_string(),
                to: "settled".to_string(),
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn append(
        &mut self,
        transaction_type: TransactionType,
        amount_paise: i64,
        case_id: Option<String>,
        status: TransactionStatus,
        description: Option<String>,
        metadata: TransactionMetadata,
    ) -> Result<WalletTransaction, AppError> {
        if amount_paise == 0 {
            return Err(AppError::Validation(format!(
                "{transaction_type} amount cannot be zero"
            )));
        }
        if transaction_type.requires_case() && case_id.is_none() {
            return Err(AppError::Validation(format!(
                "{transaction_type} requires a case id"
            )));
        }

        let balance_after = self
            .current_balance_paise
            .checked_add(amount_paise)
            .ok_or_else(|| AppError::Validation("Balance out of range".to_string()))?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        self.current_balance_paise = balance_after;
        self.updated_at = now;

        Ok(WalletTransaction {
            id,
            transaction_ref: WalletTransaction::make_ref(self.vendor_id, id, now),
            vendor_id: self.vendor_id,
            transaction_type,
            amount_paise,
            balance_after_paise: balance_after,
            case_id,
            status,
            description,
            metadata,
            created_at: now,
            updated_at: now,
        })
    }

    /// Recompute balance and running totals from the full transaction list and report
    /// every field that disagrees with the stored value.
    pub fn reconcile(&self, transactions: &[WalletTransaction]) -> ReconciliationReport {
        let mut computed = LedgerTotals::default();
        for t in transactions {
            computed.apply(t);
        }

        let recorded = LedgerTotals {
            balance: self.current_balance_paise,
            earnings: self.total_earnings_paise,
            penalties: self.total_penalties_paise,
            withdrawals: self.total_withdrawals_paise,
            deposits: self.total_deposits_paise,
            task_acceptance_fees: self.total_task_acceptance_fees_paise,
            cash_collections: self.total_cash_collections_paise,
            refunds: self.total_refunds_paise,
            manual_adjustments: self.total_manual_adjustments_paise,
            tasks_completed: self.total_tasks_completed,
            tasks_rejected: self.total_tasks_rejected,
            tasks_cancelled: self.total_tasks_cancelled,
        };

        let mismatches: Vec<Mismatch> = recorded
            .fields()
            .into_iter()
            .zip(computed.fields())
            .filter(|((_, r), (_, c))| r != c)
            .map(|((field, recorded), (_, computed))| Mismatch {
                field,
                recorded,
                computed,
            })
            .collect();

        ReconciliationReport {
            vendor_id: self.vendor_id,
            transaction_count: transactions.len(),
            consistent: mismatches.is_empty(),
            mismatches,
        }
    }
}

/// Running totals refuse to wrap.
fn grow(total: i64, amount: i64) -> Result<i64, AppError> {
    total
        .checked_add(amount)
        .ok_or_else(|| AppError::Validation("Amount is out of range".to_string()))
}

fn require_case_id(case_id: &str) -> Result<String, AppError> {
    let trimmed = case_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("case_id is required".to_string()));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Default)]
struct LedgerTotals {
    balance: i64,
    earnings: i64,
    penalties: i64,
    withdrawals: i64,
    deposits: i64,
    task_acceptance_fees: i64,
    cash_collections: i64,
    refunds: i64,
    manual_adjustments: i64,
    tasks_completed: i64,
    tasks_rejected: i64,
    tasks_cancelled: i64,
}

impl LedgerTotals {
    fn apply(&mut self, t: &WalletTransaction) {
        self.balance += t.amount_paise;
        match t.transaction_type {
            TransactionType::Earning => {
                self.earnings += t.amount_paise;
                self.tasks_completed += 1;
            }
            TransactionType::CashCollection => {
                self.cash_collections -= t.amount_paise;
                self.tasks_completed += 1;
            }
            TransactionType::Penalty => {
                self.penalties -= t.amount_paise;
                match t.metadata {
                    TransactionMetadata::Penalty {
                        reason: PenaltyKind::Rejection,
                    } => self.tasks_rejected += 1,
                    TransactionMetadata::Penalty {
                        reason: PenaltyKind::Cancellation,
                    } => self.tasks_cancelled += 1,
                    _ => {}
                }
            }
            TransactionType::Deposit => self.deposits += t.amount_paise,
            TransactionType::TaskAcceptanceFee => self.task_acceptance_fees -= t.amount_paise,
            TransactionType::Refund => self.refunds += t.amount_paise,
            TransactionType::ManualAdjustment => self.manual_adjustments += t.amount_paise,
            TransactionType::Withdrawal => self.withdrawals -= t.amount_paise,
            TransactionType::WithdrawalRequest => {
                if t.status == TransactionStatus::Approved {
                    self.withdrawals -= t.amount_paise;
                }
            }
        }
    }

    fn fields(&self) -> [(&'static str, i64); 12] {
        [
            ("current_balance_paise", self.balance),
            ("total_earnings_paise", self.earnings),
            ("total_penalties_paise", self.penalties),
            ("total_withdrawals_paise", self.withdrawals),
            ("total_deposits_paise", self.deposits),
            ("total_task_acceptance_fees_paise", self.task_acceptance_fees),
            ("total_cash_collections_paise", self.cash_collections),
            ("total_refunds_paise", self.refunds),
            ("total_manual_adjustments_paise", self.manual_adjustments),
            ("total_tasks_completed", self.tasks_completed),
            ("total_tasks_rejected", self.tasks_rejected),
            ("total_tasks_cancelled", self.tasks_cancelled),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub field: &'static str,
    pub recorded: i64,
    pub computed: i64,
}

/// Result of checking a wallet against its own ledger.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub vendor_id: Uuid,
    pub transaction_count: usize,
    pub consistent: bool,
    pub mismatches: Vec<Mismatch>,
}

/// Task-acceptance eligibility as shown to the vendor.
#[derive(Debug, Clone, Serialize)]
pub struct Eligibility {
    pub can_accept_new_tasks: bool,
    pub has_first_task: bool,
    pub has_mandatory_deposit: bool,
    pub deposit_shortfall_paise: i64,
}

impl Eligibility {
    pub fn of(wallet: &VendorWallet, settings: &WalletSettings) -> Self {
        Self {
            can_accept_new_tasks: wallet.can_accept_new_tasks(),
            has_first_task: wallet.has_first_task,
            has_mandatory_deposit: wallet.has_mandatory_deposit,
            deposit_shortfall_paise: if wallet.has_mandatory_deposit {
                0
            } else {
                settings
                    .mandatory_deposit_threshold_paise
                    .saturating_sub(wallet.total_deposits_paise)
                    .max(0)
            },
        }
    }
}

impl TaskSettlement {
    pub fn new(case_id: impl Into<String>, input: SettlementInput) -> Self {
        Self {
            case_id: case_id.into(),
            input,
            defaulted_fields: Vec::new(),
            description: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transaction::PaymentMethod;

    fn settings() -> WalletSettings {
        WalletSettings::default()
    }

    fn wallet() -> VendorWallet {
        VendorWallet::new(Uuid::new_v4(), &settings())
    }

    fn task(
        case_id: &str,
        billing: i64,
        spare: i64,
        travel: i64,
        method: PaymentMethod,
    ) -> TaskSettlement {
        TaskSettlement::new(
            case_id,
            SettlementInput {
                billing_paise: billing,
                spare_paise: spare,
                travelling_paise: travel,
                booking_paise: 0,
                payment_method: method,
                gst_included: false,
            },
        )
    }

    fn ledger_sum(transactions: &[WalletTransaction]) -> i64 {
        transactions.iter().map(|t| t.amount_paise).sum()
    }

    #[test]
    fn new_wallet_is_empty_and_accepts_first_task() {
        let w = wallet();
        assert_eq!(w.current_balance_paise, 0);
        assert_eq!(w.security_deposit_paise, 400_000);
        assert_eq!(w.available_balance(), 0);
        assert!(w.can_accept_new_tasks());
        assert_eq!(w.version, 0);
        assert_eq!(w.created_at, w.updated_at);
        assert!(w.pending_withdrawal_id.is_none());
    }

    #[test]
    fn cash_collection_check_requires_covering_balance() {
        let s = settings();
        let mut w = wallet();
        w.add_deposit(79_999, None, None, None, &s).unwrap();
        let cash_task = task("BK-1", 100_000, 20_000, 0, PaymentMethod::Cash);

        let err = w.check_cash_collection(&cash_task, &s).unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientBalance {
                required: 80_000,
                available: 79_999
            }
        ));

        w.add_deposit(1, None, None, None, &s).unwrap();
        let breakdown = w.check_cash_collection(&cash_task, &s).unwrap();
        assert_eq!(breakdown.calculated_paise, 80_000);
        assert_eq!(w.current_balance_paise, 80_000);
    }

    #[test]
    fn running_totals_refuse_to_overflow() {
        let s = settings();
        let mut w = wallet();
        w.total_earnings_paise = i64::MAX - 10;
        let before = w.clone();

        let err = w
            .add_earning(task("BK-1", 100_000, 0, 0, PaymentMethod::Online), &s)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "Amount is out of range"));
        assert_eq!(w, before);

        w.total_deposits_paise = i64::MAX;
        assert!(w.add_deposit(1, None, None, None, &s).is_err());
        assert_eq!(w.current_balance_paise, 0);
    }

    #[test]
    fn deeply_negative_balance_has_nothing_available() {
        let mut w = wallet();
        w.current_balance_paise = i64::MIN + 1;
        assert_eq!(w.available_balance(), 0);
    }

    #[test]
    fn balance_equals_sum_of_entries_across_mixed_operations() {
        let s = settings();
        let mut w = wallet();
        let mut ledger = Vec::new();

        ledger.push(w.add_deposit(500_000, None, None, None, &s).unwrap());
        ledger.push(
            w.add_earning(task("BK-1", 100_000, 20_000, 10_000, PaymentMethod::Online), &s)
                .unwrap(),
        );
        ledger.push(w.add_penalty("BK-2", PenaltyKind::Rejection, None, None, &s).unwrap());
        ledger.push(w.add_task_acceptance_fee("BK-3", 30_000, None).unwrap());
        let cash_task = task("BK-4", 50_000, 5_000, 0, PaymentMethod::Cash);
        ledger.push(w.add_cash_collection_deduction(cash_task, &s).unwrap());
        ledger.push(w.add_manual_adjustment(-2_500, "ops", "late fee").unwrap());

        assert_eq!(w.current_balance_paise, ledger_sum(&ledger));
        assert_eq!(
            ledger.last().unwrap().balance_after_paise,
            w.current_balance_paise
        );
        let report = w.reconcile(&ledger);
        assert!(report.consistent, "{:?}", report.mismatches);
        assert_eq!(report.transaction_count, 6);
    }

    #[test]
    fn task_fee_fails_without_balance_and_leaves_wallet_untouched() {
        let s = settings();
        let mut w = wallet();
        w.add_deposit(10_000, None, None, None, &s).unwrap();
        let before = w.clone();

        let err = w.add_task_acceptance_fee("BK-1", 10_001, None).unwrap_err();

        assert!(matches!(
            err,
            AppError::InsufficientBalance {
                required: 10_001,
                available: 10_000
            }
        ));
        assert_eq!(w, before);
    }

    #[test]
    fn task_gate_closes_after_first_task_until_deposit() {
        let s = settings();
        let mut w = wallet();
        w.add_manual_adjustment(100_000, "ops", "promo credit").unwrap();

        w.add_task_acceptance_fee("BK-1", 10_000, None).unwrap();
        assert!(w.has_first_task);
        assert!(!w.can_accept_new_tasks());
        assert!(matches!(
            w.add_task_acceptance_fee("BK-2", 10_000, None),
            Err(AppError::DepositRequired)
        ));

        w.add_deposit(200_000, None, None, None, &s).unwrap();
        assert!(!w.has_mandatory_deposit);
        w.add_deposit(199_900, None, None, None, &s).unwrap();
        assert!(w.has_mandatory_deposit);
        assert!(w.add_task_acceptance_fee("BK-2", 10_000, None).is_ok());
    }

    #[test]
    fn penalties_can_drive_balance_negative() {
        let s = settings();
        let mut w = wallet();
        let t = w
            .add_penalty("BK-9", PenaltyKind::Rejection, None, None, &s)
            .unwrap();
        assert_eq!(t.amount_paise, -10_000);
        assert_eq!(w.current_balance_paise, -10_000);
        assert_eq!(w.total_penalties_paise, 10_000);
        assert_eq!(w.total_tasks_rejected, 1);

        w.add_penalty("BK-10", PenaltyKind::Cancellation, Some(25_000), None, &s)
            .unwrap();
        assert_eq!(w.current_balance_paise, -35_000);
        assert_eq!(w.total_tasks_cancelled, 1);
    }

    #[test]
    fn earning_matches_calculation() {
        let s = settings();
        let mut w = wallet();
        let t = w
            .add_earning(task("BK-1", 100_000, 20_000, 10_000, PaymentMethod::Online), &s)
            .unwrap();
        assert_eq!(t.amount_paise, 90_000);
        assert_eq!(t.case_id.as_deref(), Some("BK-1"));
        assert_eq!(t.status, TransactionStatus::Completed);
        assert_eq!(w.total_earnings_paise, 90_000);
        assert_eq!(w.total_tasks_completed, 1);
    }

    #[test]
    fn cash_collection_debits_even_past_zero() {
        let s = settings();
        let mut w = wallet();
        let cash_task = task("BK-1", 100_000, 20_000, 0, PaymentMethod::Cash);
        let t = w.add_cash_collection_deduction(cash_task, &s).unwrap();
        assert_eq!(t.amount_paise, -80_000);
        assert_eq!(w.current_balance_paise, -80_000);
        assert_eq!(w.total_cash_collections_paise, 80_000);
    }

    #[test]
    fn case_id_is_required_for_task_entries() {
        let s = settings();
        let mut w = wallet();
        assert!(matches!(
            w.add_penalty("  ", PenaltyKind::Rejection, None, None, &s),
            Err(AppError::Validation(_))
        ));
        assert_eq!(w.current_balance_paise, 0);
    }

    #[test]
    fn defaulted_fields_are_kept_on_the_entry() {
        let s = settings();
        let mut w = wallet();
        let mut settlement = task("BK-1", 100_000, 0, 0, PaymentMethod::Online);
        settlement.defaulted_fields = vec!["spare_amount".to_string()];

        let t = w.add_earning(settlement, &s).unwrap();
        match t.metadata {
            TransactionMetadata::Earning {
                billing_paise,
                spare_paise,
                defaulted_fields,
                ..
            } => {
                assert_eq!(billing_paise, 100_000);
                assert_eq!(spare_paise, 0);
                assert_eq!(defaulted_fields, vec!["spare_amount".to_string()]);
            }
            other => panic!("unexpected metadata {other:?}"),
        }
    }

    #[test]
    fn declined_withdrawal_restores_balance_exactly() {
        let s = settings();
        let mut w = wallet();
        let mut ledger = vec![w.add_deposit(1_000_000, None, None, None, &s).unwrap()];
        let before = w.current_balance_paise;

        let (request, debit) = w.request_withdrawal(550_000, &s).unwrap();
        assert_eq!(debit.status, TransactionStatus::Pending);
        assert_eq!(w.current_balance_paise, before - 550_000);
        assert_eq!(w.pending_withdrawal_id, Some(request.id));
        ledger.push(debit);

        let settlement = w
            .decline_withdrawal(request, "ops", Some("bank mismatch".into()))
            .unwrap();
        assert_eq!(settlement.transaction_status, TransactionStatus::Rejected);
        assert_eq!(settlement.request.status, WithdrawalStatus::Declined);
        let refund = settlement.refund.unwrap();
        assert_eq!(refund.transaction_type, TransactionType::Refund);
        ledger[1].status = settlement.transaction_status;
        ledger.push(refund);

        assert_eq!(w.current_balance_paise, before);
        assert_eq!(w.pending_withdrawal_id, None);
        assert_eq!(w.total_withdrawals_paise, 0);
        assert_eq!(w.total_refunds_paise, 550_000);
        assert!(w.reconcile(&ledger).consistent);
    }

    #[test]
    fn approved_withdrawal_keeps_funds_debited() {
        let s = settings();
        let mut w = wallet();
        let mut ledger = vec![w.add_deposit(1_000_000, None, None, None, &s).unwrap()];

        let (request, debit) = w.request_withdrawal(600_000, &s).unwrap();
        ledger.push(debit);
        let balance_after_request = w.current_balance_paise;

        let settlement = w.approve_withdrawal(request, "ops", None).unwrap();
        assert!(settlement.refund.is_none());
        ledger[1].status = settlement.transaction_status;

        assert_eq!(w.current_balance_paise, balance_after_request);
        assert_eq!(w.total_withdrawals_paise, 600_000);
        assert!(w.reconcile(&ledger).consistent);
    }

    #[test]
    fn only_one_pending_withdrawal() {
        let s = settings();
        let mut w = wallet();
        w.add_deposit(2_000_000, None, None, None, &s).unwrap();

        let (first, _) = w.request_withdrawal(500_000, &s).unwrap();
        let balance = w.current_balance_paise;
        assert!(matches!(
            w.request_withdrawal(500_000, &s),
            Err(AppError::DuplicatePendingRequest)
        ));
        assert_eq!(w.current_balance_paise, balance);

        w.approve_withdrawal(first, "ops", None).unwrap();
        assert!(w.request_withdrawal(500_000, &s).is_ok());
    }

    #[test]
    fn withdrawal_needs_minimum_available_balance() {
        let s = settings();
        let mut w = wallet();
        // 8,999 balance leaves 4,999 above the 4,000 floor.
        w.add_deposit(899_900, None, None, None, &s).unwrap();
        assert!(matches!(
            w.request_withdrawal(100_000, &s),
            Err(AppError::InsufficientBalance { required: 500_000, available: 499_900 })
        ));

        w.add_deposit(100, None, None, None, &s).unwrap();
        assert!(matches!(
            w.request_withdrawal(500_100, &s),
            Err(AppError::InsufficientBalance { .. })
        ));
        assert!(w.request_withdrawal(500_000, &s).is_ok());
    }

    #[test]
    fn settled_request_cannot_be_settled_again() {
        let s = settings();
        let mut w = wallet();
        w.add_deposit(1_000_000, None, None, None, &s).unwrap();
        let (request, _) = w.request_withdrawal(500_000, &s).unwrap();
        let settled = w.approve_withdrawal(request, "ops", None).unwrap();

        let err = w
            .decline_withdrawal(settled.request, "ops", None)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition { .. }));
        assert_eq!(w.total_refunds_paise, 0);
    }

    #[test]
    fn direct_withdrawal_respects_security_deposit() {
        let s = settings();
        let mut w = wallet();
        w.add_deposit(450_000, None, None, None, &s).unwrap();
        assert!(w.add_withdrawal(50_001, "ops", None).is_err());
        w.add_withdrawal(50_000, "ops", None).unwrap();
        assert_eq!(w.current_balance_paise, 400_000);
        assert_eq!(w.total_withdrawals_paise, 50_000);
    }

    #[test]
    fn manual_adjustment_needs_reason_and_non_zero_amount() {
        let mut w = wallet();
        assert!(w.add_manual_adjustment(1_000, "ops", " ").is_err());
        assert!(w.add_manual_adjustment(0, "ops", "noop").is_err());
        w.add_manual_adjustment(-1_000, "ops", "correction").unwrap();
        assert_eq!(w.total_manual_adjustments_paise, -1_000);
    }

    #[test]
    fn reconcile_reports_drifted_counters() {
        let s = settings();
        let mut w = wallet();
        let ledger = vec![w.add_deposit(100_000, None, None, None, &s).unwrap()];
        w.total_deposits_paise = 90_000;

        let report = w.reconcile(&ledger);
        assert!(!report.consistent);
        assert_eq!(
            report.mismatches,
            vec![Mismatch {
                field: "total_deposits_paise",
                recorded: 90_000,
                computed: 100_000,
            }]
        );
    }

    #[test]
    fn eligibility_reports_shortfall() {
        let s = settings();
        let mut w = wallet();
        w.add_deposit(100_000, None, None, None, &s).unwrap();
        let eligibility = Eligibility::of(&w, &s);
        assert!(eligibility.can_accept_new_tasks);
        assert_eq!(eligibility.deposit_shortfall_paise, 299_900);
    }
}
