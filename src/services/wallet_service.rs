//! Wallet service - persistence around the `VendorWallet` aggregate.
//!
//! This service handles:
//! - Lazy wallet creation
//! - Per-vendor serialization of mutations (row lock + version check)
//! - Settlement idempotency per case
//! - Deposit funding through the payment gateway
//! - Transaction listings and reconciliation
//!
//! # Atomicity Guarantees
//!
//! Every mutation runs inside one PostgreSQL transaction: the wallet row is locked
//! with `FOR UPDATE`, the aggregate method runs in memory, then the new ledger rows
//! and the wallet row are written and committed together. Events are published only
//! after the commit succeeds.

use chrono::Utc;
use serde::Serialize;
use sqlx::{Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::{
    config::WalletSettings,
    db::DbPool,
    error::AppError,
    models::{
        pagination::{Page, PageParams},
        payment::{PaymentOrder, VerifyPaymentRequest},
        transaction::{PenaltyKind, TransactionQuery, TransactionType, WalletTransaction},
        wallet::{ReconciliationReport, TaskSettlement, VendorWallet},
    },
    services::{
        notification_service::{Notifier, WalletEvent},
        payment_gateway::PaymentGateway,
    },
};

/// Result of a ledger write.
#[derive(Debug, Serialize)]
pub struct Recorded {
    pub transaction: WalletTransaction,
    pub balance_paise: i64,
    /// True when an identical settlement already existed and nothing was written.
    pub duplicate: bool,
}

/// The reply for a case that already carries an entry of the guarded type: the
/// original entry and the current balance, nothing written.
fn settled_already(
    guard: CaseGuard<'_>,
    existing: Option<WalletTransaction>,
    wallet: &VendorWallet,
) -> Option<Recorded> {
    let (case_id, transaction_type) = guard?;
    existing
        .filter(|t| {
            t.transaction_type == transaction_type && t.case_id.as_deref() == Some(case_id.trim())
        })
        .map(|transaction| Recorded {
            transaction,
            balance_paise: wallet.current_balance_paise,
            duplicate: true,
        })
}

/// Fetch a wallet without locking.
pub async fn get_wallet(
    pool: &DbPool,
    vendor_id: Uuid,
) -> Result<Option<VendorWallet>, AppError> {
    let wallet =
        sqlx::query_as::<_, VendorWallet>("SELECT * FROM vendor_wallets WHERE vendor_id = $1")
            .bind(vendor_id)
            .fetch_optional(pool)
            .await?;

    Ok(wallet)
}

/// Fetch a wallet, creating an empty one on first access.
pub async fn get_or_create_wallet(
    pool: &DbPool,
    vendor_id: Uuid,
    settings: &WalletSettings,
) -> Result<VendorWallet, AppError> {
    let mut conn = pool.acquire().await?;
    ensure_wallet(&mut *conn, vendor_id, settings).await?;

    let wallet =
        sqlx::query_as::<_, VendorWallet>("SELECT * FROM vendor_wallets WHERE vendor_id = $1")
            .bind(vendor_id)
            .fetch_one(&mut *conn)
            .await?;

    Ok(wallet)
}

async fn ensure_wallet(
    conn: &mut sqlx::PgConnection,
    vendor_id: Uuid,
    settings: &WalletSettings,
) -> Result<(), AppError> {
    let wallet = VendorWallet::new(vendor_id, settings);
    let inserted = sqlx::query(
        r#"
        INSERT INTO vendor_wallets (
            vendor_id, current_balance_paise, security_deposit_paise,
            has_first_task, has_mandatory_deposit, version, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (vendor_id) DO NOTHING
        "#,
    )
    .bind(wallet.vendor_id)
    .bind(wallet.current_balance_paise)
    .bind(wallet.security_deposit_paise)
    .bind(wallet.has_first_task)
    .bind(wallet.has_mandatory_deposit)
    .bind(wallet.version)
    .bind(wallet.created_at)
    .bind(wallet.updated_at)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted > 0 {
        tracing::info!(%vendor_id, "Wallet created");
    }
    Ok(())
}

/// Lock the wallet row for the rest of the transaction.
///
/// With `lazy` settings a missing wallet is created first; without, a missing wallet
/// is `WalletNotFound`.
pub(crate) async fn lock_wallet(
    tx: &mut Transaction<'_, Postgres>,
    vendor_id: Uuid,
    lazy: Option<&WalletSettings>,
) -> Result<VendorWallet, AppError> {
    if let Some(settings) = lazy {
        ensure_wallet(&mut **tx, vendor_id, settings).await?;
    }

    sqlx::query_as::<_, VendorWallet>(
        "SELECT * FROM vendor_wallets WHERE vendor_id = $1 FOR UPDATE",
    )
    .bind(vendor_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(AppError::WalletNotFound)
}

/// Write the aggregate back, refusing if someone else saved a newer version.
pub(crate) async fn save_wallet(
    tx: &mut Transaction<'_, Postgres>,
    wallet: &VendorWallet,
    expected_version: i64,
) -> Result<(), AppError> {
    let updated = sqlx::query(
        r#"
        UPDATE vendor_wallets
        SET current_balance_paise = $1,
            total_earnings_paise = $2,
            total_penalties_paise = $3,
            total_withdrawals_paise = $4,
            total_deposits_paise = $5,
            total_task_acceptance_fees_paise = $6,
            total_cash_collections_paise = $7,
            total_refunds_paise = $8,
            total_manual_adjustments_paise = $9,
            total_tasks_completed = $10,
            total_tasks_rejected = $11,
            total_tasks_cancelled = $12,
            has_first_task = $13,
            has_mandatory_deposit = $14,
            pending_withdrawal_id = $15,
            version = version + 1,
            updated_at = NOW()
        WHERE vendor_id = $16 AND version = $17
        "#,
    )
    .bind(wallet.current_balance_paise)
    .bind(wallet.total_earnings_paise)
    .bind(wallet.total_penalties_paise)
    .bind(wallet.total_withdrawals_paise)
    .bind(wallet.total_deposits_paise)
    .bind(wallet.total_task_acceptance_fees_paise)
    .bind(wallet.total_cash_collections_paise)
    .bind(wallet.total_refunds_paise)
    .bind(wallet.total_manual_adjustments_paise)
    .bind(wallet.total_tasks_completed)
    .bind(wallet.total_tasks_rejected)
    .bind(wallet.total_tasks_cancelled)
    .bind(wallet.has_first_task)
    .bind(wallet.has_mandatory_deposit)
    .bind(wallet.pending_withdrawal_id)
    .bind(wallet.vendor_id)
    .bind(expected_version)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        tracing::warn!(vendor_id = %wallet.vendor_id, expected_version, "Wallet version conflict");
        return Err(AppError::ConcurrentModification);
    }
    Ok(())
}

/// Append a ledger row.
pub(crate) async fn insert_transaction(
    tx: &mut Transaction<'_, Postgres>,
    transaction: &WalletTransaction,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO wallet_transactions (
            id,
            transaction_ref,
            vendor_id,
            transaction_type,
            amount_paise,
            balance_after_paise,
            case_id,
            status,
            description,
            metadata,
            created_at,
            updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(transaction.id)
    .bind(&transaction.transaction_ref)
    .bind(transaction.vendor_id)
    .bind(transaction.transaction_type.as_str())
    .bind(transaction.amount_paise)
    .bind(transaction.balance_after_paise)
    .bind(&transaction.case_id)
    .bind(transaction.status.as_str())
    .bind(&transaction.description)
    .bind(sqlx::types::Json(&transaction.metadata))
    .bind(transaction.created_at)
    .bind(transaction.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Validation(format!(
            "{} already recorded for this case",
            transaction.transaction_type
        )),
        _ => AppError::Database(e),
    })?;

    Ok(())
}

async fn find_case_transaction(
    tx: &mut Transaction<'_, Postgres>,
    vendor_id: Uuid,
    case_id: &str,
    transaction_type: TransactionType,
) -> Result<Option<WalletTransaction>, AppError> {
    let existing = sqlx::query_as::<_, WalletTransaction>(
        r#"
        SELECT * FROM wallet_transactions
        WHERE vendor_id = $1 AND case_id = $2 AND transaction_type = $3
        "#,
    )
    .bind(vendor_id)
    .bind(case_id.trim())
    .bind(transaction_type.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    Ok(existing)
}

/// Settlement kinds recorded at most once per case: the case id and entry type to
/// look for before writing.
type CaseGuard<'a> = Option<(&'a str, TransactionType)>;

/// Lock, apply, write, commit, publish.
///
/// With a case guard, an existing entry for the same case is returned untouched.
/// The wallet row lock serializes the check with concurrent writers for the vendor.
async fn mutate<F>(
    pool: &DbPool,
    notifier: &Notifier,
    vendor_id: Uuid,
    lazy: Option<&WalletSettings>,
    guard: CaseGuard<'_>,
    apply: F,
) -> Result<Recorded, AppError>
where
    F: FnOnce(&mut VendorWallet) -> Result<WalletTransaction, AppError>,
{
    let mut tx = pool.begin().await?;
    let mut wallet = lock_wallet(&mut tx, vendor_id, lazy).await?;
    let version = wallet.version;

    if let Some((case_id, transaction_type)) = guard {
        let existing = find_case_transaction(&mut tx, vendor_id, case_id, transaction_type).await?;
        if let Some(recorded) = settled_already(guard, existing, &wallet) {
            tx.rollback().await?;
            tracing::info!(%vendor_id, case_id, %transaction_type, "Duplicate settlement ignored");
            return Ok(recorded);
        }
    }

    let transaction = apply(&mut wallet)?;

    insert_transaction(&mut tx, &transaction).await?;
    save_wallet(&mut tx, &wallet, version).await?;
    tx.commit().await?;

    tracing::info!(
        %vendor_id,
        transaction_type = %transaction.transaction_type,
        amount_paise = transaction.amount_paise,
        balance_paise = wallet.current_balance_paise,
        "Wallet transaction recorded"
    );
    notifier.publish(WalletEvent::TransactionRecorded {
        transaction: transaction.clone(),
    });

    Ok(Recorded {
        transaction,
        balance_paise: wallet.current_balance_paise,
        duplicate: false,
    })
}

/// Credit the earning for an online-paid task. Re-submitting the same case returns
/// the original entry.
pub async fn record_earning(
    pool: &DbPool,
    notifier: &Notifier,
    settings: &WalletSettings,
    vendor_id: Uuid,
    settlement: TaskSettlement,
) -> Result<Recorded, AppError> {
    let case_id = settlement.case_id.clone();
    mutate(
        pool,
        notifier,
        vendor_id,
        Some(settings),
        Some((case_id.as_str(), TransactionType::Earning)),
        |wallet| wallet.add_earning(settlement, settings),
    )
    .await
}

/// Debit the platform share of a cash-paid task, refusing when the balance does not
/// cover it.
pub async fn record_cash_collection(
    pool: &DbPool,
    notifier: &Notifier,
    settings: &WalletSettings,
    vendor_id: Uuid,
    settlement: TaskSettlement,
) -> Result<Recorded, AppError> {
    let case_id = settlement.case_id.clone();
    mutate(
        pool,
        notifier,
        vendor_id,
        Some(settings),
        Some((case_id.as_str(), TransactionType::CashCollection)),
        |wallet| {
            wallet.check_cash_collection(&settlement, settings)?;
            wallet.add_cash_collection_deduction(settlement, settings)
        },
    )
    .await
}

/// Charge the acceptance fee for a task. Charging the same case twice is a no-op.
pub async fn record_task_acceptance_fee(
    pool: &DbPool,
    notifier: &Notifier,
    settings: &WalletSettings,
    vendor_id: Uuid,
    case_id: &str,
    task_mrp_paise: i64,
    description: Option<String>,
) -> Result<Recorded, AppError> {
    mutate(
        pool,
        notifier,
        vendor_id,
        Some(settings),
        Some((case_id, TransactionType::TaskAcceptanceFee)),
        |wallet| wallet.add_task_acceptance_fee(case_id, task_mrp_paise, description),
    )
    .await
}

pub async fn record_penalty(
    pool: &DbPool,
    notifier: &Notifier,
    settings: &WalletSettings,
    vendor_id: Uuid,
    case_id: &str,
    kind: PenaltyKind,
    amount_paise: Option<i64>,
    description: Option<String>,
) -> Result<Recorded, AppError> {
    mutate(pool, notifier, vendor_id, Some(settings), None, |wallet| {
        wallet.add_penalty(case_id, kind, amount_paise, description, settings)
    })
    .await
}

pub async fn record_deposit(
    pool: &DbPool,
    notifier: &Notifier,
    settings: &WalletSettings,
    vendor_id: Uuid,
    amount_paise: i64,
    description: Option<String>,
) -> Result<Recorded, AppError> {
    mutate(pool, notifier, vendor_id, Some(settings), None, |wallet| {
        wallet.add_deposit(amount_paise, None, None, description, settings)
    })
    .await
}

/// Admin adjustment on an existing wallet.
pub async fn record_manual_adjustment(
    pool: &DbPool,
    notifier: &Notifier,
    vendor_id: Uuid,
    amount_paise: i64,
    adjusted_by: &str,
    reason: &str,
) -> Result<Recorded, AppError> {
    mutate(pool, notifier, vendor_id, None, None, |wallet| {
        wallet.add_manual_adjustment(amount_paise, adjusted_by, reason)
    })
    .await
}

/// Admin payout on an existing wallet.
pub async fn record_direct_withdrawal(
    pool: &DbPool,
    notifier: &Notifier,
    vendor_id: Uuid,
    amount_paise: i64,
    processed_by: &str,
    description: Option<String>,
) -> Result<Recorded, AppError> {
    mutate(pool, notifier, vendor_id, None, None, |wallet| {
        wallet.add_withdrawal(amount_paise, processed_by, description)
    })
    .await
}

/// Create a gateway order for a deposit and remember it for verification.
pub async fn create_deposit_order(
    pool: &DbPool,
    gateway: &PaymentGateway,
    settings: &WalletSettings,
    vendor_id: Uuid,
    amount_paise: i64,
) -> Result<PaymentOrder, AppError> {
    get_or_create_wallet(pool, vendor_id, settings).await?;

    let receipt = format!("dep-{}", &vendor_id.simple().to_string()[..12]);
    let order = gateway.create_order(amount_paise, &receipt).await?;
    if order.amount != amount_paise {
        return Err(AppError::PaymentGateway(format!(
            "order amount {} does not match requested {}",
            order.amount, amount_paise
        )));
    }

    let stored = sqlx::query_as::<_, PaymentOrder>(
        r#"
        INSERT INTO payment_orders (order_id, vendor_id, amount_paise)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&order.id)
    .bind(vendor_id)
    .bind(amount_paise)
    .fetch_one(pool)
    .await?;

    tracing::info!(%vendor_id, order_id = %stored.order_id, amount_paise, "Deposit order created");
    Ok(stored)
}

/// Verify a gateway payment and credit the deposit exactly once per order.
pub async fn verify_deposit_payment(
    pool: &DbPool,
    notifier: &Notifier,
    gateway: &PaymentGateway,
    settings: &WalletSettings,
    vendor_id: Uuid,
    request: VerifyPaymentRequest,
) -> Result<Recorded, AppError> {
    gateway.verify_signature(&request.order_id, &request.payment_id, &request.signature)?;

    let mut tx = pool.begin().await?;
    let mut wallet = lock_wallet(&mut tx, vendor_id, Some(settings)).await?;
    let version = wallet.version;

    let order = sqlx::query_as::<_, PaymentOrder>(
        "SELECT * FROM payment_orders WHERE order_id = $1 AND vendor_id = $2 FOR UPDATE",
    )
    .bind(&request.order_id)
    .bind(vendor_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::PaymentOrderNotFound)?;

    if order.is_paid() {
        let transaction_id = order.transaction_id.ok_or(AppError::PaymentOrderNotFound)?;
        let existing = sqlx::query_as::<_, WalletTransaction>(
            "SELECT * FROM wallet_transactions WHERE id = $1",
        )
        .bind(transaction_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.rollback().await?;

        tracing::info!(%vendor_id, order_id = %order.order_id, "Payment already credited");
        return Ok(Recorded {
            transaction: existing,
            balance_paise: wallet.current_balance_paise,
            duplicate: true,
        });
    }

    let transaction = wallet.add_deposit(
        order.amount_paise,
        Some(order.order_id.clone()),
        Some(request.payment_id.clone()),
        Some("Deposit via payment gateway".to_string()),
        settings,
    )?;
    insert_transaction(&mut tx, &transaction).await?;
    save_wallet(&mut tx, &wallet, version).await?;

    sqlx::query(
        r#"
        UPDATE payment_orders
        SET status = 'paid', payment_id = $1, transaction_id = $2, paid_at = $3
        WHERE order_id = $4
        "#,
    )
    .bind(&request.payment_id)
    .bind(transaction.id)
    .bind(Utc::now())
    .bind(&order.order_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        %vendor_id,
        order_id = %order.order_id,
        amount_paise = order.amount_paise,
        balance_paise = wallet.current_balance_paise,
        "Deposit payment verified"
    );
    notifier.publish(WalletEvent::TransactionRecorded {
        transaction: transaction.clone(),
    });

    Ok(Recorded {
        transaction,
        balance_paise: wallet.current_balance_paise,
        duplicate: false,
    })
}

/// Most recent ledger entries, newest first.
pub async fn recent_transactions(
    pool: &DbPool,
    vendor_id: Uuid,
    limit: i64,
) -> Result<Vec<WalletTransaction>, AppError> {
    let transactions = sqlx::query_as::<_, WalletTransaction>(
        r#"
        SELECT * FROM wallet_transactions
        WHERE vendor_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(vendor_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(transactions)
}

fn push_transaction_filters<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    query: &TransactionQuery,
) {
    if let Some(transaction_type) = query.transaction_type {
        builder
            .push(" AND transaction_type = ")
            .push_bind(transaction_type.as_str());
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(from) = query.from {
        builder.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        builder.push(" AND created_at <= ").push_bind(to);
    }
}

/// Filtered, paginated ledger listing.
pub async fn list_transactions(
    pool: &DbPool,
    vendor_id: Uuid,
    query: &TransactionQuery,
) -> Result<Page<WalletTransaction>, AppError> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(AppError::Validation(
                "'from' must not be after 'to'".to_string(),
            ));
        }
    }
    let params = query.page_params();

    let mut count = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM wallet_transactions WHERE vendor_id = ",
    );
    count.push_bind(vendor_id);
    push_transaction_filters(&mut count, query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select =
        QueryBuilder::<Postgres>::new("SELECT * FROM wallet_transactions WHERE vendor_id = ");
    select.push_bind(vendor_id);
    push_transaction_filters(&mut select, query);
    select
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(params.limit())
        .push(" OFFSET ")
        .push_bind(params.offset());
    let items = select
        .build_query_as::<WalletTransaction>()
        .fetch_all(pool)
        .await?;

    Ok(Page::new(items, params, total))
}

/// All wallets, largest balance first.
pub async fn list_wallets(
    pool: &DbPool,
    params: PageParams,
) -> Result<Page<VendorWallet>, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vendor_wallets")
        .fetch_one(pool)
        .await?;

    let wallets = sqlx::query_as::<_, VendorWallet>(
        r#"
        SELECT * FROM vendor_wallets
        ORDER BY current_balance_paise DESC, vendor_id
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await?;

    Ok(Page::new(wallets, params, total))
}

/// Check a wallet against its complete ledger.
pub async fn reconcile_wallet(
    pool: &DbPool,
    vendor_id: Uuid,
) -> Result<ReconciliationReport, AppError> {
    let mut tx = pool.begin().await?;
    let wallet = lock_wallet(&mut tx, vendor_id, None).await?;

    let transactions = sqlx::query_as::<_, WalletTransaction>(
        "SELECT * FROM wallet_transactions WHERE vendor_id = $1 ORDER BY created_at, id",
    )
    .bind(vendor_id)
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    let report = wallet.reconcile(&transactions);
    if !report.consistent {
        tracing::error!(
            %vendor_id,
            mismatches = ?report.mismatches,
            "Wallet does not match its ledger"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::transaction::PaymentMethod, services::wallet_calculation::SettlementInput,
    };

    fn online_task(case_id: &str) -> TaskSettlement {
        TaskSettlement::new(
            case_id,
            SettlementInput {
                billing_paise: 100_000,
                spare_paise: 0,
                travelling_paise: 0,
                booking_paise: 0,
                payment_method: PaymentMethod::Online,
                gst_included: false,
            },
        )
    }

    #[test]
    fn settled_case_returns_original_entry_and_current_balance() {
        let settings = WalletSettings::default();
        let mut wallet = VendorWallet::new(Uuid::new_v4(), &settings);
        let original = wallet.add_earning(online_task("CASE-1"), &settings).unwrap();
        wallet
            .add_deposit(50_000, None, None, None, &settings)
            .unwrap();

        let recorded = settled_already(
            Some((" CASE-1 ", TransactionType::Earning)),
            Some(original.clone()),
            &wallet,
        )
        .unwrap();

        assert!(recorded.duplicate);
        assert_eq!(recorded.transaction.id, original.id);
        assert_eq!(recorded.balance_paise, 150_000);
    }

    #[test]
    fn unsettled_or_unguarded_case_proceeds() {
        let settings = WalletSettings::default();
        let mut wallet = VendorWallet::new(Uuid::new_v4(), &settings);
        let earning = wallet.add_earning(online_task("CASE-2"), &settings).unwrap();

        let guard = Some(("CASE-2", TransactionType::Earning));
        assert!(settled_already(guard, None, &wallet).is_none());
        assert!(settled_already(None, Some(earning.clone()), &wallet).is_none());
        assert!(
            settled_already(
                Some(("CASE-2", TransactionType::CashCollection)),
                Some(earning.clone()),
                &wallet,
            )
            .is_none()
        );
        assert!(
            settled_already(Some(("CASE-3", TransactionType::Earning)), Some(earning), &wallet)
                .is_none()
        );
    }
}
