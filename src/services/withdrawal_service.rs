//! Withdrawal request workflow.
//!
//! A request debits the wallet immediately with a pending `withdrawal_request` entry.
//! An admin then approves it (the entry becomes `approved`) or declines it (the entry
//! becomes `rejected` and a `refund` entry credits the amount back).
//!
//! Lock order is always wallet row first, then request row.

use sqlx::{Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::{
    config::WalletSettings,
    db::DbPool,
    error::AppError,
    models::{
        pagination::{Page, PageParams},
        transaction::WalletTransaction,
        wallet::WithdrawalSettlement,
        withdrawal::{WithdrawalRequest, WithdrawalStatus},
    },
    services::{
        notification_service::{Notifier, WalletEvent},
        wallet_service::{insert_transaction, lock_wallet, save_wallet},
    },
};

/// A newly created request together with its debit entry.
#[derive(Debug, serde::Serialize)]
pub struct CreatedWithdrawal {
    pub withdrawal: WithdrawalRequest,
    pub transaction: WalletTransaction,
    pub balance_paise: i64,
}

/// Open a withdrawal request and debit the wallet in one transaction.
pub async fn create_withdrawal_request(
    pool: &DbPool,
    notifier: &Notifier,
    settings: &WalletSettings,
    vendor_id: Uuid,
    amount_paise: i64,
) -> Result<CreatedWithdrawal, AppError> {
    let mut tx = pool.begin().await?;
    let mut wallet = lock_wallet(&mut tx, vendor_id, Some(settings)).await?;
    let version = wallet.version;

    let (withdrawal, transaction) = wallet.request_withdrawal(amount_paise, settings)?;

    insert_transaction(&mut tx, &transaction).await?;
    sqlx::query(
        r#"
        INSERT INTO withdrawal_requests (
            id,
            vendor_id,
            amount_paise,
            status,
            transaction_id,
            created_at,
            updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(withdrawal.id)
    .bind(withdrawal.vendor_id)
    .bind(withdrawal.amount_paise)
    .bind(withdrawal.status.as_str())
    .bind(withdrawal.transaction_id)
    .bind(withdrawal.created_at)
    .bind(withdrawal.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::DuplicatePendingRequest,
        _ => AppError::Database(e),
    })?;
    save_wallet(&mut tx, &wallet, version).await?;

    tx.commit().await?;

    tracing::info!(
        %vendor_id,
        withdrawal_id = %withdrawal.id,
        amount_paise,
        balance_paise = wallet.current_balance_paise,
        "Withdrawal requested"
    );
    notifier.publish(WalletEvent::WithdrawalRequested {
        withdrawal: withdrawal.clone(),
        transaction: transaction.clone(),
    });

    Ok(CreatedWithdrawal {
        withdrawal,
        transaction,
        balance_paise: wallet.current_balance_paise,
    })
}

#[derive(Debug, Clone, Copy)]
enum Decision {
    Approve,
    Decline,
}

async fn lock_request(
    tx: &mut Transaction<'_, Postgres>,
    request_id: Uuid,
) -> Result<WithdrawalRequest, AppError> {
    sqlx::query_as::<_, WithdrawalRequest>(
        "SELECT * FROM withdrawal_requests WHERE id = $1 FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(AppError::WithdrawalNotFound)
}

async fn decide(
    pool: &DbPool,
    notifier: &Notifier,
    request_id: Uuid,
    processed_by: &str,
    admin_notes: Option<String>,
    decision: Decision,
) -> Result<WithdrawalRequest, AppError> {
    let vendor_id: Uuid =
        sqlx::query_scalar("SELECT vendor_id FROM withdrawal_requests WHERE id = $1")
            .bind(request_id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::WithdrawalNotFound)?;

    let mut tx = pool.begin().await?;
    let mut wallet = lock_wallet(&mut tx, vendor_id, None).await?;
    let version = wallet.version;
    let request = lock_request(&mut tx, request_id).await?;

    let WithdrawalSettlement {
        request,
        transaction_status,
        refund,
    } = match decision {
        Decision::Approve => wallet.approve_withdrawal(request, processed_by, admin_notes)?,
        Decision::Decline => wallet.decline_withdrawal(request, processed_by, admin_notes)?,
    };

    sqlx::query(
        r#"
        UPDATE withdrawal_requests
        SET status = $1, processed_by = $2, admin_notes = $3, updated_at = $4, processed_at = $5
        WHERE id = $6
        "#,
    )
    .bind(request.status.as_str())
    .bind(&request.processed_by)
    .bind(&request.admin_notes)
    .bind(request.updated_at)
    .bind(request.processed_at)
    .bind(request.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE wallet_transactions SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(transaction_status.as_str())
        .bind(request.updated_at)
        .bind(request.transaction_id)
        .execute(&mut *tx)
        .await?;

    if let Some(refund) = &refund {
        insert_transaction(&mut tx, refund).await?;
    }
    save_wallet(&mut tx, &wallet, version).await?;

    tx.commit().await?;

    tracing::info!(
        %vendor_id,
        withdrawal_id = %request.id,
        status = %request.status,
        processed_by,
        balance_paise = wallet.current_balance_paise,
        "Withdrawal request settled"
    );
    match refund {
        Some(refund) => notifier.publish(WalletEvent::WithdrawalDeclined {
            withdrawal: request.clone(),
            refund,
        }),
        None => notifier.publish(WalletEvent::WithdrawalApproved {
            withdrawal: request.clone(),
        }),
    }

    Ok(request)
}

pub async fn approve_withdrawal(
    pool: &DbPool,
    notifier: &Notifier,
    request_id: Uuid,
    processed_by: &str,
    admin_notes: Option<String>,
) -> Result<WithdrawalRequest, AppError> {
    decide(
        pool,
        notifier,
        request_id,
        processed_by,
        admin_notes,
        Decision::Approve,
    )
    .await
}

/// Decline a pending request and refund the debited amount.
pub async fn decline_withdrawal(
    pool: &DbPool,
    notifier: &Notifier,
    request_id: Uuid,
    processed_by: &str,
    admin_notes: Option<String>,
) -> Result<WithdrawalRequest, AppError> {
    decide(
        pool,
        notifier,
        request_id,
        processed_by,
        admin_notes,
        Decision::Decline,
    )
    .await
}

/// Requests newest first, optionally for one vendor and one status.
pub async fn list_withdrawals(
    pool: &DbPool,
    vendor_id: Option<Uuid>,
    status: Option<WithdrawalStatus>,
    params: PageParams,
) -> Result<Page<WithdrawalRequest>, AppError> {
    fn push_filters(
        builder: &mut QueryBuilder<'_, Postgres>,
        vendor_id: Option<Uuid>,
        status: Option<WithdrawalStatus>,
    ) {
        builder.push(" WHERE TRUE");
        if let Some(vendor_id) = vendor_id {
            builder.push(" AND vendor_id = ").push_bind(vendor_id);
        }
        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
    }

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM withdrawal_requests");
    push_filters(&mut count, vendor_id, status);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM withdrawal_requests");
    push_filters(&mut select, vendor_id, status);
    select
        .push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(params.limit())
        .push(" OFFSET ")
        .push_bind(params.offset());
    let items = select
        .build_query_as::<WithdrawalRequest>()
        .fetch_all(pool)
        .await?;

    Ok(Page::new(items, params, total))
}
