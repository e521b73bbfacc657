//! Wallet event publishing.
//!
//! Wallet mutations publish a [`WalletEvent`] after their database transaction
//! commits. Events go onto a bounded channel; a single dispatcher task drains it and
//! hands each event to the webhook service. Publishing never blocks and never fails
//! the request: if the channel is full or the dispatcher has stopped, the event is
//! dropped with a warning.

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::{
    db::DbPool,
    models::{transaction::WalletTransaction, withdrawal::WithdrawalRequest},
    services::webhook_service,
};

/// Something that happened to a wallet.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WalletEvent {
    TransactionRecorded {
        transaction: WalletTransaction,
    },
    WithdrawalRequested {
        withdrawal: WithdrawalRequest,
        transaction: WalletTransaction,
    },
    WithdrawalApproved {
        withdrawal: WithdrawalRequest,
    },
    WithdrawalDeclined {
        withdrawal: WithdrawalRequest,
        refund: WalletTransaction,
    },
}

impl WalletEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            WalletEvent::TransactionRecorded { .. } => "wallet.transaction_recorded",
            WalletEvent::WithdrawalRequested { .. } => "withdrawal.requested",
            WalletEvent::WithdrawalApproved { .. } => "withdrawal.approved",
            WalletEvent::WithdrawalDeclined { .. } => "withdrawal.declined",
        }
    }

    pub fn vendor_id(&self) -> Uuid {
        match self {
            WalletEvent::TransactionRecorded { transaction } => transaction.vendor_id,
            WalletEvent::WithdrawalRequested { withdrawal, .. }
            | WalletEvent::WithdrawalApproved { withdrawal }
            | WalletEvent::WithdrawalDeclined { withdrawal, .. } => withdrawal.vendor_id,
        }
    }
}

/// Cloneable publishing handle kept in the application state.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: mpsc::Sender<WalletEvent>,
}

impl Notifier {
    /// Create a notifier and the receiving end for the dispatcher.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<WalletEvent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }

    /// Best-effort publish.
    pub fn publish(&self, event: WalletEvent) {
        let event_type = event.event_type();
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    event_type,
                    vendor_id = %event.vendor_id(),
                    "Notification queue full, dropping event"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(event_type, "Notification dispatcher stopped, dropping event");
            }
        }
    }
}

/// Drain the channel until every [`Notifier`] is dropped.
pub async fn run_dispatcher(
    pool: DbPool,
    client: reqwest::Client,
    mut receiver: mpsc::Receiver<WalletEvent>,
) {
    tracing::info!("Notification dispatcher started");
    while let Some(event) = receiver.recv().await {
        if let Err(e) = webhook_service::deliver_event(&pool, &client, &event).await {
            tracing::error!(
                event_type = event.event_type(),
                "Failed to deliver wallet event: {:?}",
                e
            );
        }
    }
    tracing::info!("Notification dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::WalletSettings,
        models::wallet::VendorWallet,
    };

    fn recorded_event() -> WalletEvent {
        let mut wallet = VendorWallet::new(Uuid::new_v4(), &WalletSettings::default());
        let transaction = wallet
            .add_deposit(100_000, None, None, None, &WalletSettings::default())
            .unwrap();
        WalletEvent::TransactionRecorded { transaction }
    }

    #[tokio::test]
    async fn published_events_reach_the_receiver() {
        let (notifier, mut receiver) = Notifier::channel(4);
        let event = recorded_event();
        let vendor_id = event.vendor_id();

        notifier.publish(event);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type(), "wallet.transaction_recorded");
        assert_eq!(received.vendor_id(), vendor_id);
    }

    #[tokio::test]
    async fn full_or_closed_queue_does_not_panic() {
        let (notifier, receiver) = Notifier::channel(1);
        notifier.publish(recorded_event());
        notifier.publish(recorded_event());

        drop(receiver);
        notifier.publish(recorded_event());
    }

    #[test]
    fn events_serialize_without_variant_wrapper() {
        let value = serde_json::to_value(recorded_event()).unwrap();
        assert_eq!(value["transaction"]["transaction_type"], "deposit");
        assert_eq!(value["transaction"]["amount_paise"], 100_000);
    }
}
