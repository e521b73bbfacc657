//! Shared application state.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::WalletSettings, db::DbPool, services::notification_service::Notifier,
    services::payment_gateway::PaymentGateway,
};

/// Everything a handler may need, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub settings: Arc<WalletSettings>,
    pub notifier: Notifier,
    pub gateway: PaymentGateway,
}

/// Lets the auth middleware and the health check extract only the pool.
impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
