//! Business logic services.
//!
//! Services contain the wallet rules and their persistence, separated from HTTP
//! handlers. They handle database transactions, locking, and event publishing.

pub mod notification_service;
pub mod payment_gateway;
pub mod signature;
pub mod wallet_calculation;
pub mod wallet_service;
pub mod webhook_service;
pub mod withdrawal_service;
