//! Data models representing database entities and request/response bodies.

/// API key authentication model
pub mod api_key;
/// Rupee parsing and formatting
pub mod money;
/// Page parameters and paged bodies
pub mod pagination;
/// Payment gateway orders
pub mod payment;
/// Wallet ledger entries
pub mod transaction;
/// Vendor wallet aggregate
pub mod wallet;
/// Webhook endpoints and payloads
pub mod webhook;
/// Withdrawal requests
pub mod withdrawal;
