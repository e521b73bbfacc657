//! API Key model for authentication.
//!
//! API keys authenticate vendors and administrators. They are stored in the database
//! as SHA-256 hashes; the plaintext key is never persisted.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `key_hash`: SHA-256 hash of the actual API key
/// - `owner_name`: Vendor or operator name, recorded on admin actions
/// - `role`: `vendor` or `admin`
/// - `vendor_id`: The wallet a vendor key acts on (NULL for admin keys)
/// - `created_at`: When the key was created
/// - `is_active`: Whether the key is currently valid
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,

    /// SHA-256 hash of the actual API key (64 hex characters)
    pub key_hash: String,

    pub owner_name: String,

    pub role: String,

    pub vendor_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,

    /// Inactive keys are rejected during authentication, revoking access without
    /// deleting the record.
    pub is_active: bool,
}
