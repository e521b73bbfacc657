//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it and verify it exists in the database
//! 3. Inject authentication context into the request
//! 4. Reject unauthorized requests with HTTP 401
//!
//! [`admin_only`] runs after it on the admin routes and rejects vendor keys with 403.

use crate::{db::DbPool, error::AppError, models::api_key::ApiKey};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// What an API key is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Acts on the single wallet named by the key.
    Vendor,
    /// Operates on every wallet and settles withdrawals.
    Admin,
}

/// Authentication context attached to authenticated requests.
///
/// This struct is inserted into the request's extension map and can be
/// extracted by route handlers to know who made the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated API key
    pub api_key_id: Uuid,

    /// Recorded as `processed_by` / `adjusted_by` on admin actions
    pub owner_name: String,

    pub role: Role,

    vendor_id: Option<Uuid>,
}

impl AuthContext {
    /// The wallet a vendor key acts on.
    pub fn vendor_id(&self) -> Result<Uuid, AppError> {
        match (self.role, self.vendor_id) {
            (Role::Vendor, Some(vendor_id)) => Ok(vendor_id),
            _ => Err(AppError::Forbidden(
                "this route requires a vendor API key".to_string(),
            )),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl TryFrom<ApiKey> for AuthContext {
    type Error = AppError;

    fn try_from(key: ApiKey) -> Result<Self, Self::Error> {
        let role = match key.role.as_str() {
            "vendor" => Role::Vendor,
            "admin" => Role::Admin,
            other => {
                tracing::error!(api_key_id = %key.id, role = other, "API key has unknown role");
                return Err(AppError::InvalidApiKey);
            }
        };

        Ok(Self {
            api_key_id: key.id,
            owner_name: key.owner_name,
            role,
            vendor_id: key.vendor_id,
        })
    }
}

/// SHA-256 hex digest of a presented key, as stored in `api_keys.key_hash`.
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256
/// 3. Query database for matching hash where `is_active = true`
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
///
/// # Returns
///
/// - `Ok(Response)` if authenticated successfully (calls next handler)
/// - `Err(AppError::InvalidApiKey)` if authentication fails (returns 401)
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(AppError::InvalidApiKey)?;

    let key_hash = hash_api_key(api_key);

    let api_key_record = sqlx::query_as::<_, ApiKey>(
        "SELECT id, key_hash, owner_name, role, vendor_id, created_at, is_active
         FROM api_keys
         WHERE key_hash = $1 AND is_active = true",
    )
    .bind(&key_hash)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    let auth_context = AuthContext::try_from(api_key_record)?;

    // Route handlers extract this with Extension<AuthContext>
    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

/// Reject non-admin keys. Must run after [`auth_middleware`].
pub async fn admin_only(request: Request, next: Next) -> Result<Response, AppError> {
    let is_admin = request
        .extensions()
        .get::<AuthContext>()
        .map(AuthContext::is_admin)
        .ok_or(AppError::InvalidApiKey)?;

    if !is_admin {
        return Err(AppError::Forbidden(
            "this route requires an admin API key".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn key(role: &str, vendor_id: Option<Uuid>) -> ApiKey {
        ApiKey {
            id: Uuid::new_v4(),
            key_hash: hash_api_key("k"),
            owner_name: "ops".to_string(),
            role: role.to_string(),
            vendor_id,
            created_at: Utc::now(),
            is_active: true,
        }
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn vendor_key_resolves_its_wallet() {
        let vendor_id = Uuid::new_v4();
        let ctx = AuthContext::try_from(key("vendor", Some(vendor_id))).unwrap();
        assert_eq!(ctx.vendor_id().unwrap(), vendor_id);
        assert!(!ctx.is_admin());
    }

    #[test]
    fn admin_key_has_no_vendor_wallet() {
        let ctx = AuthContext::try_from(key("admin", None)).unwrap();
        assert!(ctx.is_admin());
        assert!(matches!(ctx.vendor_id(), Err(AppError::Forbidden(_))));
    }

    async fn guarded_status(role: &str, vendor_id: Option<Uuid>) -> axum::http::StatusCode {
        use axum::{Router, body::Body, routing::get};
        use tower::ServiceExt;

        let ctx = AuthContext::try_from(key(role, vendor_id)).unwrap();
        let app = Router::new()
            .route("/admin", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(admin_only))
            .layer(axum::middleware::from_fn(
                move |mut request: Request, next: Next| {
                    let ctx = ctx.clone();
                    async move {
                        request.extensions_mut().insert(ctx);
                        next.run(request).await
                    }
                },
            ));

        app.oneshot(
            axum::http::Request::builder()
                .uri("/admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn admin_only_lets_admins_through() {
        assert_eq!(guarded_status("admin", None).await, axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_only_forbids_vendor_keys() {
        assert_eq!(
            guarded_status("vendor", Some(Uuid::new_v4())).await,
            axum::http::StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(matches!(
            AuthContext::try_from(key("superuser", None)),
            Err(AppError::InvalidApiKey)
        ));
    }
}
