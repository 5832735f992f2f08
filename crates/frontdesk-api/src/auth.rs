//! Staff authentication.
//!
//! An SSO proxy in front of the service asserts the caller's identity in
//! headers and signs them with a shared secret:
//!
//! ```text
//! x-staff-id:          sso|42
//! x-staff-name:        Ada Lovelace
//! x-staff-permissions: chat:customer,admin
//! x-staff-signature:   hex(HMAC-SHA256(secret, "sso|42\nAda Lovelace\nchat:customer,admin"))
//! ```
//!
//! A valid identity is upserted as a staff member and becomes the request's
//! context.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use frontdesk_core::{Error, Permission, Staff, UpsertStaffRequest, Visibility};

use crate::error::ApiError;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const STAFF_ID_HEADER: &str = "x-staff-id";
pub const STAFF_NAME_HEADER: &str = "x-staff-name";
pub const STAFF_PERMISSIONS_HEADER: &str = "x-staff-permissions";
pub const STAFF_SIGNATURE_HEADER: &str = "x-staff-signature";

fn signing_input(external_id: &str, display_name: &str, permissions: &str) -> String {
    format!("{external_id}\n{display_name}\n{permissions}")
}

fn identity_mac(
    secret: &str,
    external_id: &str,
    display_name: &str,
    permissions: &str,
) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(signing_input(external_id, display_name, permissions).as_bytes());
    Some(mac)
}

/// Hex signature the proxy is expected to send.
pub fn sign_identity(
    secret: &str,
    external_id: &str,
    display_name: &str,
    permissions: &str,
) -> String {
    identity_mac(secret, external_id, display_name, permissions)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Check a hex signature in constant time.
pub fn verify_identity(
    secret: &str,
    external_id: &str,
    display_name: &str,
    permissions: &str,
    signature: &str,
) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    identity_mac(secret, external_id, display_name, permissions)
        .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}

/// Comma list of permission names. Unknown names are dropped.
pub fn parse_permissions(raw: &str) -> Vec<Permission> {
    let mut permissions = Vec::new();
    for permission in raw.split(',').filter_map(Permission::parse) {
        if !permissions.contains(&permission) {
            permissions.push(permission);
        }
    }
    permissions
}

/// Verified identity from the proxy headers.
#[derive(Debug, Clone, PartialEq)]
pub struct StaffIdentity {
    pub external_id: String,
    pub display_name: String,
    pub permissions: Vec<Permission>,
}

impl StaffIdentity {
    pub fn from_headers(headers: &HeaderMap, secret: Option<&str>) -> Result<Self, Error> {
        let secret = secret
            .ok_or_else(|| Error::Disabled("Staff authentication is not configured".to_string()))?;

        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let missing = || Error::Unauthorized("Missing staff identity".to_string());

        let external_id = header(STAFF_ID_HEADER).ok_or_else(missing)?;
        let display_name = header(STAFF_NAME_HEADER).ok_or_else(missing)?;
        let signature = header(STAFF_SIGNATURE_HEADER).ok_or_else(missing)?;
        let permissions = header(STAFF_PERMISSIONS_HEADER).unwrap_or("");

        if !verify_identity(secret, external_id, display_name, permissions, signature) {
            return Err(Error::Unauthorized(
                "Invalid staff identity signature".to_string(),
            ));
        }

        Ok(Self {
            external_id: external_id.to_string(),
            display_name: display_name.to_string(),
            permissions: parse_permissions(permissions),
        })
    }
}

/// Authenticated staff member.
#[derive(Debug, Clone)]
pub struct AuthStaff(pub Staff);

impl AuthStaff {
    pub fn visibility(&self) -> Visibility {
        Visibility::for_staff(&self.0)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthStaff {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity =
            StaffIdentity::from_headers(&parts.headers, state.config.staff_auth_secret.as_deref())?;
        let staff = state
            .db
            .staff
            .upsert(UpsertStaffRequest {
                external_id: identity.external_id,
                display_name: identity.display_name,
                permissions: identity.permissions,
            })
            .await?;
        debug!(
            subsystem = "api",
            component = "auth",
            staff_id = %staff.id,
            "Staff authenticated"
        );
        Ok(AuthStaff(staff))
    }
}

/// Authenticated staff member holding `admin`.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Staff);

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthStaff(staff) = AuthStaff::from_request_parts(parts, state).await?;
        if !staff.is_admin() {
            return Err(Error::Forbidden("Admin permission required".to_string()).into());
        }
        Ok(RequireAdmin(staff))
    }
}
