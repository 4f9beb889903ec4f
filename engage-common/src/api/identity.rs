//! Caller identity supplied by the gateway
//!
//! The gateway authenticates users and forwards two headers:
//! - `x-engage-user`: the user's UUID
//! - `x-engage-role`: one of `admin`, `executive`, `staff`, `public`
//!
//! Handlers take [`CallerIdentity`] as an extractor. Requests without valid
//! headers are answered with 401 before the handler runs. Handlers that serve
//! anonymous callers take `Option<CallerIdentity>` instead.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::models::{AccessTier, UserRole};

pub const USER_HEADER: &str = "x-engage-user";
pub const ROLE_HEADER: &str = "x-engage-role";

/// Authenticated caller, as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl CallerIdentity {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role }
    }

    pub fn tier(&self) -> AccessTier {
        self.role.tier()
    }

    /// True when the caller's tier is at least `tier`
    pub fn has_tier(&self, tier: AccessTier) -> bool {
        self.tier() >= tier
    }

    pub fn is_elevated(&self) -> bool {
        self.has_tier(AccessTier::Elevated)
    }

    /// Elevated callers see everything; everyone else only what they own
    pub fn can_view_owned_by(&self, owner: Uuid) -> bool {
        self.is_elevated() || self.user_id == owner
    }

    fn from_parts(parts: &Parts) -> Result<Self, IdentityRejection> {
        let user = header_value(parts, USER_HEADER)?;
        let role = header_value(parts, ROLE_HEADER)?;

        let user_id = Uuid::parse_str(user.trim())
            .map_err(|_| IdentityRejection::InvalidHeader(USER_HEADER))?;
        let role = role
            .parse::<UserRole>()
            .map_err(|_| IdentityRejection::InvalidHeader(ROLE_HEADER))?;

        Ok(Self { user_id, role })
    }
}

fn header_value<'a>(parts: &'a Parts, name: &'static str) -> Result<&'a str, IdentityRejection> {
    parts
        .headers
        .get(name)
        .ok_or(IdentityRejection::MissingHeader(name))?
        .to_str()
        .map_err(|_| IdentityRejection::InvalidHeader(name))
}

/// Why a request carried no usable identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityRejection {
    MissingHeader(&'static str),
    InvalidHeader(&'static str),
}

impl std::fmt::Display for IdentityRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityRejection::MissingHeader(name) => write!(f, "Missing header: {}", name),
            IdentityRejection::InvalidHeader(name) => write!(f, "Invalid header: {}", name),
        }
    }
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": self.to_string(),
            }
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = Self::from_parts(parts);
        if let Err(ref rejection) = identity {
            tracing::debug!(path = %parts.uri.path(), "Rejected request: {}", rejection);
        }
        identity
    }
}
