use axum::{
    extract::{FromRequestParts, Query},
    http::{request::Parts, HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

use crate::auth::jwt;

/// Role assigned when no identity source supplies one.
pub const DEFAULT_ROLE: &str = "guest";

/// Role allowed to originate events over HTTP.
pub const ADMIN_ROLE: &str = "admin";

/// JWT claims extracted from Authorization: Bearer header.
/// Implements axum's FromRequestParts for use as an extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Coarse role tag ("user", "admin", ...)
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Reject callers that are not admins with 403.
    pub fn require_admin(&self) -> Result<(), (StatusCode, String)> {
        if self.role == ADMIN_ROLE {
            Ok(())
        } else {
            Err((StatusCode::FORBIDDEN, "Admin role required".to_string()))
        }
    }
}

impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        // Get JWT secret from request extensions (set by middleware layer)
        let jwt_secret = parts
            .extensions
            .get::<JwtSecret>()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

        jwt::validate_access_token(&jwt_secret.0, token).map_err(|_| StatusCode::UNAUTHORIZED)
    }
}

/// JWT secret stored in request extensions for the Claims extractor
#[derive(Clone)]
pub struct JwtSecret(pub Vec<u8>);

/// Identity of a connecting client. Upstream middleware may insert one into
/// the request extensions; the upgrade handler resolves one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Empty for anonymous clients.
    pub user_id: String,
    pub role: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            role: DEFAULT_ROLE.to_string(),
        }
    }
}

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct IdentityQuery {
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub user_role: Option<String>,
}

/// Extractor for the upgrade endpoint. Never rejects: a client with no usable
/// identity connects as an anonymous guest.
///
/// Sources, in order of preference:
/// 1. bearer token (`Authorization` header, then `?token=`)
/// 2. `?user_id=` / `?user_role=`
/// 3. an [`Identity`] extension set by upstream middleware
///
/// User id and role are resolved independently, so a query-supplied user id
/// can be paired with a middleware-supplied role.
pub struct ConnectIdentity(pub Identity);

impl<S> FromRequestParts<S> for ConnectIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = Query::<IdentityQuery>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();

        let claims = parts.extensions.get::<JwtSecret>().and_then(|secret| {
            let token = bearer_token(&parts.headers).or(query.token.as_deref())?;
            match jwt::validate_access_token(&secret.0, token) {
                Ok(claims) => Some(claims),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring invalid bearer token on upgrade");
                    None
                }
            }
        });

        let upstream = parts.extensions.get::<Identity>();

        Ok(Self(resolve_identity(claims.as_ref(), &query, upstream)))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

/// Pick user id and role from the first source that supplies each.
pub fn resolve_identity(
    claims: Option<&Claims>,
    query: &IdentityQuery,
    upstream: Option<&Identity>,
) -> Identity {
    let non_empty = |s: &&str| !s.is_empty();

    let user_id = claims
        .map(|c| c.sub.as_str())
        .filter(non_empty)
        .or(query.user_id.as_deref().filter(non_empty))
        .or(upstream.map(|i| i.user_id.as_str()).filter(non_empty))
        .unwrap_or_default();

    let role = claims
        .map(|c| c.role.as_str())
        .filter(non_empty)
        .or(query.user_role.as_deref().filter(non_empty))
        .or(upstream.map(|i| i.role.as_str()).filter(non_empty))
        .unwrap_or(DEFAULT_ROLE);

    Identity {
        user_id: user_id.to_string(),
        role: role.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, role: &str) -> Claims {
        Claims {
            sub: sub.into(),
            role: role.into(),
            email: None,
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn test_token_wins_over_query_and_upstream() {
        let query = IdentityQuery {
            user_id: Some("q-user".into()),
            user_role: Some("user".into()),
            ..Default::default()
        };
        let upstream = Identity {
            user_id: "mw-user".into(),
            role: "user".into(),
        };
        let id = resolve_identity(Some(&claims("t-user", "admin")), &query, Some(&upstream));
        assert_eq!(id.user_id, "t-user");
        assert_eq!(id.role, "admin");
    }

    #[test]
    fn test_query_then_upstream() {
        let query = IdentityQuery {
            user_id: Some("q-user".into()),
            ..Default::default()
        };
        let upstream = Identity {
            user_id: "mw-user".into(),
            role: "admin".into(),
        };
        let id = resolve_identity(None, &query, Some(&upstream));
        assert_eq!(id.user_id, "q-user");
        assert_eq!(id.role, "admin");
    }

    #[test]
    fn test_anonymous_guest_fallback() {
        let id = resolve_identity(None, &IdentityQuery::default(), None);
        assert_eq!(id, Identity::default());
        assert!(id.user_id.is_empty());
        assert_eq!(id.role, DEFAULT_ROLE);
    }

    #[test]
    fn test_empty_token_role_falls_through() {
        let query = IdentityQuery {
            user_role: Some("user".into()),
            ..Default::default()
        };
        let id = resolve_identity(Some(&claims("u1", "")), &query, None);
        assert_eq!(id.user_id, "u1");
        assert_eq!(id.role, "user");
    }

    #[test]
    fn test_require_admin() {
        assert!(claims("u", ADMIN_ROLE).require_admin().is_ok());
        let (status, _) = claims("u", "user").require_admin().unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
