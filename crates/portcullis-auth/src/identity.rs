//! Resolved caller identity and the accessors downstream handlers use.
//!
//! The auth middleware stores exactly one [`IdentityContext`] in the request
//! extensions when a verifier succeeds. In pass-through mode nothing is stored,
//! so every accessor returns `None` rather than a placeholder identity.

use std::fmt;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::response::Response;
use http::request::Parts;
use serde::Serialize;

use crate::middleware::unauthorized_response;

/// Token claims as decoded from the identity provider.
pub type Claims = serde_json::Map<String, serde_json::Value>;

/// Which verifier authenticated the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// `Authorization: Bearer <token>`, verified by the identity provider.
    Token,
    /// `X-API-Key: <key>`, checked against the accepted set.
    ApiKey,
}

impl AuthMethod {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Token => "token",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity attached to an authenticated request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IdentityContext {
    subject: String,
    method: AuthMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    claims: Option<Claims>,
}

impl IdentityContext {
    /// Identity resolved from a verified bearer token.
    pub fn from_token(subject: impl Into<String>, claims: Claims) -> Self {
        Self {
            subject: subject.into(),
            method: AuthMethod::Token,
            claims: Some(claims),
        }
    }

    /// Identity resolved from an accepted API key.
    ///
    /// The key itself is the subject: callers sharing a key share an identity.
    pub fn from_api_key(key: impl Into<String>) -> Self {
        Self {
            subject: key.into(),
            method: AuthMethod::ApiKey,
            claims: None,
        }
    }

    /// Subject identifier (token `sub`, or the API key).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Winning verification method.
    pub fn method(&self) -> AuthMethod {
        self.method
    }

    /// Token claims; `None` for API-key identities.
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }
}

/// Get the identity from request extensions, if the request was authenticated.
pub fn identity_from_extensions(extensions: &http::Extensions) -> Option<&IdentityContext> {
    extensions.get::<IdentityContext>()
}

/// Get the identity from request `Parts`, if the request was authenticated.
pub fn identity_from_parts(parts: &Parts) -> Option<&IdentityContext> {
    identity_from_extensions(&parts.extensions)
}

/// Subject of the authenticated caller.
pub fn subject_from_parts(parts: &Parts) -> Option<&str> {
    identity_from_parts(parts).map(IdentityContext::subject)
}

/// Method that authenticated the caller.
pub fn method_from_parts(parts: &Parts) -> Option<AuthMethod> {
    identity_from_parts(parts).map(IdentityContext::method)
}

/// Claims of the authenticated caller; `None` when unauthenticated or API-key.
pub fn claims_from_parts(parts: &Parts) -> Option<&Claims> {
    identity_from_parts(parts).and_then(IdentityContext::claims)
}

/// Axum extractor for the request's [`IdentityContext`].
///
/// `Identity` rejects with the standard 401 when no identity is attached.
/// Use `Option<Identity>` on routes that must also work in pass-through mode.
#[derive(Clone, Debug)]
pub struct Identity(pub IdentityContext);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from_parts(parts)
            .cloned()
            .map(Identity)
            .ok_or_else(unauthorized_response)
    }
}

impl<S> OptionalFromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(identity_from_parts(parts).cloned().map(Identity))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn claims() -> Claims {
        let mut claims = Claims::new();
        claims.insert("email".to_string(), "alice@example.com".into());
        claims
    }

    fn parts_with(identity: Option<IdentityContext>) -> Parts {
        let (mut parts, _body) = http::Request::new(()).into_parts();
        if let Some(identity) = identity {
            parts.extensions.insert(identity);
        }
        parts
    }

    #[test]
    fn test_token_identity_accessors() {
        let parts = parts_with(Some(IdentityContext::from_token("uid_1", claims())));
        assert_eq!(subject_from_parts(&parts), Some("uid_1"));
        assert_eq!(method_from_parts(&parts), Some(AuthMethod::Token));
        assert_eq!(
            claims_from_parts(&parts).unwrap()["email"],
            "alice@example.com"
        );
    }

    #[test]
    fn test_api_key_identity_has_no_claims() {
        let parts = parts_with(Some(IdentityContext::from_api_key("k1")));
        assert_eq!(subject_from_parts(&parts), Some("k1"));
        assert_eq!(method_from_parts(&parts), Some(AuthMethod::ApiKey));
        assert!(claims_from_parts(&parts).is_none());
    }

    #[test]
    fn test_absent_identity() {
        let parts = parts_with(None);
        assert!(identity_from_parts(&parts).is_none());
        assert!(subject_from_parts(&parts).is_none());
        assert!(method_from_parts(&parts).is_none());
        assert!(claims_from_parts(&parts).is_none());
    }

    #[test]
    fn test_method_names() {
        assert_eq!(AuthMethod::Token.to_string(), "token");
        assert_eq!(AuthMethod::ApiKey.as_str(), "api_key");
        assert_eq!(
            serde_json::to_value(AuthMethod::ApiKey).unwrap(),
            serde_json::json!("api_key")
        );
    }

    #[tokio::test]
    async fn test_identity_extractor() {
        let mut parts = parts_with(Some(IdentityContext::from_api_key("k1")));
        let Identity(identity) =
            <Identity as FromRequestParts<()>>::from_request_parts(&mut parts, &())
                .await
                .unwrap();
        assert_eq!(identity.subject(), "k1");
    }

    #[tokio::test]
    async fn test_identity_extractor_rejects_without_identity() {
        let mut parts = parts_with(None);
        let rejection = <Identity as FromRequestParts<()>>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_optional_identity_extractor() {
        let mut parts = parts_with(None);
        let identity =
            <Identity as OptionalFromRequestParts<()>>::from_request_parts(&mut parts, &())
                .await
                .unwrap();
        assert!(identity.is_none());
    }
}
