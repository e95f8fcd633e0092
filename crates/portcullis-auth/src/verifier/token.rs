//! Bearer-token verification delegated to an identity provider.

use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;

use crate::error::AuthError;
use crate::identity::IdentityContext;
use crate::TokenValidator;

/// Parses `Authorization: Bearer <token>` and asks a [`TokenValidator`] about it.
#[derive(Clone)]
pub struct TokenVerifier {
    validator: Arc<dyn TokenValidator>,
    timeout: Duration,
}

impl TokenVerifier {
    /// Create a verifier that gives the validator at most `timeout` per token.
    pub fn new(validator: Arc<dyn TokenValidator>, timeout: Duration) -> Self {
        Self { validator, timeout }
    }

    /// Verify the request headers.
    ///
    /// A malformed header fails without contacting the identity provider.
    /// Dropping the returned future aborts an in-flight validation.
    pub async fn verify(&self, headers: &HeaderMap) -> Result<IdentityContext, AuthError> {
        let token = extract_bearer_token(headers)?;

        let verified = tokio::time::timeout(self.timeout, self.validator.validate(token))
            .await
            .map_err(|_| AuthError::Timeout(self.timeout))??;

        Ok(IdentityContext::from_token(verified.subject, verified.claims))
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Extract the token from an `Authorization` header.
///
/// The scheme must be `Bearer` (any ASCII case), followed by exactly one space
/// and a single non-empty token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| malformed("header is not visible ASCII"))?;

    if value.is_empty() {
        return Err(AuthError::MissingCredential);
    }

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| malformed("expected '<scheme> <token>'"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(malformed("unsupported scheme"));
    }
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(malformed("expected a single bearer token"));
    }

    Ok(token)
}

fn malformed(reason: &str) -> AuthError {
    AuthError::MalformedHeader(format!("Authorization: {reason}"))
}
