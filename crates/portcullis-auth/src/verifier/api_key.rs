//! Shared-secret verification via the `X-API-Key` header.

use std::collections::HashSet;

use http::HeaderMap;

use crate::error::AuthError;
use crate::identity::IdentityContext;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Checks `X-API-Key` against a fixed set of accepted keys.
#[derive(Clone)]
pub struct ApiKeyVerifier {
    accepted: HashSet<String>,
}

impl ApiKeyVerifier {
    /// Create a verifier accepting exactly the given keys.
    pub fn new(accepted: HashSet<String>) -> Self {
        Self { accepted }
    }

    /// Verify the request headers.
    ///
    /// On success the key itself becomes the subject.
    pub fn verify(&self, headers: &HeaderMap) -> Result<IdentityContext, AuthError> {
        let key = extract_api_key(headers)?;
        if self.accepted.contains(key) {
            Ok(IdentityContext::from_api_key(key))
        } else {
            Err(AuthError::UnknownApiKey)
        }
    }
}

impl std::fmt::Debug for ApiKeyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyVerifier")
            .field("accepted", &self.accepted.len())
            .finish()
    }
}

fn extract_api_key(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(API_KEY_HEADER)
        .ok_or(AuthError::MissingCredential)?;
    let key = value
        .to_str()
        .map_err(|_| AuthError::MalformedHeader("X-API-Key is not visible ASCII".to_string()))?;
    if key.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(key)
}
