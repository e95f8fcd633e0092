//! Multi-strategy request authentication for Portcullis.
//!
//! Provides:
//! - [`VerifierConfig`] — which strategies are enabled, built once at startup
//! - [`Verifier`] — the closed set of strategies (bearer token, API key)
//! - [`TokenValidator`] — trait for identity providers behind the token strategy
//! - [`AuthOrchestrator`] — tries enabled verifiers in priority order
//! - [`AuthLayer`] / [`AuthService`] — Tower middleware around the orchestrator
//! - [`IdentityContext`] and its accessors — what downstream handlers see
//! - [`AuthError`] / [`ConfigError`] — per-request and startup errors
//!
//! Tokens are tried before API keys. The first verifier that succeeds decides
//! the request; if none does, the caller receives one fixed 401 response no
//! matter why each verifier failed. With no strategy enabled every request
//! passes through without an identity.

mod config;
mod error;
mod identity;
mod middleware;
mod orchestrator;
mod proptests;
mod verifier;

pub use config::{
    parse_key_list, AuthSettings, CredentialSource, VerifierConfig, DEFAULT_TOKEN_TIMEOUT,
};
pub use error::{AuthError, ConfigError, FailureCategory};
pub use identity::{
    claims_from_parts, identity_from_extensions, identity_from_parts, method_from_parts,
    subject_from_parts, AuthMethod, Claims, Identity, IdentityContext,
};
pub use middleware::{
    unauthorized_response, AuthLayer, AuthService, UNAUTHORIZED_CODE, UNAUTHORIZED_ERROR,
};
pub use orchestrator::{AuthDecision, AuthMode, AuthOrchestrator};
pub use verifier::{
    extract_bearer_token, ApiKeyVerifier, TokenVerifier, VerificationOutcome, Verifier,
    API_KEY_HEADER,
};

use std::future::Future;
use std::pin::Pin;

/// A token the identity provider has accepted.
#[derive(Clone, Debug)]
pub struct VerifiedToken {
    /// Stable subject identifier (e.g. the provider's user id).
    pub subject: String,
    /// All claims carried by the token.
    pub claims: Claims,
}

/// Trait for identity providers that verify bearer tokens.
///
/// Implementations check signature, expiry and issuer, and may perform
/// network I/O. The returned future may be dropped at any point if the
/// request is cancelled or times out.
pub trait TokenValidator: Send + Sync + 'static {
    /// Verify a raw token string.
    fn validate(
        &self,
        token: &str,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedToken, AuthError>> + Send + '_>>;
}
