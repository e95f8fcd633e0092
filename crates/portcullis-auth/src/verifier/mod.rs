//! Verification strategies.
//!
//! Each strategy reads one header and either resolves an [`IdentityContext`]
//! or reports why it could not. None of them rejects the request; that is
//! the orchestrator's call.

mod api_key;
mod token;

pub use api_key::{ApiKeyVerifier, API_KEY_HEADER};
pub use token::{extract_bearer_token, TokenVerifier};

use http::HeaderMap;

use crate::error::AuthError;
use crate::identity::{AuthMethod, IdentityContext};

/// Result of one verification attempt.
pub type VerificationOutcome = Result<IdentityContext, AuthError>;

/// One enabled strategy in the verifier chain.
#[derive(Clone, Debug)]
pub enum Verifier {
    /// Bearer token checked by the identity provider.
    Token(TokenVerifier),
    /// Shared secret checked against the accepted set.
    ApiKey(ApiKeyVerifier),
}

impl Verifier {
    /// Method this strategy authenticates with.
    pub fn method(&self) -> AuthMethod {
        match self {
            Verifier::Token(_) => AuthMethod::Token,
            Verifier::ApiKey(_) => AuthMethod::ApiKey,
        }
    }

    /// Try to authenticate the request from its headers.
    pub async fn attempt(&self, headers: &HeaderMap) -> VerificationOutcome {
        match self {
            Verifier::Token(verifier) => verifier.verify(headers).await,
            Verifier::ApiKey(verifier) => verifier.verify(headers),
        }
    }
}
