//! Auth-specific error types.
//!
//! [`AuthError`] is the per-request diagnostic carried by a failed verification.
//! It is logged server-side and never rendered to the client; every rejection
//! looks the same from the outside. [`ConfigError`] covers startup failures and
//! is fatal.

use std::path::PathBuf;
use std::time::Duration;

/// Broad cause of a verification failure, used to pick a log level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureCategory {
    /// Missing or malformed credential, detected without any external call.
    Format,
    /// The credential was checked and refused (bad signature, expired, unknown key).
    Verification,
    /// The identity provider could not be reached in time.
    Transport,
}

/// Errors that can occur while verifying a single request.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The header this verifier reads is absent or empty.
    #[error("missing credential")]
    MissingCredential,

    /// The header is present but not in the expected shape.
    #[error("malformed credential header: {0}")]
    MalformedHeader(String),

    /// The presented API key is not in the accepted set.
    #[error("unknown api key")]
    UnknownApiKey,

    /// Token has expired.
    #[error("token has expired")]
    Expired,

    /// Token signature could not be verified.
    #[error("invalid token signature: {0}")]
    InvalidSignature(String),

    /// Token audience doesn't match the configured project.
    #[error("invalid audience")]
    InvalidAudience,

    /// Token issuer doesn't match the configured project.
    #[error("invalid issuer")]
    InvalidIssuer,

    /// A required claim is missing or has an unacceptable value.
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    /// No signing key matches the token's `kid`.
    #[error("no matching key for kid '{0}'")]
    NoMatchingKey(String),

    /// Fetching signing keys from the identity provider failed.
    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(String),

    /// The identity provider did not answer before the deadline.
    #[error("token verification timed out after {0:?}")]
    Timeout(Duration),
}

impl AuthError {
    /// Classify this error.
    pub fn category(&self) -> FailureCategory {
        match self {
            AuthError::MissingCredential | AuthError::MalformedHeader(_) => {
                FailureCategory::Format
            }
            AuthError::UnknownApiKey
            | AuthError::Expired
            | AuthError::InvalidSignature(_)
            | AuthError::InvalidAudience
            | AuthError::InvalidIssuer
            | AuthError::InvalidClaims(_)
            | AuthError::NoMatchingKey(_) => FailureCategory::Verification,
            AuthError::KeyFetch(_) | AuthError::Timeout(_) => FailureCategory::Transport,
        }
    }

    /// Whether this failure points at the identity provider rather than the caller.
    pub fn is_transport(&self) -> bool {
        self.category() == FailureCategory::Transport
    }
}

/// Errors raised while building the verifier chain at startup.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The credential file could not be read.
    #[error("cannot read credentials file {path}: {source}")]
    CredentialsUnreadable {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The credential document is not valid JSON or lacks required fields.
    #[error("invalid credentials: {0}")]
    CredentialsInvalid(String),

    /// No project id could be determined for token verification.
    #[error("no project id found in credentials or environment")]
    MissingProjectId,

    /// API-key auth is enabled but no keys were supplied.
    #[error("api key authentication enabled but no keys configured")]
    NoAcceptedKeys,

    /// The token verification deadline is zero.
    #[error("token verification timeout must be greater than zero")]
    ZeroTokenTimeout,

    /// Token auth is enabled but no validator was supplied.
    #[error("token authentication enabled but no token validator provided")]
    TokenValidatorMissing,

    /// The HTTP client for the identity provider could not be built.
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}
