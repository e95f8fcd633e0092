//! Firebase ID token validation for Portcullis.
//!
//! Implements [`portcullis_auth::TokenValidator`] for Firebase Auth:
//! - Credential resolution from a file, inline JSON, or the ambient Google environment
//! - RS256 signature check against Google's securetoken JWKS, cached for an hour
//! - Audience, issuer, expiry, subject and `auth_time` checks
//!
//! ```no_run
//! use std::sync::Arc;
//! use portcullis_auth::{CredentialSource, TokenValidator};
//! use portcullis_auth_firebase::FirebaseTokenValidator;
//!
//! let source = CredentialSource::File("service-account.json".into());
//! let validator: Arc<dyn TokenValidator> =
//!     Arc::new(FirebaseTokenValidator::from_source(&source)?);
//! # Ok::<(), portcullis_auth::ConfigError>(())
//! ```

mod credentials;
mod keys;
mod validator;

pub use credentials::ProjectCredentials;
pub use keys::{Jwk, FIREBASE_JWKS_URL};
pub use validator::FirebaseTokenValidator;
