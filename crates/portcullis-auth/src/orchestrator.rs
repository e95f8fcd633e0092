//! The verifier chain.
//!
//! [`AuthOrchestrator`] runs the enabled verifiers in priority order (token,
//! then API key) and stops at the first success. Failures are logged with
//! their cause and folded into a single [`AuthDecision::Rejected`].

use std::sync::Arc;

use http::HeaderMap;

use crate::config::VerifierConfig;
use crate::error::{ConfigError, FailureCategory};
use crate::identity::{AuthMethod, IdentityContext};
use crate::verifier::{ApiKeyVerifier, TokenVerifier, Verifier};
use crate::TokenValidator;

/// How the orchestrator treats requests.
#[derive(Clone, Debug)]
pub enum AuthMode {
    /// No strategy is enabled: every request is let through without identity.
    PassThrough,
    /// Requests must satisfy one of these verifiers, tried in order.
    Enforced(Vec<Verifier>),
}

/// Outcome of authenticating one request.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthDecision {
    /// Let the request through. `None` only in pass-through mode.
    Authenticated(Option<IdentityContext>),
    /// Every enabled verifier failed.
    Rejected,
}

/// Composes the enabled verifiers into one authentication decision.
#[derive(Clone, Debug)]
pub struct AuthOrchestrator {
    mode: AuthMode,
}

impl AuthOrchestrator {
    /// Build the verifier chain from configuration.
    ///
    /// `token_validator` is required when token auth is enabled and ignored
    /// otherwise.
    pub fn new(
        config: &VerifierConfig,
        token_validator: Option<Arc<dyn TokenValidator>>,
    ) -> Result<Self, ConfigError> {
        let mut verifiers = Vec::with_capacity(2);

        if config.token_enabled() {
            let validator = token_validator.ok_or(ConfigError::TokenValidatorMissing)?;
            verifiers.push(Verifier::Token(TokenVerifier::new(
                validator,
                config.token_timeout(),
            )));
        }

        if config.api_key_enabled() {
            if config.accepted_keys().is_empty() {
                return Err(ConfigError::NoAcceptedKeys);
            }
            verifiers.push(Verifier::ApiKey(ApiKeyVerifier::new(
                config.accepted_keys().clone(),
            )));
        }

        if verifiers.is_empty() {
            return Ok(Self::pass_through());
        }
        Ok(Self::with_verifiers(verifiers))
    }

    /// An orchestrator that authenticates every request without identity.
    pub fn pass_through() -> Self {
        Self {
            mode: AuthMode::PassThrough,
        }
    }

    /// An orchestrator over an explicit verifier chain.
    ///
    /// An empty chain rejects every request; use [`pass_through`](Self::pass_through)
    /// to disable authentication.
    pub fn with_verifiers(verifiers: Vec<Verifier>) -> Self {
        Self {
            mode: AuthMode::Enforced(verifiers),
        }
    }

    /// Current mode.
    pub fn mode(&self) -> &AuthMode {
        &self.mode
    }

    /// Whether requests are checked at all.
    pub fn is_enforced(&self) -> bool {
        matches!(self.mode, AuthMode::Enforced(_))
    }

    /// Enabled methods in the order they are tried.
    pub fn methods(&self) -> Vec<AuthMethod> {
        match &self.mode {
            AuthMode::PassThrough => Vec::new(),
            AuthMode::Enforced(verifiers) => verifiers.iter().map(Verifier::method).collect(),
        }
    }

    /// Authenticate one request from its headers.
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthDecision {
        let verifiers = match &self.mode {
            AuthMode::PassThrough => return AuthDecision::Authenticated(None),
            AuthMode::Enforced(verifiers) => verifiers,
        };

        for verifier in verifiers {
            match verifier.attempt(headers).await {
                Ok(identity) => {
                    log::debug!("Request authenticated via {}", identity.method());
                    return AuthDecision::Authenticated(Some(identity));
                }
                Err(err) => match err.category() {
                    FailureCategory::Transport => {
                        log::warn!("{} verification unavailable: {err}", verifier.method());
                    }
                    FailureCategory::Format | FailureCategory::Verification => {
                        log::debug!("{} verification failed: {err}", verifier.method());
                    }
                },
            }
        }

        AuthDecision::Rejected
    }
}
