//! Verifier configuration.
//!
//! [`AuthSettings`] is the raw, loosely-typed input (flags and secrets as they
//! arrive from the environment). [`VerifierConfig`] is the validated form the
//! orchestrator is built from. Both are built once at startup.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default deadline for a single token verification.
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw authentication settings, before validation.
#[derive(Clone, Default)]
pub struct AuthSettings {
    /// Enable bearer-token verification.
    pub token_enabled: bool,
    /// Path to a service-account JSON file.
    pub credentials_file: Option<String>,
    /// Inline service-account JSON.
    pub credentials_json: Option<String>,
    /// Enable `X-API-Key` verification.
    pub api_key_enabled: bool,
    /// Comma-separated accepted keys.
    pub api_keys: String,
    /// Deadline for one token verification; `None` uses [`DEFAULT_TOKEN_TIMEOUT`].
    pub token_timeout: Option<Duration>,
}

/// Where the token verifier's credentials come from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// A service-account JSON file on disk.
    File(PathBuf),
    /// Service-account JSON passed inline.
    InlineJson(String),
    /// Whatever the runtime environment provides.
    AmbientDefault,
}

impl CredentialSource {
    /// Pick a source: file path first, then inline JSON, then ambient default.
    /// Blank values count as unset.
    pub fn select(file: Option<&str>, inline_json: Option<&str>) -> Self {
        let non_blank = |s: &&str| !s.trim().is_empty();
        if let Some(path) = file.filter(non_blank) {
            return CredentialSource::File(PathBuf::from(path.trim()));
        }
        if let Some(json) = inline_json.filter(non_blank) {
            return CredentialSource::InlineJson(json.to_string());
        }
        CredentialSource::AmbientDefault
    }
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::File(path) => f.debug_tuple("File").field(path).finish(),
            CredentialSource::InlineJson(_) => f.write_str("InlineJson(<redacted>)"),
            CredentialSource::AmbientDefault => f.write_str("AmbientDefault"),
        }
    }
}

/// Validated, immutable verifier configuration.
#[derive(Clone)]
pub struct VerifierConfig {
    token_enabled: bool,
    credential_source: CredentialSource,
    api_key_enabled: bool,
    accepted_keys: HashSet<String>,
    token_timeout: Duration,
}

impl VerifierConfig {
    /// Validate raw settings.
    ///
    /// Fails if API-key auth is enabled without any keys, or if the token
    /// timeout is zero. Credential
    /// reachability is checked when the token validator is built from
    /// [`credential_source`](Self::credential_source).
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, ConfigError> {
        let accepted_keys = parse_key_list(&settings.api_keys);
        if settings.api_key_enabled && accepted_keys.is_empty() {
            return Err(ConfigError::NoAcceptedKeys);
        }

        let token_timeout = settings.token_timeout.unwrap_or(DEFAULT_TOKEN_TIMEOUT);
        if token_timeout.is_zero() {
            return Err(ConfigError::ZeroTokenTimeout);
        }

        Ok(Self {
            token_enabled: settings.token_enabled,
            credential_source: CredentialSource::select(
                settings.credentials_file.as_deref(),
                settings.credentials_json.as_deref(),
            ),
            api_key_enabled: settings.api_key_enabled,
            accepted_keys,
            token_timeout,
        })
    }

    /// A configuration with every strategy disabled.
    pub fn disabled() -> Self {
        Self {
            token_enabled: false,
            credential_source: CredentialSource::AmbientDefault,
            api_key_enabled: false,
            accepted_keys: HashSet::new(),
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
        }
    }

    /// Whether bearer-token verification is enabled.
    pub fn token_enabled(&self) -> bool {
        self.token_enabled
    }

    /// Whether API-key verification is enabled.
    pub fn api_key_enabled(&self) -> bool {
        self.api_key_enabled
    }

    /// Whether any strategy is enabled. When false, requests pass through.
    pub fn any_enabled(&self) -> bool {
        self.token_enabled || self.api_key_enabled
    }

    /// Credential source for the token validator.
    pub fn credential_source(&self) -> &CredentialSource {
        &self.credential_source
    }

    /// Accepted API keys.
    pub fn accepted_keys(&self) -> &HashSet<String> {
        &self.accepted_keys
    }

    /// Deadline for a single token verification.
    pub fn token_timeout(&self) -> Duration {
        self.token_timeout
    }
}

impl std::fmt::Debug for VerifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierConfig")
            .field("token_enabled", &self.token_enabled)
            .field("credential_source", &self.credential_source)
            .field("api_key_enabled", &self.api_key_enabled)
            .field("accepted_keys", &self.accepted_keys.len())
            .field("token_timeout", &self.token_timeout)
            .finish()
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn parse_key_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
