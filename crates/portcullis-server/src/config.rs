//! Process configuration.
//!
//! Every option is a flag with an environment-variable fallback, so the same
//! binary runs from a shell, a `.env` file or a container manifest.

use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use portcullis_auth::AuthSettings;

/// Portcullis HTTP server.
#[derive(Parser, Clone)]
#[command(name = "portcullis", version, about, long_about = None)]
pub struct ServerConfig {
    /// Port to listen on (all interfaces).
    #[arg(long, env = "SERVER_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Enable Firebase ID-token verification.
    #[arg(
        long,
        env = "AUTH_FIREBASE_ENABLED",
        default_value = "false",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set
    )]
    pub firebase_enabled: bool,

    /// Path to a Firebase service-account JSON file.
    #[arg(long, env = "FIREBASE_CREDENTIALS_FILE")]
    pub firebase_credentials_file: Option<String>,

    /// Inline Firebase service-account JSON.
    #[arg(long, env = "FIREBASE_CREDENTIALS_JSON", hide_env_values = true)]
    pub firebase_credentials_json: Option<String>,

    /// Enable `X-API-Key` verification.
    #[arg(
        long,
        env = "AUTH_API_KEY_ENABLED",
        default_value = "false",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set
    )]
    pub api_key_enabled: bool,

    /// Comma-separated list of accepted API keys.
    #[arg(long, env = "AUTH_API_KEYS", default_value = "", hide_env_values = true)]
    pub api_keys: String,

    /// Deadline in seconds for one token verification.
    #[arg(
        long,
        env = "AUTH_TOKEN_TIMEOUT_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub token_timeout_secs: u64,
}

impl ServerConfig {
    /// Raw authentication settings for [`portcullis_auth::VerifierConfig`].
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            token_enabled: self.firebase_enabled,
            credentials_file: self.firebase_credentials_file.clone(),
            credentials_json: self.firebase_credentials_json.clone(),
            api_key_enabled: self.api_key_enabled,
            api_keys: self.api_keys.clone(),
            token_timeout: Some(Duration::from_secs(self.token_timeout_secs)),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("firebase_enabled", &self.firebase_enabled)
            .field("firebase_credentials_file", &self.firebase_credentials_file)
            .field(
                "firebase_credentials_json",
                &self.firebase_credentials_json.as_ref().map(|_| "<redacted>"),
            )
            .field("api_key_enabled", &self.api_key_enabled)
            .field("api_keys", &"<redacted>")
            .field("token_timeout_secs", &self.token_timeout_secs)
            .finish()
    }
}
