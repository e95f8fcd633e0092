//! Portcullis HTTP server.
//!
//! Wires [`ServerConfig`] into an [`AuthOrchestrator`] and mounts it in front
//! of the protected routes. The binary in `main.rs` only adds logging,
//! socket binding and shutdown handling.

mod config;
mod routes;

pub use config::ServerConfig;
pub use routes::{app, WhoAmI};

use std::sync::Arc;

use portcullis_auth::{
    AuthOrchestrator, AuthSettings, ConfigError, TokenValidator, VerifierConfig,
};
use portcullis_auth_firebase::FirebaseTokenValidator;

/// Validate settings and build the orchestrator.
///
/// Token auth resolves Firebase credentials here, so a broken credential
/// source fails startup rather than the first request.
pub fn build_orchestrator(settings: &AuthSettings) -> Result<AuthOrchestrator, ConfigError> {
    let config = VerifierConfig::from_settings(settings)?;

    let validator: Option<Arc<dyn TokenValidator>> = if config.token_enabled() {
        let firebase = FirebaseTokenValidator::from_source(config.credential_source())?;
        tracing::info!(project_id = %firebase.project_id(), "Firebase token verification enabled");
        Some(Arc::new(firebase))
    } else {
        None
    };

    AuthOrchestrator::new(&config, validator)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use portcullis_auth::AuthMethod;

    const INLINE_CREDENTIALS: &str = r#"{
        "type": "service_account",
        "project_id": "demo-project",
        "client_email": "svc@demo-project.iam.gserviceaccount.com"
    }"#;

    #[test]
    fn test_nothing_enabled_is_pass_through() {
        let orchestrator = build_orchestrator(&AuthSettings::default()).unwrap();
        assert!(!orchestrator.is_enforced());
    }

    #[test]
    fn test_api_key_only() {
        let settings = AuthSettings {
            api_key_enabled: true,
            api_keys: "k1,k2".to_string(),
            ..Default::default()
        };
        let orchestrator = build_orchestrator(&settings).unwrap();
        assert_eq!(orchestrator.methods(), vec![AuthMethod::ApiKey]);
    }

    #[test]
    fn test_token_and_api_key_in_priority_order() {
        let settings = AuthSettings {
            token_enabled: true,
            credentials_json: Some(INLINE_CREDENTIALS.to_string()),
            api_key_enabled: true,
            api_keys: "k1".to_string(),
            ..Default::default()
        };
        let orchestrator = build_orchestrator(&settings).unwrap();
        assert_eq!(
            orchestrator.methods(),
            vec![AuthMethod::Token, AuthMethod::ApiKey]
        );
    }

    #[test]
    fn test_broken_credentials_fail_startup() {
        let settings = AuthSettings {
            token_enabled: true,
            credentials_json: Some("{not json".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            build_orchestrator(&settings),
            Err(ConfigError::CredentialsInvalid(_))
        ));
    }

    #[test]
    fn test_api_key_enabled_without_keys_fails_startup() {
        let settings = AuthSettings {
            api_key_enabled: true,
            api_keys: " , ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_orchestrator(&settings),
            Err(ConfigError::NoAcceptedKeys)
        ));
    }
}
