//! Credential resolution.
//!
//! Verifying Firebase ID tokens only needs the project id (signing keys are
//! public), but the credential source still has to be valid: a broken file or
//! inline document stops startup instead of silently disabling token auth.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use portcullis_auth::{ConfigError, CredentialSource};

const ADC_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const PROJECT_ENV_VARS: [&str; 2] = ["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];
const GCLOUD_CONFIG_ENV: &str = "CLOUDSDK_CONFIG";
const ADC_FILE_NAME: &str = "application_default_credentials.json";

/// Fields of a Google credentials document that matter here.
#[derive(Debug, Deserialize)]
struct CredentialsDocument {
    #[serde(rename = "type")]
    kind: String,
    project_id: Option<String>,
    quota_project_id: Option<String>,
    client_email: Option<String>,
}

/// Resolved project settings for token verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectCredentials {
    /// Firebase project id; the expected token audience.
    pub project_id: String,
}

impl ProjectCredentials {
    /// Resolve credentials from the process environment.
    pub fn resolve(source: &CredentialSource) -> Result<Self, ConfigError> {
        resolve_with(source, |key| std::env::var(key).ok(), well_known_adc_file())
    }
}

/// Resolve credentials with an explicit environment lookup and gcloud file location.
pub(crate) fn resolve_with<F>(
    source: &CredentialSource,
    env: F,
    well_known: Option<PathBuf>,
) -> Result<ProjectCredentials, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let document = match source {
        CredentialSource::File(path) => Some(read_document(path)?),
        CredentialSource::InlineJson(json) => Some(parse_document(json)?),
        CredentialSource::AmbientDefault => ambient_document(&env, well_known)?,
    };

    let project_id = document
        .and_then(|doc| doc.project_id.or(doc.quota_project_id))
        .filter(|id| !id.is_empty())
        .or_else(|| {
            PROJECT_ENV_VARS
                .into_iter()
                .filter_map(|key| env(key))
                .find(|id| !id.is_empty())
        })
        .ok_or(ConfigError::MissingProjectId)?;

    Ok(ProjectCredentials { project_id })
}

fn ambient_document<F>(
    env: &F,
    well_known: Option<PathBuf>,
) -> Result<Option<CredentialsDocument>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = env(ADC_ENV).filter(|p| !p.is_empty()) {
        log::debug!("Using credentials from {ADC_ENV}");
        return read_document(Path::new(&path)).map(Some);
    }

    match well_known {
        Some(path) if path.is_file() => {
            log::debug!("Using gcloud application default credentials");
            read_document(&path).map(Some)
        }
        _ => Ok(None),
    }
}

fn read_document(path: &Path) -> Result<CredentialsDocument, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| {
        ConfigError::CredentialsUnreadable {
            path: path.to_path_buf(),
            source,
        }
    })?;
    parse_document(&raw)
}

fn parse_document(raw: &str) -> Result<CredentialsDocument, ConfigError> {
    let doc: CredentialsDocument =
        serde_json::from_str(raw).map_err(|e| ConfigError::CredentialsInvalid(e.to_string()))?;

    if doc.kind == "service_account" && doc.client_email.as_deref().unwrap_or("").is_empty() {
        return Err(ConfigError::CredentialsInvalid(
            "service account credentials missing client_email".to_string(),
        ));
    }

    Ok(doc)
}

fn well_known_adc_file() -> Option<PathBuf> {
    let dir = match std::env::var_os(GCLOUD_CONFIG_ENV) {
        Some(dir) => PathBuf::from(dir),
        None if cfg!(windows) => dirs::config_dir()?.join("gcloud"),
        None => dirs::home_dir()?.join(".config").join("gcloud"),
    };
    Some(dir.join(ADC_FILE_NAME))
}
