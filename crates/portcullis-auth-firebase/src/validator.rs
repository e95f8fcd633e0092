//! Firebase ID token validation.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};

use portcullis_auth::{
    AuthError, Claims, ConfigError, CredentialSource, TokenValidator, VerifiedToken,
};

use crate::credentials::ProjectCredentials;
use crate::keys::{Jwk, KeyStore, FIREBASE_JWKS_URL};

/// Issuer prefix; the project id is appended.
const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Firebase rejects subjects longer than this many bytes.
const MAX_SUBJECT_LEN: usize = 128;

/// Clock skew tolerated on time-based claims, in seconds.
const LEEWAY_SECS: u64 = 300;

/// Timeout for signing-key fetches.
const KEY_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Verifies Firebase Auth ID tokens for one project.
pub struct FirebaseTokenValidator {
    project_id: String,
    issuer: String,
    keys: KeyStore,
}

impl FirebaseTokenValidator {
    /// Resolve credentials from `source` and build a validator for that project.
    ///
    /// Fails if the source is unreadable, malformed, or yields no project id.
    pub fn from_source(source: &CredentialSource) -> Result<Self, ConfigError> {
        let credentials = ProjectCredentials::resolve(source)?;
        Self::new(credentials.project_id)
    }

    /// Validator for `project_id` using Google's public signing keys.
    pub fn new(project_id: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_jwks_url(project_id, FIREBASE_JWKS_URL)
    }

    /// Validator that fetches signing keys from a custom JWKS endpoint.
    pub fn with_jwks_url(
        project_id: impl Into<String>,
        jwks_url: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .timeout(KEY_FETCH_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self::build(
            project_id.into(),
            KeyStore::remote(jwks_url.into(), http_client),
        ))
    }

    /// Validator with pre-loaded keys that are never refreshed.
    pub fn with_static_keys(project_id: impl Into<String>, keys: Vec<Jwk>) -> Self {
        Self::build(project_id.into(), KeyStore::fixed(keys))
    }

    fn build(project_id: String, keys: KeyStore) -> Self {
        let issuer = format!("{ISSUER_PREFIX}{project_id}");
        Self {
            project_id,
            issuer,
            keys,
        }
    }

    /// Project whose tokens are accepted.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn validate_token(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::MalformedHeader(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidSignature(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidClaims("missing kid in token header".to_string()))?;

        let key = self.keys.find_key(&kid).await?;
        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)
            .map_err(|e| AuthError::InvalidSignature(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = LEEWAY_SECS;
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

        let claims = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                ErrorKind::MissingRequiredClaim(claim) => {
                    AuthError::InvalidClaims(format!("missing '{claim}' claim"))
                }
                _ => AuthError::InvalidSignature(e.to_string()),
            })?
            .claims;

        let subject = check_subject(&claims)?;
        let now = now_epoch();
        check_not_in_future(&claims, "iat", now)?;
        check_not_in_future(&claims, "auth_time", now)?;

        Ok(VerifiedToken { subject, claims })
    }
}

impl TokenValidator for FirebaseTokenValidator {
    fn validate(
        &self,
        token: &str,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedToken, AuthError>> + Send + '_>> {
        let token = token.to_string();
        Box::pin(async move { self.validate_token(&token).await })
    }
}

fn check_subject(claims: &Claims) -> Result<String, AuthError> {
    let subject = claims
        .get("sub")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| AuthError::InvalidClaims("'sub' must be a string".to_string()))?;

    if subject.is_empty() {
        return Err(AuthError::InvalidClaims("empty 'sub' claim".to_string()));
    }
    if subject.len() > MAX_SUBJECT_LEN {
        return Err(AuthError::InvalidClaims(format!(
            "'sub' longer than {MAX_SUBJECT_LEN} bytes"
        )));
    }
    Ok(subject.to_string())
}

/// An optional timestamp claim must not lie beyond `now` plus the leeway.
fn check_not_in_future(claims: &Claims, name: &str, now: u64) -> Result<(), AuthError> {
    let Some(value) = claims.get(name) else {
        return Ok(());
    };
    let timestamp = value
        .as_u64()
        .ok_or_else(|| AuthError::InvalidClaims(format!("'{name}' must be a timestamp")))?;
    if timestamp > now + LEEWAY_SECS {
        return Err(AuthError::InvalidClaims(format!("'{name}' is in the future")));
    }
    Ok(())
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // 2048-bit RSA key generated for these tests only.
    const TEST_RSA_PRIVATE_PEM: &str = include_str!("../testdata/rsa_test_key.pem");
    const TEST_RSA_N: &str = "4lBucP0l9nzeBtz-lTWLbNGnKXkrpbhLUz4-RVrCjk_-EY6vjFkKftiAooWcgDNWLejCnynSXfq-FG0PGGp11Uv0_e8G0NqH6deDDiCdvN8s-t1bQQHXIyYAaeW8HP_FN60fs1uFY5JLtFtzDDoyYYQ36ggiIYsypfkeOjPEmUUoFdQM36issUhaGeeZplnR5gSs0pbpxqny-PCp8DCjzCQ3dgE3EkWzAKp1fNSkruBC1IsgmDHDw_URVLPCZuyoxFJPgaWW7FFKW_eKpddXF3U6wsblP5V4bcPD_TAIPV8js6ITAbwA0wqUU_1yPiEYuhppYnLtpZQ1Wk_7uCBzPw";
    const TEST_RSA_E: &str = "AQAB";
    const TEST_KID: &str = "test-kid-1";
    const PROJECT: &str = "demo-project";

    fn test_key() -> Jwk {
        Jwk {
            kid: TEST_KID.to_string(),
            n: TEST_RSA_N.to_string(),
            e: TEST_RSA_E.to_string(),
        }
    }

    fn validator() -> FirebaseTokenValidator {
        FirebaseTokenValidator::with_static_keys(PROJECT, vec![test_key()])
    }

    fn valid_claims() -> serde_json::Value {
        let now = now_epoch();
        json!({
            "iss": format!("https://securetoken.google.com/{PROJECT}"),
            "aud": PROJECT,
            "sub": "firebase-uid-1",
            "user_id": "firebase-uid-1",
            "email": "alice@example.com",
            "auth_time": now - 30,
            "iat": now - 30,
            "exp": now + 3600,
            "firebase": {"sign_in_provider": "password"}
        })
    }

    fn sign_with_kid(claims: &serde_json::Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(TEST_RSA_PRIVATE_PEM.as_bytes()).unwrap();
        encode(&header, claims, &key).unwrap()
    }

    fn sign(claims: &serde_json::Value) -> String {
        sign_with_kid(claims, TEST_KID)
    }

    #[tokio::test]
    async fn test_valid_token() {
        let verified = validator()
            .validate_token(&sign(&valid_claims()))
            .await
            .unwrap();
        assert_eq!(verified.subject, "firebase-uid-1");
        assert_eq!(verified.claims["email"], "alice@example.com");
        assert_eq!(verified.claims["firebase"]["sign_in_provider"], "password");
    }

    #[tokio::test]
    async fn test_expired_token() {
        let mut claims = valid_claims();
        claims["exp"] = json!(now_epoch() - 3600);
        let result = validator().validate_token(&sign(&claims)).await;
        assert!(matches!(result, Err(AuthError::Expired)));
    }

    #[tokio::test]
    async fn test_wrong_audience() {
        let mut claims = valid_claims();
        claims["aud"] = json!("other-project");
        let result = validator().validate_token(&sign(&claims)).await;
        assert!(matches!(result, Err(AuthError::InvalidAudience)));
    }

    #[tokio::test]
    async fn test_wrong_issuer() {
        let mut claims = valid_claims();
        claims["iss"] = json!("https://accounts.google.com");
        let result = validator().validate_token(&sign(&claims)).await;
        assert!(matches!(result, Err(AuthError::InvalidIssuer)));
    }

    #[tokio::test]
    async fn test_empty_subject() {
        let mut claims = valid_claims();
        claims["sub"] = json!("");
        let result = validator().validate_token(&sign(&claims)).await;
        assert!(matches!(result, Err(AuthError::InvalidClaims(_))));
    }

    #[tokio::test]
    async fn test_subject_too_long() {
        let mut claims = valid_claims();
        claims["sub"] = json!("x".repeat(MAX_SUBJECT_LEN + 1));
        let result = validator().validate_token(&sign(&claims)).await;
        assert!(matches!(result, Err(AuthError::InvalidClaims(_))));
    }

    #[tokio::test]
    async fn test_auth_time_in_future() {
        let mut claims = valid_claims();
        claims["auth_time"] = json!(now_epoch() + 3600);
        let result = validator().validate_token(&sign(&claims)).await;
        assert!(matches!(result, Err(AuthError::InvalidClaims(_))));
    }

    #[tokio::test]
    async fn test_issued_in_future() {
        let mut claims = valid_claims();
        claims["iat"] = json!(now_epoch() + 86_400);
        let result = validator().validate_token(&sign(&claims)).await;
        assert!(matches!(result, Err(AuthError::InvalidClaims(ref msg)) if msg.contains("iat")));
    }

    #[tokio::test]
    async fn test_subject_length_counts_bytes() {
        let mut claims = valid_claims();
        // 65 characters, 130 bytes.
        claims["sub"] = json!("\u{e9}".repeat(65));
        let result = validator().validate_token(&sign(&claims)).await;
        assert!(matches!(result, Err(AuthError::InvalidClaims(_))));

        claims["sub"] = json!("\u{e9}".repeat(64));
        assert!(validator().validate_token(&sign(&claims)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_kid() {
        let token = sign_with_kid(&valid_claims(), "rotated");
        let result = validator().validate_token(&token).await;
        assert!(matches!(result, Err(AuthError::NoMatchingKey(ref kid)) if kid == "rotated"));
    }

    #[tokio::test]
    async fn test_tampered_signature() {
        let token = sign(&valid_claims());
        let (rest, signature) = token.rsplit_once('.').unwrap();
        let flipped = if signature.starts_with('A') { "B" } else { "A" };
        let tampered = format!("{rest}.{flipped}{}", &signature[1..]);
        let result = validator().validate_token(&tampered).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature(_))));
    }

    #[tokio::test]
    async fn test_not_a_jwt() {
        let result = validator().validate_token("definitely-not-a-jwt").await;
        assert!(matches!(result, Err(AuthError::MalformedHeader(_))));
    }

    #[tokio::test]
    async fn test_keys_fetched_from_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{
                    "kty": "RSA", "alg": "RS256", "use": "sig",
                    "kid": TEST_KID, "n": TEST_RSA_N, "e": TEST_RSA_E
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let validator =
            FirebaseTokenValidator::with_jwks_url(PROJECT, format!("{}/jwk", server.uri()))
                .unwrap();
        let token = sign(&valid_claims());
        let verified = validator.validate(&token).await.unwrap();
        assert_eq!(verified.subject, "firebase-uid-1");
        // Second call is served from cache.
        assert!(validator.validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_forged_kids_fetch_keys_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{
                    "kty": "RSA", "alg": "RS256", "use": "sig",
                    "kid": TEST_KID, "n": TEST_RSA_N, "e": TEST_RSA_E
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let validator =
            FirebaseTokenValidator::with_jwks_url(PROJECT, format!("{}/jwk", server.uri()))
                .unwrap();
        for i in 0..20 {
            let token = sign_with_kid(&valid_claims(), &format!("junk-{i}"));
            let result = validator.validate(&token).await;
            assert!(matches!(result, Err(AuthError::NoMatchingKey(_))));
        }
        // The genuine key is still served from the one fetch.
        assert!(validator.validate(&sign(&valid_claims())).await.is_ok());
    }

    #[test]
    fn test_from_inline_source() {
        let source = CredentialSource::InlineJson(
            r#"{"type":"service_account","project_id":"demo-project","client_email":"a@b"}"#
                .to_string(),
        );
        let validator = FirebaseTokenValidator::from_source(&source).unwrap();
        assert_eq!(validator.project_id(), "demo-project");
    }

    #[test]
    fn test_absent_timestamps_are_ok() {
        assert!(check_not_in_future(&Claims::new(), "iat", 1_000).is_ok());
        assert!(check_not_in_future(&Claims::new(), "auth_time", 1_000).is_ok());
    }

    #[test]
    fn test_timestamp_within_leeway_is_ok() {
        let mut claims = Claims::new();
        claims.insert("iat".to_string(), json!(1_000 + LEEWAY_SECS));
        assert!(check_not_in_future(&claims, "iat", 1_000).is_ok());
        claims.insert("iat".to_string(), json!(1_001 + LEEWAY_SECS));
        assert!(check_not_in_future(&claims, "iat", 1_000).is_err());
    }
}
