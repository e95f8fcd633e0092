//! Signing-key cache for Firebase ID tokens.
//!
//! Keys are refetched when the cached set expires (per the endpoint's
//! `Cache-Control: max-age`, else after an hour). An unknown `kid` on a fresh
//! set also triggers a refetch, at most once per [`MIN_REFRESH_INTERVAL`], so
//! forged key ids cannot turn inbound requests into outbound ones. Concurrent
//! refreshes are collapsed into one fetch.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, CACHE_CONTROL};
use serde::Deserialize;
use tokio::sync::Mutex;

use portcullis_auth::AuthError;

/// Lifetime of a fetched key set when the response carries no `max-age`.
const DEFAULT_KEY_TTL: Duration = Duration::from_secs(3600);

/// Minimum spacing between fetches that were not caused by expiry.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Public JWKS for tokens minted by Firebase Auth.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// A single RSA JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key ID, matched against the JWT header's `kid`.
    pub kid: String,
    /// RSA modulus (base64url).
    pub n: String,
    /// RSA exponent (base64url).
    pub e: String,
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

struct KeySet {
    keys: Vec<Jwk>,
    /// `None` for fixed keys.
    expires_at: Option<Instant>,
}

impl KeySet {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

enum Lookup {
    Found(Jwk),
    /// The set is fresh but has no such key.
    Unknown,
    /// Nothing cached yet, or the set has expired.
    Stale,
}

/// Outcome of the most recent fetch attempt.
struct LastFetch {
    at: Instant,
    error: Option<String>,
}

struct Remote {
    url: String,
    client: reqwest::Client,
    min_refresh_interval: Duration,
    /// Held for the duration of a fetch; waiters re-check the cache afterwards.
    last_fetch: Mutex<Option<LastFetch>>,
}

/// Fetches and caches signing keys.
pub(crate) struct KeyStore {
    cached: RwLock<Option<KeySet>>,
    remote: Option<Remote>,
}

impl KeyStore {
    pub(crate) fn remote(url: String, client: reqwest::Client) -> Self {
        Self {
            cached: RwLock::new(None),
            remote: Some(Remote {
                url,
                client,
                min_refresh_interval: MIN_REFRESH_INTERVAL,
                last_fetch: Mutex::new(None),
            }),
        }
    }

    /// Fixed keys that never expire and are never refetched.
    pub(crate) fn fixed(keys: Vec<Jwk>) -> Self {
        Self {
            cached: RwLock::new(Some(KeySet {
                keys,
                expires_at: None,
            })),
            remote: None,
        }
    }

    #[cfg(test)]
    fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        if let Some(remote) = self.remote.as_mut() {
            remote.min_refresh_interval = interval;
        }
        self
    }

    pub(crate) async fn find_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        let no_match = || AuthError::NoMatchingKey(kid.to_string());

        let Some(remote) = &self.remote else {
            return match self.lookup(kid) {
                Lookup::Found(key) => Ok(key),
                Lookup::Unknown | Lookup::Stale => Err(no_match()),
            };
        };

        if let Lookup::Found(key) = self.lookup(kid) {
            return Ok(key);
        }

        let mut last_fetch = remote.last_fetch.lock().await;

        // Another request may have refreshed while this one waited.
        let lookup = self.lookup(kid);
        let recent = last_fetch
            .as_ref()
            .filter(|fetch| fetch.at.elapsed() < remote.min_refresh_interval);
        match (lookup, recent) {
            (Lookup::Found(key), _) => return Ok(key),
            (Lookup::Unknown, Some(_)) => return Err(no_match()),
            (Lookup::Stale, Some(LastFetch { error: Some(err), .. })) => {
                return Err(AuthError::KeyFetch(err.clone()));
            }
            _ => {}
        }

        let result = self.fetch(remote).await;
        *last_fetch = Some(LastFetch {
            at: Instant::now(),
            error: result.as_ref().err().map(ToString::to_string),
        });
        drop(last_fetch);
        result?;

        match self.lookup(kid) {
            Lookup::Found(key) => Ok(key),
            Lookup::Unknown | Lookup::Stale => Err(no_match()),
        }
    }

    fn lookup(&self, kid: &str) -> Lookup {
        let Ok(cache) = self.cached.read() else {
            return Lookup::Stale;
        };
        match cache.as_ref() {
            None => Lookup::Stale,
            Some(set) if set.is_expired(Instant::now()) => Lookup::Stale,
            Some(set) => match set.keys.iter().find(|k| k.kid == kid) {
                Some(key) => Lookup::Found(key.clone()),
                None => Lookup::Unknown,
            },
        }
    }

    async fn fetch(&self, remote: &Remote) -> Result<(), AuthError> {
        log::debug!("Fetching signing keys from {}", remote.url);

        let response = remote
            .client
            .get(&remote.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;
        let ttl = max_age(response.headers()).unwrap_or(DEFAULT_KEY_TTL);
        let body: JwksResponse = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        log::debug!(
            "Fetched {} signing keys, valid for {}s",
            body.keys.len(),
            ttl.as_secs()
        );

        let mut cache = self
            .cached
            .write()
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;
        *cache = Some(KeySet {
            keys: body.keys,
            expires_at: Some(Instant::now() + ttl),
        });
        Ok(())
    }
}

/// `max-age` from a `Cache-Control` header, if present and well-formed.
fn max_age(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|directive| {
            let (name, secs) = directive.trim().split_once('=')?;
            if !name.trim().eq_ignore_ascii_case("max-age") {
                return None;
            }
            secs.trim().parse().ok().map(Duration::from_secs)
        })
}
