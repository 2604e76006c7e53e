use std::fmt::Debug;
use std::time::Duration;

use lru_time_cache::LruCache;
use url::Url;

use crate::helpers::convert_json_to;
use crate::http::request_async;
use crate::jwks::Jwks;
use crate::types::{HttpRequest, OidcError, OidcHttpClient, OidcReturn};

/// Cache of an issuer's remote JWK Set. Refetches happen on an explicit
/// reload or when an unknown `kid` shows up, the latter at most once a minute
/// per `kid`.
pub(crate) struct KeyStore {
    jwks: Option<Jwks>,
    jwks_uri: Option<String>,
    refresh_guard: LruCache<String, bool>,
}

impl KeyStore {
    pub(crate) fn new(jwks_uri: Option<String>) -> Self {
        Self {
            jwks: None,
            jwks_uri,
            refresh_guard: LruCache::with_expiry_duration(Duration::from_secs(60)),
        }
    }

    /// Whether a refetch triggered by this `kid` is allowed right now
    pub(crate) fn allow_kid_refresh(&mut self, kid: &str) -> bool {
        if self.refresh_guard.contains_key(kid) {
            return false;
        }

        self.refresh_guard.insert(kid.to_string(), true);
        true
    }

    pub(crate) async fn get_keystore_async<T>(
        &mut self,
        reload: bool,
        http_client: &T,
    ) -> OidcReturn<Jwks>
    where
        T: OidcHttpClient,
    {
        if !reload {
            if let Some(jwks) = &self.jwks {
                return Ok(jwks.clone());
            }
        }

        let uri = self.jwks_uri.as_ref().ok_or(OidcError::new_rp_error(
            "jwks_uri must be configured on the issuer",
            None,
        ))?;

        let url = Url::parse(uri)
            .map_err(|_| OidcError::new_rp_error("jwks_uri is an invalid url", None))?;

        let req = HttpRequest::new(url)
            .header("accept", "application/json")
            .header("accept", "application/jwk-set+json");

        let res = request_async(req, http_client).await?;

        let body = match &res.body {
            Some(b) => b,
            None => {
                return Err(OidcError::new_op_error(
                    "server_error".to_string(),
                    Some("jwks response was empty".to_string()),
                    None,
                    Some(res),
                ))
            }
        };

        match convert_json_to::<Jwks>(body) {
            Ok(jwks) => {
                self.jwks = Some(jwks.clone());
                Ok(jwks)
            }
            Err(_) => Err(OidcError::new_op_error(
                "invalid_jwks".to_string(),
                Some("jwks did not parse as a JWK Set".to_string()),
                None,
                Some(res),
            )),
        }
    }
}

impl Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("jwks", &self.jwks)
            .field("jwks_uri", &self.jwks_uri)
            .finish()
    }
}

impl Clone for KeyStore {
    fn clone(&self) -> Self {
        let mut cloned = Self::new(self.jwks_uri.clone());
        cloned.jwks = self.jwks.clone();
        cloned
    }
}
