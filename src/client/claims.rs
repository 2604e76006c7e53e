//! Distributed and aggregated claim resolution, OpenID Connect Core 1.0
//! section 5.6.2.
//!
//! Claim sources live in `_claim_sources`; `_claim_names` maps each claim to
//! the source that provides it. Distributed sources are fetched from their
//! endpoint as `application/jwt`, aggregated sources carry the JWT inline.
//! Either way the JWT is verified against the keys of the issuer named in its
//! `iss` claim, resolved through this client's issuer, the process wide
//! issuer registry, or discovery.

use std::collections::HashMap;

use futures::future::join_all;
use serde_json::{Map, Value};
use url::Url;

use crate::helpers::decode_jwt;
use crate::http::request_async;
use crate::issuer::Issuer;
use crate::jwks::CustomJwk;
use crate::types::{
    HttpRequest, HttpResponse, OidcError, OidcHttpClient, OidcReturn, QueryKeyStore,
};

use super::helpers::jwt_extra;
use super::Client;

impl Client {
    /// # Fetch Distributed Claims
    /// Resolves every `_claim_sources` entry carrying an `endpoint`. The
    /// fetches fan out concurrently; the returned JWTs are verified and their
    /// claims merged into `claims` in place. Emptied `_claim_names` and
    /// `_claim_sources` maps are removed.
    ///
    /// `access_tokens` supplies bearer tokens per source name, overriding a
    /// source's own `access_token` member.
    ///
    /// On failure the error names the offending source; sources already
    /// merged stay merged.
    pub async fn fetch_distributed_claims_async<T>(
        &mut self,
        http_client: &T,
        claims: &mut Map<String, Value>,
        access_tokens: Option<HashMap<String, String>>,
    ) -> OidcReturn<()>
    where
        T: OidcHttpClient,
    {
        let access_tokens = access_tokens.unwrap_or_default();

        let sources: Vec<(String, String, Option<String>)> = match claims.get("_claim_sources") {
            Some(Value::Object(sources)) => sources
                .iter()
                .filter_map(|(name, source)| {
                    let endpoint = source.get("endpoint")?.as_str()?.to_string();

                    let token = access_tokens
                        .get(name)
                        .cloned()
                        .or_else(|| {
                            source
                                .get("access_token")
                                .and_then(|t| t.as_str())
                                .map(|t| t.to_string())
                        });

                    Some((name.clone(), endpoint, token))
                })
                .collect(),
            _ => vec![],
        };

        if sources.is_empty() {
            return Ok(());
        }

        let fetches = sources.iter().map(|(name, endpoint, token)| async move {
            let outcome = fetch_claim_source(http_client, endpoint, token.as_deref()).await;
            (name.clone(), outcome)
        });

        let responses = join_all(fetches).await;

        for (name, outcome) in responses {
            let jwt = outcome.map_err(|err| err.annotate_source(&name))?;

            let payload = self
                .claim_jwt_verify(&jwt, http_client)
                .await
                .map_err(|err| err.annotate_source(&name))?;

            merge_source_claims(claims, &name, &payload);
        }

        Ok(())
    }

    /// # Unpack Aggregated Claims
    /// Verifies every `_claim_sources` entry carrying an inline `JWT` and
    /// merges its claims into `claims` in place, with the same issuer
    /// resolution, cleanup and error annotation as
    /// [`Client::fetch_distributed_claims_async()`].
    pub async fn unpack_aggregated_claims_async<T>(
        &mut self,
        http_client: &T,
        claims: &mut Map<String, Value>,
    ) -> OidcReturn<()>
    where
        T: OidcHttpClient,
    {
        let sources: Vec<(String, String)> = match claims.get("_claim_sources") {
            Some(Value::Object(sources)) => sources
                .iter()
                .filter_map(|(name, source)| {
                    let jwt = source.get("JWT")?.as_str()?.to_string();
                    Some((name.clone(), jwt))
                })
                .collect(),
            _ => vec![],
        };

        for (name, jwt) in sources {
            let payload = self
                .claim_jwt_verify(&jwt, http_client)
                .await
                .map_err(|err| err.annotate_source(&name))?;

            merge_source_claims(claims, &name, &payload);
        }

        Ok(())
    }

    /// Verifies a claim source JWT. The signing keys come from the issuer the
    /// token names in `iss`: this client's issuer when it matches, a
    /// previously seen issuer from the registry, or a freshly discovered one
    /// (which is then cached).
    async fn claim_jwt_verify<T>(
        &mut self,
        jwt: &str,
        http_client: &T,
    ) -> OidcReturn<Map<String, Value>>
    where
        T: OidcHttpClient,
    {
        let decoded = decode_jwt(jwt).map_err(|err| {
            OidcError::new_rp_error_extra(
                &format!("failed to decode JWT ({})", err),
                None,
                jwt_extra(jwt),
            )
        })?;

        let header_alg = decoded
            .header
            .algorithm()
            .ok_or(OidcError::new_rp_error_extra(
                "claim source is missing JWT alg",
                None,
                jwt_extra(jwt),
            ))?
            .to_string();

        let payload = decoded.payload.claims_set().clone();

        if header_alg == "none" {
            return Ok(payload);
        }

        if header_alg.starts_with("HS") {
            let key = self.secret_for_alg(&header_alg)?;
            let verifier = key.to_verifier()?;

            return match josekit::jwt::decode_with_verifier(jwt, &*verifier) {
                Ok((payload, _)) => Ok(payload.claims_set().clone()),
                Err(_) => Err(OidcError::new_rp_error_extra(
                    "failed to validate JWT signature",
                    None,
                    jwt_extra(jwt),
                )),
            };
        }

        let iss = decoded.payload.issuer().map(|i| i.to_string());

        let own_issuer = self.issuer.as_ref().map(|i| i.issuer.clone());

        let same_issuer = match (&iss, &own_issuer) {
            (Some(iss), Some(own)) => iss == own,
            (None, _) => true,
            _ => false,
        };

        let kid = decoded
            .header
            .key_id()
            .filter(|kid| !kid.is_empty())
            .map(|kid| kid.to_string());

        let query = QueryKeyStore {
            key_id: kid,
            key_type: None,
            alg: Some(header_alg.clone()),
            key_use: Some("sig".to_string()),
        };

        let keys = if same_issuer {
            let issuer = self.issuer.as_mut().ok_or(OidcError::new_rp_error(
                "issuer is not configured for this client",
                None,
            ))?;

            issuer.query_keystore_async(query, false, http_client).await?
        } else {
            let iss = iss.unwrap_or_default();

            let mut issuer = match Issuer::from_registry(&iss) {
                Some(issuer) => issuer,
                None => Issuer::discover_async(&iss, http_client).await?,
            };

            let keys = issuer.query_keystore_async(query, false, http_client).await?;

            // the keystore cache may have been filled, keep the registry warm
            Issuer::store_in_registry(&issuer);

            keys
        };

        for key in keys {
            let mut verification_key = key.clone();
            if verification_key.algorithm().is_none() {
                verification_key.set_algorithm(&header_alg);
            }

            if let Ok(verifier) = verification_key.to_verifier() {
                if let Ok((payload, _)) = josekit::jwt::decode_with_verifier(jwt, &*verifier) {
                    return Ok(payload.claims_set().clone());
                }
            }
        }

        Err(OidcError::new_rp_error_extra(
            "failed to validate JWT signature",
            None,
            jwt_extra(jwt),
        ))
    }
}

async fn fetch_claim_source<T>(
    http_client: &T,
    endpoint: &str,
    access_token: Option<&str>,
) -> OidcReturn<String>
where
    T: OidcHttpClient,
{
    let url = Url::parse(endpoint)
        .map_err(|_| OidcError::new_rp_error("claim source endpoint is an invalid url", None))?;

    let mut req = HttpRequest::new(url)
        .header("accept", "application/jwt")
        .expect_json_body(false)
        .expect_bearer(access_token.is_some());

    if let Some(token) = access_token {
        req = req.header("authorization", format!("Bearer {}", token));
    }

    let res = request_async(req, http_client).await?;

    assert_jwt_content_type(&res)?;

    res.body
        .clone()
        .ok_or(OidcError::new_rp_error("body was empty", Some(res)))
}

fn assert_jwt_content_type(res: &HttpResponse) -> OidcReturn<()> {
    let jwt_content_type = res
        .content_type
        .as_ref()
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|ct| ct == "application/jwt");

    if !jwt_content_type {
        return Err(OidcError::new_rp_error(
            "expected application/jwt response from the claim source",
            Some(res.clone()),
        ));
    }

    Ok(())
}

/// Moves the claims provided by `source` to the top level and drops the
/// bookkeeping entries, removing `_claim_names` / `_claim_sources`
/// altogether once they are empty.
fn merge_source_claims(claims: &mut Map<String, Value>, source: &str, payload: &Map<String, Value>) {
    let assigned: Vec<String> = match claims.get("_claim_names") {
        Some(Value::Object(names)) => names
            .iter()
            .filter_map(|(claim, src)| {
                if src.as_str() == Some(source) {
                    Some(claim.clone())
                } else {
                    None
                }
            })
            .collect(),
        _ => vec![],
    };

    for claim in &assigned {
        if let Some(value) = payload.get(claim) {
            claims.insert(claim.clone(), value.clone());
        }
    }

    if let Some(Value::Object(names)) = claims.get_mut("_claim_names") {
        for claim in &assigned {
            names.remove(claim);
        }
    }

    if let Some(Value::Object(sources)) = claims.get_mut("_claim_sources") {
        sources.remove(source);
    }

    if claims
        .get("_claim_names")
        .is_some_and(|n| n.as_object().is_some_and(|n| n.is_empty()))
    {
        claims.remove("_claim_names");
    }

    if claims
        .get("_claim_sources")
        .is_some_and(|s| s.as_object().is_some_and(|s| s.is_empty()))
    {
        claims.remove("_claim_sources");
    }
}
