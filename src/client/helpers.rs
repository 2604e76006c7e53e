//! Crypto and JOSE internals of the client: symmetric key derivation, client
//! authentication enrichment, JWE decryption and the JWT / ID Token
//! validator.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use base64::{engine::general_purpose, Engine};
use josekit::{
    jwk::Jwk,
    jws::{self, JwsHeader},
    jwt::{decode_with_verifier, JwtPayload},
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use sha2::{Digest, Sha256, Sha384, Sha512};
use url::Url;

use crate::helpers::{decode_jwt, generate_random, validate_hash};
use crate::http::request_async;
use crate::jwks::CustomJwk;
use crate::tokenset::TokenSet;
use crate::types::{
    AuthorizationParameters, HttpMethod, HttpRequest, HttpResponse, OidcError, OidcHttpClient,
    OidcReturn, QueryKeyStore,
};

use super::Client;

lazy_static! {
    static ref KEYWRAP_REGEX: Regex = Regex::new(r"^A(\d{3})(?:GCM)?KW$").unwrap();
    static ref CONTENT_ENC_REGEX: Regex = Regex::new(r"^A(\d{3})(?:GCM|CBC-HS(\d{3}))$").unwrap();
    static ref HS_REGEX: Regex = Regex::new("^HS(?:256|384|512)").unwrap();
    static ref ASYMMETRIC_ALG_REGEX: Regex = Regex::new("^(?:RSA|ECDH)").unwrap();
}

/// The body fields and headers client authentication adds to a request
#[derive(Debug, Default)]
pub(crate) struct AuthEnrichment {
    pub form: HashMap<String, String>,
    pub headers: Vec<(String, String)>,
}

/// Options of an authenticated POST to the token endpoint family
#[derive(Debug, Default)]
pub(crate) struct AuthPost<'a> {
    /// Authenticate with this endpoint's method instead of the target's
    pub endpoint_auth_method: Option<&'a str>,
    pub client_assertion_payload: Option<&'a HashMap<String, Value>>,
    pub expect_body: bool,
    pub expect_json_body: bool,
    /// Accept any 2xx status (revocation, RFC 7009)
    pub any_success: bool,
}

pub(crate) fn jwt_extra(jwt: &str) -> Option<HashMap<String, Value>> {
    let mut extra = HashMap::new();
    extra.insert("jwt".to_string(), json!(jwt));
    Some(extra)
}

fn kty_for_alg(alg: &str) -> Option<String> {
    match alg.get(0..2) {
        Some("RS") | Some("PS") => Some("RSA".to_string()),
        Some("ES") => Some("EC".to_string()),
        Some("Ed") => Some("OKP".to_string()),
        _ => None,
    }
}

impl Client {
    /// Secret derived key material for `len` bits: the SHA-2 digest of
    /// `client_secret` truncated to `len / 8` bytes.
    pub(crate) fn encryption_secret(&self, len: u16) -> OidcReturn<Vec<u8>> {
        let secret = self.client_secret.as_ref().ok_or(OidcError::new_rp_error(
            "client_secret is required",
            None,
        ))?;

        match len {
            l if l <= 256 => Ok(Sha256::digest(secret.as_bytes())[..(len / 8) as usize].to_vec()),
            l if l <= 384 => Ok(Sha384::digest(secret.as_bytes())[..(len / 8) as usize].to_vec()),
            l if l <= 512 => Ok(Sha512::digest(secret.as_bytes())[..(len / 8) as usize].to_vec()),
            _ => Err(OidcError::new_rp_error(
                "unsupported symmetric encryption key derivation",
                None,
            )),
        }
    }

    /// The symmetric JWK used with `alg`. Key wrap and content encryption
    /// algorithms get a key derived from `client_secret`, everything else the
    /// raw secret bytes. Results are memoized per algorithm; derivation is
    /// deterministic so concurrent computation of the same entry is harmless.
    pub(crate) fn secret_for_alg(&self, alg: &str) -> OidcReturn<Jwk> {
        if let Ok(cache) = self.derived_keys.lock() {
            if let Some(jwk) = cache.get(alg) {
                return Ok(jwk.clone());
            }
        }

        let secret = self.client_secret.as_ref().ok_or(OidcError::new_rp_error(
            "client_secret is required",
            None,
        ))?;

        let mut jwk = Jwk::new("oct");
        jwk.set_algorithm(alg);

        if let Some(captures) = KEYWRAP_REGEX.captures_iter(alg).next() {
            if let Some(bits) = captures.get(1) {
                let len = bits.as_str().parse::<u16>().unwrap_or_default();
                jwk.set_key_use("enc");
                jwk.set_key_value(self.encryption_secret(len)?);

                return Ok(self.memoize_key(alg, jwk));
            }
        }

        if let Some(captures) = CONTENT_ENC_REGEX.captures_iter(alg).next() {
            if let Some(bits) = captures.get(2).or(captures.get(1)) {
                let len = bits.as_str().parse::<u16>().unwrap_or_default();
                jwk.set_key_use("enc");
                jwk.set_key_value(self.encryption_secret(len)?);
                jwk.set_algorithm("dir");

                return Ok(self.memoize_key(alg, jwk));
            }
        }

        jwk.set_key_value(secret);

        Ok(self.memoize_key(alg, jwk))
    }

    fn memoize_key(&self, alg: &str, jwk: Jwk) -> Jwk {
        if let Ok(mut cache) = self.derived_keys.lock() {
            cache.entry(alg.to_string()).or_insert_with(|| jwk.clone());
        }
        jwk
    }

    /// Caller parameters merged over the client's defaults
    pub(crate) fn authorization_params(
        &self,
        params: AuthorizationParameters,
    ) -> AuthorizationParameters {
        let mut merged = AuthorizationParameters {
            client_id: Some(self.client_id.clone()),
            scope: Some(vec!["openid".to_string()]),
            response_type: self.resolve_response_type().map(|rt| vec![rt]),
            redirect_uri: self.resolve_redirect_uri(),
            ..Default::default()
        };

        if params.client_id.is_some() {
            merged.client_id = params.client_id;
        }
        if params.scope.is_some() {
            merged.scope = params.scope;
        }
        if params.response_type.is_some() {
            merged.response_type = params.response_type;
        }
        if params.redirect_uri.is_some() {
            merged.redirect_uri = params.redirect_uri;
        }

        merged.acr_values = params.acr_values;
        merged.audience = params.audience;
        merged.claims = params.claims;
        merged.claims_locales = params.claims_locales;
        merged.code_challenge_method = params.code_challenge_method;
        merged.code_challenge = params.code_challenge;
        merged.display = params.display;
        merged.id_token_hint = params.id_token_hint;
        merged.login_hint = params.login_hint;
        merged.max_age = params.max_age;
        merged.nonce = params.nonce;
        merged.prompt = params.prompt;
        merged.registration = params.registration;
        merged.request_uri = params.request_uri;
        merged.request = params.request;
        merged.resource = params.resource;
        merged.response_mode = params.response_mode;
        merged.state = params.state;
        merged.ui_locales = params.ui_locales;
        merged.other = params.other;

        merged
    }

    fn resolve_response_type(&self) -> Option<String> {
        if self.response_types.len() == 1 {
            return Some(self.response_types[0].clone());
        }
        None
    }

    fn resolve_redirect_uri(&self) -> Option<String> {
        match &self.redirect_uris {
            Some(uris) if uris.len() == 1 => Some(uris[0].clone()),
            _ => None,
        }
    }

    pub(crate) fn get_auth_endpoint(&self) -> OidcReturn<Url> {
        let issuer = self
            .issuer
            .as_ref()
            .ok_or(OidcError::new_rp_error("issuer is required", None))?;

        let endpoint = issuer
            .authorization_endpoint
            .as_ref()
            .ok_or(OidcError::new_rp_error(
                "authorization_endpoint must be configured on the issuer",
                None,
            ))?;

        Url::parse(endpoint).map_err(|_| {
            OidcError::new_rp_error("authorization_endpoint is an invalid url", None)
        })
    }

    fn endpoint_auth_method(&self, endpoint: &str) -> OidcReturn<&str> {
        match endpoint {
            "token" => Ok(self.token_endpoint_auth_method.as_str()),
            "introspection" => self
                .introspection_endpoint_auth_method
                .as_deref()
                .ok_or(OidcError::new_rp_error(
                    "missing, or unsupported, introspection_endpoint_auth_method",
                    None,
                )),
            "revocation" => self
                .revocation_endpoint_auth_method
                .as_deref()
                .ok_or(OidcError::new_rp_error(
                    "missing, or unsupported, revocation_endpoint_auth_method",
                    None,
                )),
            _ => Err(OidcError::new_rp_error(
                &format!("missing, or unsupported, {}_endpoint_auth_method", endpoint),
                None,
            )),
        }
    }

    /// The request enrichment implied by the endpoint's configured client
    /// authentication method
    pub(crate) fn auth_for(
        &self,
        endpoint: &str,
        client_assertion_payload: Option<&HashMap<String, Value>>,
    ) -> OidcReturn<AuthEnrichment> {
        let auth_method = self.endpoint_auth_method(endpoint)?;

        let mut enrichment = AuthEnrichment::default();

        match auth_method {
            "none" | "tls_client_auth" | "self_signed_tls_client_auth" => {
                enrichment
                    .form
                    .insert("client_id".to_string(), self.client_id.clone());
            }
            "client_secret_post" => {
                let secret = self.client_secret.as_ref().ok_or(OidcError::new_rp_error(
                    "client_secret_post client authentication method requires a client_secret",
                    None,
                ))?;

                enrichment
                    .form
                    .insert("client_id".to_string(), self.client_id.clone());
                enrichment
                    .form
                    .insert("client_secret".to_string(), secret.clone());
            }
            "client_secret_basic" => {
                let secret = self.client_secret.as_ref().ok_or(OidcError::new_rp_error(
                    "client_secret_basic client authentication method requires a client_secret",
                    None,
                ))?;

                // RFC 6749 section 2.3.1, credentials are form-url-encoded
                // before entering the Basic header
                let credentials = format!(
                    "{}:{}",
                    urlencoding::encode(&self.client_id),
                    urlencoding::encode(secret)
                )
                .replace("%20", "+");

                enrichment.headers.push((
                    "authorization".to_string(),
                    format!("Basic {}", general_purpose::STANDARD.encode(credentials)),
                ));
            }
            "client_secret_jwt" | "private_key_jwt" => {
                let mut payload = JwtPayload::new();

                let iat = (self.now)();
                let exp = iat + 60;

                if let Some(t) =
                    SystemTime::UNIX_EPOCH.checked_add(Duration::from_secs(iat as u64))
                {
                    payload.set_issued_at(&t);
                }

                if let Some(t) =
                    SystemTime::UNIX_EPOCH.checked_add(Duration::from_secs(exp as u64))
                {
                    payload.set_expires_at(&t);
                }

                payload.set_jwt_id(generate_random(None));
                payload.set_issuer(&self.client_id);
                payload.set_subject(&self.client_id);

                if let Some(issuer) = &self.issuer {
                    let mut audience = vec![issuer.issuer.clone()];

                    if let Some(token_endpoint) = &issuer.token_endpoint {
                        audience.push(token_endpoint.clone());
                    }

                    payload.set_audience(audience);
                }

                if let Some(overlay) = client_assertion_payload {
                    for (k, v) in overlay {
                        payload
                            .set_claim(k, Some(v.clone()))
                            .map_err(|_| OidcError::new_rp_error("invalid claim value", None))?;
                    }
                }

                let assertion = self.client_assertion(endpoint, payload)?;

                enrichment
                    .form
                    .insert("client_id".to_string(), self.client_id.clone());
                enrichment
                    .form
                    .insert("client_assertion".to_string(), assertion);
                enrichment.form.insert(
                    "client_assertion_type".to_string(),
                    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer".to_string(),
                );
            }
            other => {
                return Err(OidcError::new_rp_error(
                    &format!("missing, or unsupported, {}_endpoint_auth_method {}", endpoint, other),
                    None,
                ))
            }
        }

        Ok(enrichment)
    }

    /// Signs the client authentication assertion under the endpoint's
    /// configured (or the issuer supported) signing algorithm
    fn client_assertion(&self, endpoint: &str, payload: JwtPayload) -> OidcReturn<String> {
        let (mut alg, auth_method) = match endpoint {
            "token" => (
                self.token_endpoint_auth_signing_alg.as_deref(),
                Some(self.token_endpoint_auth_method.as_str()),
            ),
            "introspection" => (
                self.introspection_endpoint_auth_signing_alg.as_deref(),
                self.introspection_endpoint_auth_method.as_deref(),
            ),
            "revocation" => (
                self.revocation_endpoint_auth_signing_alg.as_deref(),
                self.revocation_endpoint_auth_method.as_deref(),
            ),
            _ => {
                return Err(OidcError::new_rp_error(
                    &format!("missing, or unsupported, {}_endpoint_auth_method", endpoint),
                    None,
                ))
            }
        };

        let mut supported_algs: &[String] = &[];

        if alg.is_none() {
            let issuer = self.issuer.as_ref().ok_or(OidcError::new_rp_error(
                "issuer is required when the client has no endpoint auth signing alg configured",
                None,
            ))?;

            let values = match endpoint {
                "token" => issuer
                    .token_endpoint_auth_signing_alg_values_supported
                    .as_ref(),
                "introspection" => issuer
                    .introspection_endpoint_auth_signing_alg_values_supported
                    .as_ref(),
                "revocation" => issuer
                    .revocation_endpoint_auth_signing_alg_values_supported
                    .as_ref(),
                _ => None,
            };

            supported_algs = values.map(|v| v.as_slice()).ok_or(OidcError::new_rp_error(
                &format!(
                    "{}_endpoint_auth_signing_alg_values_supported must be configured on the issuer",
                    endpoint
                ),
                None,
            ))?;
        }

        if auth_method == Some("client_secret_jwt") {
            if alg.is_none() {
                alg = supported_algs
                    .iter()
                    .find(|a| HS_REGEX.is_match(a))
                    .map(|a| a.as_str());
            }

            let algorithm = alg.ok_or(OidcError::new_rp_error(
                &format!(
                    "failed to determine a JWS Algorithm to use for {}_endpoint_auth_method Client Assertion",
                    endpoint
                ),
                None,
            ))?;

            let mut header = JwsHeader::new();
            header.set_algorithm(algorithm);

            let signer = self.secret_for_alg(algorithm)?.to_signer()?;

            let payload_bytes = serde_json::to_vec(payload.claims_set())
                .map_err(|_| OidcError::new_rp_error("could not serialize the assertion", None))?;

            return jws::serialize_compact(&payload_bytes, &header, &*signer)
                .map_err(|_| OidcError::new_rp_error("error while creating jwt", None));
        }

        let jwks = self.private_jwks.as_ref().ok_or(OidcError::new_rp_error(
            "no client jwks provided for signing a client assertion with",
            None,
        ))?;

        if alg.is_none() {
            alg = supported_algs
                .iter()
                .find(|candidate| {
                    !jwks
                        .get(Some(candidate.as_str()), Some("sig"), None, None)
                        .is_empty()
                })
                .map(|a| a.as_str());
        }

        let algorithm = alg.ok_or(OidcError::new_rp_error(
            &format!(
                "failed to determine a JWS Algorithm to use for {}_endpoint_auth_method Client Assertion",
                endpoint
            ),
            None,
        ))?;

        let keys = jwks.get(Some(algorithm), Some("sig"), None, None);
        let key = keys.first().ok_or(OidcError::new_rp_error(
            &format!(
                "no key found in client jwks to sign a client assertion with using alg {}",
                algorithm
            ),
            None,
        ))?;

        let mut header = JwsHeader::new();
        header.set_algorithm(algorithm);

        if let Some(kid) = key.key_id() {
            header.set_key_id(kid);
        }

        let mut signing_key = (*key).clone();
        if signing_key.algorithm().is_none() {
            signing_key.set_algorithm(algorithm);
        }

        let signer = signing_key.to_signer()?;

        let payload_bytes = serde_json::to_vec(payload.claims_set())
            .map_err(|_| OidcError::new_rp_error("could not serialize the assertion", None))?;

        jws::serialize_compact(&payload_bytes, &header, &*signer)
            .map_err(|_| OidcError::new_rp_error("error while creating jwt", None))
    }

    /// Performs an authenticated POST to one of the token endpoint family
    /// endpoints, routing through the mTLS aliases when required.
    pub(crate) async fn authenticated_post_async<T>(
        &mut self,
        endpoint: &str,
        mut form: HashMap<String, String>,
        params: AuthPost<'_>,
        http_client: &T,
    ) -> OidcReturn<HttpResponse>
    where
        T: OidcHttpClient,
    {
        let auth_endpoint = params.endpoint_auth_method.unwrap_or(endpoint);

        let enrichment = self.auth_for(auth_endpoint, params.client_assertion_payload)?;

        form.extend(enrichment.form);

        let auth_method = self.endpoint_auth_method(auth_endpoint)?;

        let mtls = auth_method.contains("tls_client_auth")
            || (endpoint == "token"
                && self
                    .tls_client_certificate_bound_access_tokens
                    .is_some_and(|v| v));

        let issuer = self.issuer.as_ref().ok_or(OidcError::new_rp_error(
            "issuer is required for an authenticated post",
            None,
        ))?;

        let mut target_url: Option<&String> = None;

        if mtls {
            let aliases = issuer.mtls_endpoint_aliases.as_ref();

            target_url = match endpoint {
                "token" => aliases.and_then(|a| a.token_endpoint.as_ref()),
                "introspection" => aliases.and_then(|a| a.introspection_endpoint.as_ref()),
                "revocation" => aliases.and_then(|a| a.revocation_endpoint.as_ref()),
                "device_authorization" => {
                    aliases.and_then(|a| a.device_authorization_endpoint.as_ref())
                }
                _ => None,
            };
        }

        if target_url.is_none() {
            target_url = match endpoint {
                "token" => issuer.token_endpoint.as_ref(),
                "introspection" => issuer.introspection_endpoint.as_ref(),
                "revocation" => issuer.revocation_endpoint.as_ref(),
                "device_authorization" => issuer.device_authorization_endpoint.as_ref(),
                _ => None,
            };
        }

        let url = target_url.ok_or(OidcError::new_rp_error(
            &format!("{}_endpoint must be configured on the issuer", endpoint),
            None,
        ))?;

        let url = Url::parse(url)
            .map_err(|_| OidcError::new_rp_error("endpoint is an invalid url", None))?;

        let mut req = HttpRequest::new(url)
            .method(HttpMethod::POST)
            .mtls(mtls)
            .expect_body(params.expect_body)
            .expect_json_body(params.expect_json_body);

        if params.any_success {
            req = req.expect_any_success();
        }

        if endpoint != "revocation" {
            req = req.header("accept", "application/json");
        }

        for (name, value) in enrichment.headers {
            req = req.header(name, value);
        }

        request_async(req.form(form), http_client).await
    }

    /// Strips the JWE layer off a token when the client is configured for
    /// encrypted responses. The outer header must announce exactly the
    /// configured `alg` and `enc`.
    pub(crate) fn decrypt_jwe(
        &self,
        jwe: &str,
        expected_alg: &str,
        expected_enc: Option<&str>,
    ) -> OidcReturn<String> {
        let expected_enc = expected_enc.unwrap_or("A128CBC-HS256");

        let header_segment = jwe
            .split('.')
            .next()
            .ok_or(OidcError::new_rp_error("invalid JWE", None))?;

        let header_bytes = base64_url::decode(header_segment)
            .map_err(|_| OidcError::new_rp_error("jwt decode error", None))?;

        let header = serde_json::from_slice::<HashMap<String, Value>>(&header_bytes)
            .map_err(|_| OidcError::new_rp_error("jwt header deserialization error", None))?;

        let header_alg = header.get("alg").and_then(|v| v.as_str()).unwrap_or_default();

        if header_alg != expected_alg {
            let mut extra = HashMap::new();
            extra.insert("jwe".to_string(), json!(jwe));

            return Err(OidcError::new_rp_error_extra(
                &format!(
                    "unexpected JWE alg received, expected {}, got: {}",
                    expected_alg, header_alg
                ),
                None,
                Some(extra),
            ));
        }

        let header_enc = header.get("enc").and_then(|v| v.as_str()).unwrap_or_default();

        if header_enc != expected_enc {
            let mut extra = HashMap::new();
            extra.insert("jwe".to_string(), json!(jwe));

            return Err(OidcError::new_rp_error_extra(
                &format!(
                    "unexpected JWE enc received, expected {}, got: {}",
                    expected_enc, header_enc
                ),
                None,
                Some(extra),
            ));
        }

        let mut plain_text: Option<String> = None;

        if ASYMMETRIC_ALG_REGEX.is_match(expected_alg) {
            let jwks = self.private_jwks.as_ref().ok_or(OidcError::new_rp_error(
                "client jwks is required to decrypt this response",
                None,
            ))?;

            let kid = header.get("kid").and_then(|v| v.as_str());

            for key in jwks.get(Some(expected_alg), Some("enc"), kid, None) {
                let mut decryption_key = key.clone();
                if decryption_key.algorithm().is_none() {
                    decryption_key.set_algorithm(expected_alg);
                }

                let decrypter = decryption_key.to_jwe_decrypter()?;
                if let Ok((bytes, _)) = josekit::jwe::deserialize_compact(jwe, &*decrypter) {
                    plain_text = String::from_utf8(bytes).ok();
                    break;
                }
            }
        } else {
            let alg = if expected_alg == "dir" {
                expected_enc
            } else {
                expected_alg
            };

            let jwk = self.secret_for_alg(alg)?;

            let decrypter = jwk.to_jwe_decrypter()?;
            if let Ok((bytes, _)) = josekit::jwe::deserialize_compact(jwe, &*decrypter) {
                plain_text = String::from_utf8(bytes).ok();
            }
        }

        plain_text.ok_or_else(|| {
            OidcError::new_rp_error_extra("failed to decrypt JWE", None, jwt_extra(jwe))
        })
    }

    /// Replaces an encrypted `id_token` in the set with its decrypted inner
    /// JWS. A no-op for clients without encrypted ID Token response
    /// configuration.
    pub(crate) fn decrypt_id_token(&self, token_set: TokenSet) -> OidcReturn<TokenSet> {
        let expected_alg = match &self.id_token_encrypted_response_alg {
            Some(alg) => alg,
            None => return Ok(token_set),
        };

        let id_token = token_set.get_id_token().ok_or(OidcError::new_rp_error(
            "id_token not present in TokenSet",
            None,
        ))?;

        let expected_enc = self.id_token_encrypted_response_enc.as_deref();

        let decrypted = self.decrypt_jwe(&id_token, expected_alg, expected_enc)?;

        let mut new_token_set = token_set;
        new_token_set.set_id_token(Some(decrypted));

        Ok(new_token_set)
    }

    pub(crate) fn decrypt_jwt_userinfo(&self, body: String) -> OidcReturn<String> {
        match &self.userinfo_encrypted_response_alg {
            Some(expected_alg) => self.decrypt_jwe(
                &body,
                expected_alg,
                self.userinfo_encrypted_response_enc.as_deref(),
            ),
            None => Ok(body),
        }
    }

    /// Validates a JWT issued by the configured issuer: structure, `alg`
    /// against `expected_alg`, required claim presence, `iss` (with AAD
    /// multitenant substitution), time claims against the client clock
    /// tolerance, `aud`/`azp`, and finally the signature. All signature
    /// failures collapse into one message.
    pub(crate) async fn validate_jwt_async<T>(
        &mut self,
        jwt: &str,
        expected_alg: &str,
        required: Option<&[&str]>,
        http_client: &T,
    ) -> OidcReturn<(JwtPayload, JwsHeader, Option<Jwk>)>
    where
        T: OidcHttpClient,
    {
        let required_claims = required.unwrap_or(&["iss", "sub", "aud", "exp", "iat"]);

        let timestamp = (self.now)();
        let tolerance = self.clock_tolerance.as_secs() as i64;

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
            .ok_or(OidcError::new_rp_error("algorithm not found in jwt", None))?
            .to_string();

        if header_alg != expected_alg {
            return Err(OidcError::new_rp_error_extra(
                &format!(
                    "unexpected JWT alg received, expected {}, got: {}",
                    expected_alg, header_alg
                ),
                None,
                jwt_extra(jwt),
            ));
        }

        for claim in required_claims {
            if decoded.payload.claim(claim).is_none() {
                return Err(OidcError::new_rp_error_extra(
                    &format!("missing required JWT property {}", claim),
                    None,
                    jwt_extra(jwt),
                ));
            }
        }

        if let Some(iss) = decoded.payload.issuer() {
            let mut expected_iss = self
                .issuer
                .as_ref()
                .map(|i| i.issuer.clone())
                .unwrap_or_default();

            // AAD style multitenant issuer templates resolve against the
            // token's tid claim
            if expected_iss.contains("{tenantid}") {
                if let Some(Value::String(tid)) = decoded.payload.claim("tid") {
                    expected_iss = expected_iss.replace("{tenantid}", tid);
                }
            }

            if iss != expected_iss {
                return Err(OidcError::new_rp_error_extra(
                    &format!("unexpected iss value, expected {}, got: {}", expected_iss, iss),
                    None,
                    jwt_extra(jwt),
                ));
            }
        }

        if decoded.payload.claim("iat").is_some() {
            let iat = decoded.payload.claim("iat").and_then(|v| v.as_i64());

            let iat = match iat {
                Some(v) => v,
                None => {
                    return Err(OidcError::new_rp_error_extra(
                        "JWT iat claim must be a JSON numeric value",
                        None,
                        jwt_extra(jwt),
                    ))
                }
            };

            if iat > timestamp.wrapping_add(tolerance) {
                return Err(OidcError::new_rp_error_extra(
                    &format!("JWT issued in the future, now {}, iat {}", timestamp, iat),
                    None,
                    jwt_extra(jwt),
                ));
            }
        }

        if let Some(nbf) = decoded.payload.claim("nbf") {
            let nbf = match nbf.as_i64() {
                Some(v) => v,
                None => {
                    return Err(OidcError::new_rp_error_extra(
                        "JWT nbf claim must be a JSON numeric value",
                        None,
                        jwt_extra(jwt),
                    ))
                }
            };

            if nbf > timestamp.wrapping_add(tolerance) {
                return Err(OidcError::new_rp_error_extra(
                    &format!(
                        "JWT not active yet, now {}, nbf {}",
                        timestamp.wrapping_add(tolerance),
                        nbf
                    ),
                    None,
                    jwt_extra(jwt),
                ));
            }
        }

        if let Some(exp) = decoded.payload.claim("exp") {
            let exp = match exp.as_i64() {
                Some(v) => v,
                None => {
                    return Err(OidcError::new_rp_error_extra(
                        "JWT exp claim must be a JSON numeric value",
                        None,
                        jwt_extra(jwt),
                    ))
                }
            };

            if timestamp.wrapping_sub(tolerance) >= exp {
                return Err(OidcError::new_rp_error_extra(
                    &format!(
                        "JWT expired, now {}, exp {}",
                        timestamp.wrapping_sub(tolerance),
                        exp
                    ),
                    None,
                    jwt_extra(jwt),
                ));
            }
        }

        let payload_azp = decoded.payload.claim("azp").cloned();

        if let Some(aud) = decoded.payload.audience() {
            if aud.len() > 1 && payload_azp.is_none() {
                return Err(OidcError::new_rp_error_extra(
                    "missing required JWT property azp",
                    None,
                    jwt_extra(jwt),
                ));
            }

            if aud.len() > 1 && !aud.contains(&self.client_id.as_str()) {
                return Err(OidcError::new_rp_error_extra(
                    &format!(
                        "aud is missing the client_id, expected {} to be included in {:?}",
                        self.client_id, aud
                    ),
                    None,
                    jwt_extra(jwt),
                ));
            } else if aud.len() == 1 && !aud.contains(&self.client_id.as_str()) {
                return Err(OidcError::new_rp_error_extra(
                    &format!("aud mismatch, expected {}, got: {}", self.client_id, aud[0]),
                    None,
                    jwt_extra(jwt),
                ));
            }
        }

        if let Some(Value::String(azp)) = &payload_azp {
            let mut authorized_parties = self
                .client_options
                .as_ref()
                .and_then(|o| o.additional_authorized_parties.clone())
                .unwrap_or_default();

            authorized_parties.push(self.client_id.clone());

            if !authorized_parties.contains(azp) {
                return Err(OidcError::new_rp_error_extra(
                    &format!("azp mismatch, got: {}", azp),
                    None,
                    jwt_extra(jwt),
                ));
            }
        }

        let mut keys = vec![];

        if header_alg.starts_with("HS") {
            keys.push(self.secret_for_alg(&header_alg)?);
        } else if header_alg != "none" {
            let issuer = self.issuer.as_mut().ok_or(OidcError::new_rp_error(
                "issuer is not configured for this client",
                None,
            ))?;

            let kid = decoded
                .header
                .key_id()
                .filter(|kid| !kid.is_empty())
                .map(|kid| kid.to_string());

            let query = QueryKeyStore {
                key_id: kid,
                key_type: kty_for_alg(&header_alg),
                alg: Some(header_alg.clone()),
                key_use: Some("sig".to_string()),
            };

            keys = issuer.query_keystore_async(query, false, http_client).await?;
        }

        if keys.is_empty() && header_alg == "none" {
            return Ok((decoded.payload, decoded.header, None));
        }

        for key in keys {
            let mut verification_key = key.clone();
            if verification_key.algorithm().is_none() {
                verification_key.set_algorithm(&header_alg);
            }

            if let Ok(verifier) = verification_key.to_verifier() {
                if let Ok((payload, header)) = decode_with_verifier(jwt, &*verifier) {
                    return Ok((payload, header, Some(key)));
                }
            }
        }

        Err(OidcError::new_rp_error_extra(
            "failed to validate JWT signature",
            None,
            jwt_extra(jwt),
        ))
    }

    /// The ID Token validator. `returned_by` is the context the token came
    /// from (`authorization`, `token` or `userinfo`); it decides which claims
    /// and hashes are mandatory. `check_nonce` is false in flows where no
    /// nonce applies (refresh, device).
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn validate_id_token_async<T>(
        &mut self,
        token_set: TokenSet,
        nonce: Option<&str>,
        check_nonce: bool,
        returned_by: &str,
        max_age: Option<u64>,
        state: Option<&str>,
        http_client: &T,
    ) -> OidcReturn<TokenSet>
    where
        T: OidcHttpClient,
    {
        let id_token = token_set.get_id_token().ok_or(OidcError::new_rp_error(
            "id_token not present in TokenSet",
            None,
        ))?;

        let expected_alg = self.id_token_signed_response_alg.clone();

        let timestamp = (self.now)();
        let tolerance = self.clock_tolerance.as_secs() as i64;

        let (payload, header, key) = self
            .validate_jwt_async(&id_token, &expected_alg, None, http_client)
            .await?;

        if max_age.is_some() || self.require_auth_time.is_some_and(|v| v) {
            match payload.claim("auth_time") {
                Some(Value::Number(_)) => {}
                Some(_) => {
                    return Err(OidcError::new_rp_error_extra(
                        "JWT auth_time claim must be a JSON numeric value",
                        None,
                        jwt_extra(&id_token),
                    ));
                }
                None => {
                    return Err(OidcError::new_rp_error_extra(
                        "missing required JWT property auth_time",
                        None,
                        jwt_extra(&id_token),
                    ));
                }
            }
        }

        if let (Some(max_age), Some(Value::Number(auth_time))) =
            (max_age, payload.claim("auth_time"))
        {
            let auth_time = auth_time.as_u64().unwrap_or_default();

            if auth_time.wrapping_add(max_age) < timestamp.wrapping_sub(tolerance) as u64 {
                let mut extra = jwt_extra(&id_token).unwrap_or_default();
                extra.insert("now".to_string(), json!(timestamp));
                extra.insert("auth_time".to_string(), json!(auth_time));
                extra.insert("tolerance".to_string(), json!(tolerance));

                return Err(OidcError::new_rp_error_extra(
                    &format!(
                        "too much time has elapsed since the last End-User authentication, max_age {}, auth_time: {}, now {}",
                        max_age, auth_time, timestamp
                    ),
                    None,
                    Some(extra),
                ));
            }
        }

        if check_nonce {
            let payload_nonce = match payload.claim("nonce") {
                Some(Value::String(n)) => Some(n.as_str()),
                _ => None,
            };

            if (payload_nonce.is_some() || nonce.is_some()) && payload_nonce != nonce {
                return Err(OidcError::new_rp_error_extra(
                    &format!(
                        "nonce mismatch, expected {}, got: {}",
                        nonce.unwrap_or_default(),
                        payload_nonce.unwrap_or_default()
                    ),
                    None,
                    jwt_extra(&id_token),
                ));
            }
        }

        let header_alg = header
            .claim("alg")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let curve = key.as_ref().and_then(|k| k.curve());

        let other_fields = token_set.get_other().unwrap_or_default();
        let code = other_fields.get("code").and_then(|v| v.as_str());

        if returned_by == "authorization" {
            if payload.claim("at_hash").is_none() && token_set.get_access_token().is_some() {
                return Err(OidcError::new_rp_error_extra(
                    "missing required property at_hash",
                    None,
                    jwt_extra(&id_token),
                ));
            }

            if payload.claim("c_hash").is_none() && code.is_some() {
                return Err(OidcError::new_rp_error_extra(
                    "missing required property c_hash",
                    None,
                    jwt_extra(&id_token),
                ));
            }

            if let Some(Value::String(s_hash)) = payload.claim("s_hash") {
                let state = state.ok_or(OidcError::new_rp_error(
                    "cannot verify s_hash, \"checks.state\" property not provided",
                    None,
                ))?;

                validate_hash("s_hash", s_hash, &header_alg, state, curve).map_err(|err| {
                    OidcError::new_rp_error_extra(
                        &err.rp_error().message,
                        None,
                        jwt_extra(&id_token),
                    )
                })?;
            }
        }

        if let Some(access_token) = token_set.get_access_token() {
            if let Some(Value::String(at_hash)) = payload.claim("at_hash") {
                validate_hash("at_hash", at_hash, &header_alg, &access_token, curve).map_err(
                    |err| {
                        OidcError::new_rp_error_extra(
                            &err.rp_error().message,
                            None,
                            jwt_extra(&id_token),
                        )
                    },
                )?;
            }
        }

        if let Some(code) = code {
            if let Some(Value::String(c_hash)) = payload.claim("c_hash") {
                validate_hash("c_hash", c_hash, &header_alg, code, curve).map_err(|err| {
                    OidcError::new_rp_error_extra(
                        &err.rp_error().message,
                        None,
                        jwt_extra(&id_token),
                    )
                })?;
            }
        }

        Ok(token_set)
    }

    /// Validates a signed userinfo response. No claims are required to be
    /// present, the signature and issuer checks still apply.
    pub(crate) async fn validate_jwt_userinfo_async<T>(
        &mut self,
        body: &str,
        http_client: &T,
    ) -> OidcReturn<(JwtPayload, JwsHeader, Option<Jwk>)>
    where
        T: OidcHttpClient,
    {
        let expected_alg = self
            .userinfo_signed_response_alg
            .as_ref()
            .ok_or(OidcError::new_rp_error(
                "userinfo_signed_response_alg should be present",
                None,
            ))?
            .clone();

        self.validate_jwt_async(body, &expected_alg, Some(&[]), http_client)
            .await
    }
}
