//! Small shared utilities: clock, randomness, JWT decoding, OIDC hash claims
//! and form-url-encoding.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256, Sha384, Sha512};
use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Shake256,
};
use url::{form_urlencoded, Url};

use crate::types::{DecodedToken, HttpResponse, OidcError, OidcReturn, OpErrorBody};

lazy_static! {
    static ref WWW_AUTHENTICATE_PAIR_REGEX: Regex = Regex::new(r#"(\w+)="([^"]*)""#).unwrap();
}

/// Unix timestamp in seconds
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before unix epoch")
        .as_secs() as i64
}

/// Generates `bytes` (default 32) random bytes, base64url encoded
pub fn generate_random(bytes: Option<u32>) -> String {
    let mut random_bytes = vec![0u8; bytes.unwrap_or(32) as usize];
    rand::thread_rng().fill(random_bytes.as_mut_slice());

    base64_url::encode(&random_bytes)
}

/// Generates a random `state` value
pub fn generate_state() -> String {
    generate_random(None)
}

/// Generates a random `nonce` value
pub fn generate_nonce() -> String {
    generate_random(None)
}

/// Generates a random PKCE `code_verifier`
pub fn generate_code_verifier() -> String {
    generate_random(None)
}

/// S256 PKCE `code_challenge` for `verifier`
pub fn code_challenge(verifier: &str) -> String {
    base64_url::encode(&Sha256::digest(verifier.as_bytes()))
}

pub(crate) fn convert_json_to<T: for<'a> Deserialize<'a>>(plain: &str) -> Result<T, String> {
    serde_json::from_str::<T>(plain).map_err(|_| "Parse Error".to_string())
}

/// Splits a compact JWS into header, payload and signature without verifying
/// anything. Encrypted tokens are rejected.
pub fn decode_jwt(token: &str) -> OidcReturn<DecodedToken> {
    let segments: Vec<&str> = token.split('.').collect();

    if segments.len() == 5 {
        return Err(OidcError::new_rp_error(
            "encrypted JWTs cannot be decoded",
            None,
        ));
    }

    if segments.len() != 3 {
        return Err(OidcError::new_rp_error(
            "JWTs must have three components",
            None,
        ));
    }

    fn malformed<E>(_: E) -> OidcError {
        OidcError::new_rp_error("JWT is malformed", None)
    }

    let header_bytes = base64_url::decode(segments[0]).map_err(malformed)?;
    let payload_bytes = base64_url::decode(segments[1]).map_err(malformed)?;

    let header = serde_json::from_slice::<Map<String, Value>>(&header_bytes)
        .map_err(malformed)
        .map(josekit::jws::JwsHeader::from_map)?
        .map_err(malformed)?;

    let payload = serde_json::from_slice::<Map<String, Value>>(&payload_bytes)
        .map_err(malformed)
        .map(josekit::jwt::JwtPayload::from_map)?
        .map_err(malformed)?;

    Ok(DecodedToken {
        header,
        payload,
        signature: segments[2].to_string(),
    })
}

pub(crate) fn validate_url(url: &str) -> OidcReturn<Url> {
    Url::parse(url).map_err(|_| {
        OidcError::new_rp_error("only valid absolute URLs can be requested", None)
    })
}

/// Maps a `www-authenticate` challenge carrying an `error` attribute to an OP
/// error. Challenges without one surface as a generic error.
pub(crate) fn parse_www_authenticate_error(
    header_value: &str,
    response: &HttpResponse,
) -> OidcReturn<()> {
    let mut body = OpErrorBody::default();

    for capture in WWW_AUTHENTICATE_PAIR_REGEX.captures_iter(header_value) {
        if let (Some(key), Some(value)) = (capture.get(1), capture.get(2)) {
            match key.as_str() {
                "error" => body.error = value.as_str().to_string(),
                "error_description" => {
                    body.error_description = Some(value.as_str().to_string())
                }
                _ => {}
            }
        }
    }

    if body.error.is_empty() {
        return Err(OidcError::new_rp_error(
            "www authenticate error",
            Some(response.clone()),
        ));
    }

    Err(OidcError::from_op_body(body, Some(response.clone())))
}

fn digest_for_alg(alg: &str, source: &str, curve: Option<&str>) -> OidcReturn<Vec<u8>> {
    match alg {
        "HS256" | "RS256" | "PS256" | "ES256" | "ES256K" => {
            Ok(Sha256::digest(source)[..].to_vec())
        }
        "HS384" | "RS384" | "PS384" | "ES384" => Ok(Sha384::digest(source)[..].to_vec()),
        "HS512" | "RS512" | "PS512" | "ES512" => Ok(Sha512::digest(source)[..].to_vec()),
        "EdDSA" => match curve {
            Some("Ed25519") => Ok(Sha512::digest(source)[..].to_vec()),
            Some("Ed448") => {
                let mut hasher = Shake256::default();
                hasher.update(source.as_bytes());
                let mut reader = hasher.finalize_xof();
                let mut hashed = [0u8; 114];
                reader.read(&mut hashed);

                Ok(hashed.to_vec())
            }
            _ => Err(OidcError::new_rp_error(
                "unrecognized or invalid EdDSA curve provided",
                None,
            )),
        },
        _ => Err(OidcError::new_rp_error(
            "unrecognized or invalid JWS algorithm provided",
            None,
        )),
    }
}

/// Left-most half of the digest matching `alg`, base64url encoded. This is the
/// value of `at_hash`, `c_hash` and `s_hash` claims.
pub(crate) fn generate_hash(alg: &str, source: &str, curve: Option<&str>) -> OidcReturn<String> {
    let hash = digest_for_alg(alg, source, curve)?;

    Ok(base64_url::encode(&hash[0..hash.len() / 2]))
}

/// Verifies a hash claim (`actual`) against its companion artifact
/// (`source`).
pub(crate) fn validate_hash(
    claim: &str,
    actual: &str,
    alg: &str,
    source: &str,
    curve: Option<&str>,
) -> OidcReturn<()> {
    let expected = generate_hash(alg, source, curve).map_err(|err| {
        OidcError::new_rp_error(
            &format!(
                "{} could not be validated ({})",
                claim,
                err.rp_error().message
            ),
            None,
        )
    })?;

    if expected != actual {
        return Err(OidcError::new_rp_error(
            &format!("{} mismatch, expected {}, got: {}", claim, expected, actual),
            None,
        ));
    }

    Ok(())
}

pub(crate) fn get_serde_value_as_string(v: &Value) -> OidcReturn<String> {
    match v {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.to_string()),
        other => serde_json::to_string(other).map_err(|_| {
            OidcError::new_rp_error(
                &format!("invalid value to convert to string: {:?}", other),
                None,
            )
        }),
    }
}

pub(crate) fn string_map_to_form_url_encoded(map: &HashMap<String, String>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in map {
        serializer.append_pair(k, v);
    }

    serializer.finish()
}

pub(crate) fn form_url_encoded_to_string_map(body: &str) -> HashMap<String, String> {
    form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
