//! Shared fixtures: a frozen clock, issuer and client factories and JWT
//! signing shortcuts.

use josekit::{jwk::Jwk, jws::JwsHeader};
use serde_json::Value;

use crate::client::Client;
use crate::issuer::Issuer;
use crate::jwks::{CustomJwk, Jwks};
use crate::types::{ClientMetadata, IssuerMetadata};

pub const NOW: i64 = 1_700_000_000;

pub fn frozen_now() -> i64 {
    NOW
}

pub fn test_issuer_metadata() -> IssuerMetadata {
    IssuerMetadata {
        issuer: "https://op.example.com".to_string(),
        authorization_endpoint: Some("https://op.example.com/auth".to_string()),
        token_endpoint: Some("https://op.example.com/token".to_string()),
        userinfo_endpoint: Some("https://op.example.com/me".to_string()),
        jwks_uri: Some("https://op.example.com/certs".to_string()),
        end_session_endpoint: Some("https://op.example.com/session/end".to_string()),
        introspection_endpoint: Some("https://op.example.com/token/introspect".to_string()),
        revocation_endpoint: Some("https://op.example.com/token/revoke".to_string()),
        device_authorization_endpoint: Some("https://op.example.com/device".to_string()),
        registration_endpoint: Some("https://op.example.com/client/registration".to_string()),
        ..Default::default()
    }
}

pub fn test_issuer() -> Issuer {
    Issuer::new(test_issuer_metadata())
}

pub fn test_client_metadata() -> ClientMetadata {
    ClientMetadata {
        client_id: Some("identifier".to_string()),
        client_secret: Some("secure".to_string()),
        ..Default::default()
    }
}

/// A client of [test_issuer] with the clock frozen at [NOW]
pub fn test_client(metadata: ClientMetadata) -> Client {
    let mut client = test_issuer().client(metadata, None, None).unwrap();
    client.set_now(frozen_now);
    client
}

/// An RSA signing pair: the private key (kid `rsa-key-1`) and the JWKS
/// document serving its public half.
pub fn rsa_key_pair() -> (Jwk, String) {
    let mut private_key = Jwk::generate_rsa_key(2048).unwrap();
    private_key.set_key_id("rsa-key-1");

    let mut public_key = private_key.to_public_key().unwrap();
    public_key.set_key_id("rsa-key-1");

    let jwks = Jwks::from(vec![public_key]);

    (private_key, serde_json::to_string(&jwks).unwrap())
}

/// Signs `payload` as a compact JWS under `alg`
pub fn sign_jwt(alg: &str, payload: &Value, key: &Jwk, kid: Option<&str>) -> String {
    let mut header = JwsHeader::new();
    header.set_algorithm(alg);

    if let Some(kid) = kid {
        header.set_key_id(kid);
    }

    let mut signing_key = key.clone();
    signing_key.set_algorithm(alg);

    let signer = signing_key.to_signer().unwrap();

    josekit::jws::serialize_compact(payload.to_string().as_bytes(), &header, &*signer).unwrap()
}

/// The `oct` key matching the fixture client's `client_secret`
pub fn secret_jwk(secret: &str) -> Jwk {
    let mut jwk = Jwk::new("oct");
    jwk.set_key_value(secret);
    jwk
}
