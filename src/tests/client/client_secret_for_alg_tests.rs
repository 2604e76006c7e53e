use sha2::{Digest, Sha256};

use crate::tests::helpers::{test_client, test_client_metadata};
use crate::types::ClientMetadata;

#[test]
fn hs_algorithms_use_the_raw_secret_bytes() {
    let client = test_client(test_client_metadata());

    let jwk = client.secret_for_alg("HS256").unwrap();

    assert_eq!("oct", jwk.key_type());
    assert_eq!(Some("HS256"), jwk.algorithm());
    assert_eq!(
        Some(base64_url::encode("secure")),
        jwk.parameter("k").and_then(|k| k.as_str()).map(String::from)
    );
}

#[test]
fn gcm_lengths_derive_from_a_sha256_of_the_secret() {
    let client = test_client(test_client_metadata());

    let jwk = client.secret_for_alg("A128GCM").unwrap();

    // 128 bits of SHA-256("secure")
    assert_eq!(Some("dir"), jwk.algorithm());
    assert_eq!(Some("enc"), jwk.key_use());

    let key = base64_url::decode(jwk.parameter("k").unwrap().as_str().unwrap()).unwrap();
    assert_eq!(16, key.len());

    let full = Sha256::digest("secure".as_bytes());
    assert_eq!(&full[..16], key.as_slice());
}

#[test]
fn cbc_hs_lengths_use_the_trailing_bits() {
    let client = test_client(test_client_metadata());

    let jwk = client.secret_for_alg("A128CBC-HS256").unwrap();

    let key = base64_url::decode(jwk.parameter("k").unwrap().as_str().unwrap()).unwrap();
    assert_eq!(32, key.len());
}

#[test]
fn key_wrap_algorithms_keep_their_alg_label() {
    let client = test_client(test_client_metadata());

    let jwk = client.secret_for_alg("A192KW").unwrap();

    assert_eq!(Some("A192KW"), jwk.algorithm());

    let key = base64_url::decode(jwk.parameter("k").unwrap().as_str().unwrap()).unwrap();
    assert_eq!(24, key.len());
}

#[test]
fn derivation_is_deterministic_and_memoized() {
    let client = test_client(test_client_metadata());

    let first = client.secret_for_alg("A256GCM").unwrap();
    let second = client.secret_for_alg("A256GCM").unwrap();

    assert_eq!(first.parameter("k"), second.parameter("k"));

    // a fresh client derives the identical key
    let other_client = test_client(test_client_metadata());
    let fresh = other_client.secret_for_alg("A256GCM").unwrap();

    assert_eq!(first.parameter("k"), fresh.parameter("k"));
}

#[test]
fn a_missing_client_secret_is_fatal() {
    let client = test_client(ClientMetadata {
        client_secret: None,
        ..test_client_metadata()
    });

    let err = client.secret_for_alg("HS256").unwrap_err();

    assert_eq!("client_secret is required", err.rp_error().message);
}
