use josekit::jwe::JweHeader;
use serde_json::json;

use crate::jwks::CustomJwk;
use crate::tests::helpers::{secret_jwk, sign_jwt, test_client, test_client_metadata, NOW};
use crate::tests::test_http_client::TestHttpClient;
use crate::tokenset::{TokenSet, TokenSetParams};
use crate::types::ClientMetadata;

fn encrypting_client_metadata() -> ClientMetadata {
    ClientMetadata {
        id_token_signed_response_alg: Some("HS256".to_string()),
        id_token_encrypted_response_alg: Some("dir".to_string()),
        id_token_encrypted_response_enc: Some("A128CBC-HS256".to_string()),
        ..test_client_metadata()
    }
}

fn encrypt_for(client: &crate::client::Client, inner: &str) -> String {
    let key = client.secret_for_alg("A128CBC-HS256").unwrap();
    let encrypter = key.to_jwe_encrypter().unwrap();

    let mut header = JweHeader::new();
    header.set_algorithm("dir");
    header.set_content_encryption("A128CBC-HS256");
    header.set_content_type("JWT");

    josekit::jwe::serialize_compact(inner.as_bytes(), &header, &*encrypter).unwrap()
}

fn tokens(id_token: String) -> TokenSet {
    TokenSet::new(TokenSetParams {
        id_token: Some(id_token),
        ..Default::default()
    })
}

#[tokio::test]
async fn an_encrypted_id_token_is_decrypted_then_validated() {
    let mut client = test_client(encrypting_client_metadata());

    let inner = sign_jwt(
        "HS256",
        &json!({
            "iss": "https://op.example.com",
            "sub": "u",
            "aud": "identifier",
            "iat": NOW,
            "exp": NOW + 60,
        }),
        &secret_jwk("secure"),
        None,
    );

    let jwe = encrypt_for(&client, &inner);
    assert_eq!(5, jwe.split('.').count());

    let token_set = client.decrypt_id_token(tokens(jwe)).unwrap();
    assert_eq!(Some(inner), token_set.get_id_token());

    client
        .validate_id_token_async(token_set, None, true, "token", None, None, &TestHttpClient::new())
        .await
        .unwrap();
}

#[test]
fn the_outer_header_must_announce_the_configured_alg() {
    let client = test_client(encrypting_client_metadata());

    // a JWE with alg A128KW where dir is expected
    let header = base64_url::encode(r#"{"alg":"A128KW","enc":"A128CBC-HS256"}"#);
    let jwe = format!("{}.a.b.c.d", header);

    let err = client.decrypt_id_token(tokens(jwe)).unwrap_err();

    assert_eq!(
        "unexpected JWE alg received, expected dir, got: A128KW",
        err.rp_error().message
    );
}

#[test]
fn the_outer_header_must_announce_the_configured_enc() {
    let client = test_client(encrypting_client_metadata());

    let header = base64_url::encode(r#"{"alg":"dir","enc":"A256CBC-HS512"}"#);
    let jwe = format!("{}.a.b.c.d", header);

    let err = client.decrypt_id_token(tokens(jwe)).unwrap_err();

    assert_eq!(
        "unexpected JWE enc received, expected A128CBC-HS256, got: A256CBC-HS512",
        err.rp_error().message
    );
}

#[test]
fn decryption_is_a_no_op_for_clients_without_encryption_metadata() {
    let client = test_client(test_client_metadata());

    let token_set = client.decrypt_id_token(tokens("x.y.z".to_string())).unwrap();

    assert_eq!(Some("x.y.z".to_string()), token_set.get_id_token());
}

#[test]
fn a_garbled_ciphertext_fails_to_decrypt() {
    let client = test_client(encrypting_client_metadata());

    let header = base64_url::encode(r#"{"alg":"dir","enc":"A128CBC-HS256"}"#);
    let jwe = format!("{}..AAAA.AAAA.AAAA", header);

    let err = client.decrypt_id_token(tokens(jwe)).unwrap_err();

    assert_eq!("failed to decrypt JWE", err.rp_error().message);
}
