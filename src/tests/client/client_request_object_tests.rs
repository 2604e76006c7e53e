use serde_json::json;

use crate::helpers::decode_jwt;
use crate::jwks::CustomJwk;
use crate::tests::helpers::{secret_jwk, test_client, test_client_metadata, NOW};
use crate::tests::test_http_client::TestHttpClient;
use crate::types::ClientMetadata;

#[tokio::test]
async fn unsigned_request_objects_round_trip() {
    let mut client = test_client(test_client_metadata());

    let request_object = client
        .request_object_async(
            &TestHttpClient::new(),
            json!({"response_type": "code", "scope": "openid email"}),
        )
        .await
        .unwrap();

    // compact JWS with an empty signature segment
    let segments: Vec<&str> = request_object.split('.').collect();
    assert_eq!(3, segments.len());
    assert!(segments[2].is_empty());

    let decoded = decode_jwt(&request_object).unwrap();

    assert_eq!(Some("none"), decoded.header.algorithm());
    assert_eq!(
        Some(&json!("oauth-authz-req+jwt")),
        decoded.header.claim("typ")
    );

    // the caller's parameters survive with the protocol claims filled in
    assert_eq!(Some(&json!("code")), decoded.payload.claim("response_type"));
    assert_eq!(Some(&json!("openid email")), decoded.payload.claim("scope"));
    assert_eq!(Some(&json!("identifier")), decoded.payload.claim("iss"));
    assert_eq!(Some(&json!("identifier")), decoded.payload.claim("client_id"));
    assert_eq!(
        Some(&json!("https://op.example.com")),
        decoded.payload.claim("aud")
    );
    assert_eq!(Some(&json!(NOW)), decoded.payload.claim("iat"));
    assert_eq!(Some(&json!(NOW + 300)), decoded.payload.claim("exp"));
    assert!(decoded.payload.claim("jti").is_some());
}

#[tokio::test]
async fn hs_signed_request_objects_verify_with_the_secret() {
    let mut client = test_client(ClientMetadata {
        request_object_signing_alg: Some("HS256".to_string()),
        ..test_client_metadata()
    });

    let request_object = client
        .request_object_async(&TestHttpClient::new(), json!({"state": "foo"}))
        .await
        .unwrap();

    let mut key = secret_jwk("secure");
    key.set_algorithm("HS256");
    let verifier = key.to_verifier().unwrap();

    let (payload, header) =
        josekit::jwt::decode_with_verifier(&request_object, &*verifier).unwrap();

    assert_eq!(Some("HS256"), header.algorithm());
    assert_eq!(Some(&json!("foo")), payload.claim("state"));
}

#[tokio::test]
async fn symmetric_encryption_wraps_the_signed_jwt() {
    let mut client = test_client(ClientMetadata {
        request_object_signing_alg: Some("HS256".to_string()),
        request_object_encryption_alg: Some("dir".to_string()),
        request_object_encryption_enc: Some("A128CBC-HS256".to_string()),
        ..test_client_metadata()
    });

    let request_object = client
        .request_object_async(&TestHttpClient::new(), json!({"state": "foo"}))
        .await
        .unwrap();

    // five segments of a compact JWE
    assert_eq!(5, request_object.split('.').count());

    // decrypts back to the signed JWT with the derived key
    let key = client.secret_for_alg("A128CBC-HS256").unwrap();
    let decrypter = key.to_jwe_decrypter().unwrap();
    let (content, header) =
        josekit::jwe::deserialize_compact(&request_object, &*decrypter).unwrap();

    assert_eq!(Some("JWT"), header.content_type());

    let inner = String::from_utf8(content).unwrap();
    assert_eq!(3, inner.split('.').count());
}

#[tokio::test]
async fn rejects_non_object_input() {
    let mut client = test_client(test_client_metadata());

    let err = client
        .request_object_async(&TestHttpClient::new(), json!("nope"))
        .await
        .unwrap_err();

    assert_eq!(
        "request_object must be a plain object",
        err.rp_error().message
    );
}
