use josekit::jwk::Jwk;

use crate::client::Client;
use crate::jwks::Jwks;
use crate::tests::helpers::test_issuer;
use crate::tests::test_http_client::TestHttpReqRes;
use crate::types::{ClientMetadata, ClientRegistrationOptions, HttpMethod};

#[tokio::test]
async fn registration_posts_the_metadata_and_builds_the_client() {
    let http_client = TestHttpReqRes::new("https://op.example.com/client/registration")
        .assert_request_method(HttpMethod::POST)
        .assert_request_header("accept", vec!["application/json".to_string()])
        .assert_request_header("content-type", vec!["application/json".to_string()])
        .assert_request_body(r#"{"redirect_uris":["https://rp.example.com/cb"]}"#)
        .set_response_status_code(201)
        .set_response_body(
            r#"{"client_id":"generated","client_secret":"issued","redirect_uris":["https://rp.example.com/cb"]}"#,
        )
        .build();

    let issuer = test_issuer();

    let client = Client::register_async(
        &http_client,
        &issuer,
        ClientMetadata {
            redirect_uris: Some(vec!["https://rp.example.com/cb".to_string()]),
            ..Default::default()
        },
        None,
    )
    .await
    .unwrap();

    assert_eq!("generated", client.get_client_id());
    assert_eq!(Some(&"issued".to_string()), client.get_client_secret());

    http_client.assert();
}

#[tokio::test]
async fn an_initial_access_token_is_sent_as_bearer() {
    let http_client = TestHttpReqRes::new("https://op.example.com/client/registration")
        .assert_request_header("authorization", vec!["Bearer initial".to_string()])
        .set_response_status_code(201)
        .set_response_body(r#"{"client_id":"generated"}"#)
        .build();

    let issuer = test_issuer();

    Client::register_async(
        &http_client,
        &issuer,
        ClientMetadata::default(),
        Some(ClientRegistrationOptions {
            initial_access_token: Some("initial".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    http_client.assert();
}

#[tokio::test]
async fn a_provided_private_jwks_is_sent_as_its_public_half() {
    let mut private_key = Jwk::generate_rsa_key(2048).unwrap();
    private_key.set_key_id("reg-key");

    let public_jwks = Jwks::from(vec![private_key.clone()]).get_public_jwks();
    let expected_body = format!(
        r#"{{"jwks":{}}}"#,
        serde_json::to_string(&public_jwks).unwrap()
    );

    let http_client = TestHttpReqRes::new("https://op.example.com/client/registration")
        .assert_request_body(expected_body)
        .set_response_status_code(201)
        .set_response_body(r#"{"client_id":"generated"}"#)
        .build();

    let issuer = test_issuer();

    let client = Client::register_async(
        &http_client,
        &issuer,
        ClientMetadata::default(),
        Some(ClientRegistrationOptions {
            jwks: Some(Jwks::from(vec![private_key])),
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    // the private keys stay with the resulting client
    assert_eq!("generated", client.get_client_id());

    http_client.assert();
}

#[tokio::test]
async fn a_non_201_registration_response_is_an_op_error() {
    let http_client = TestHttpReqRes::new("https://op.example.com/client/registration")
        .set_response_status_code(400)
        .set_response_body(r#"{"error":"invalid_redirect_uri"}"#)
        .build();

    let issuer = test_issuer();

    let err = Client::register_async(&http_client, &issuer, ClientMetadata::default(), None)
        .await
        .unwrap_err();

    assert!(err.is_op_error());
    assert_eq!("invalid_redirect_uri", err.op_error().error);
}

#[tokio::test]
async fn from_uri_reads_the_registered_metadata() {
    let http_client = TestHttpReqRes::new("https://op.example.com/client/registration/generated")
        .assert_request_method(HttpMethod::GET)
        .assert_request_header("authorization", vec!["Bearer rat".to_string()])
        .set_response_body(r#"{"client_id":"generated","response_types":["code id_token"]}"#)
        .build();

    let issuer = test_issuer();

    let client = Client::from_uri_async(
        &http_client,
        "https://op.example.com/client/registration/generated",
        Some("rat".to_string()),
        None,
        None,
        Some(&issuer),
    )
    .await
    .unwrap();

    assert_eq!("generated", client.get_client_id());
    assert_eq!(
        &vec!["code id_token".to_string()],
        client.get_response_types()
    );

    http_client.assert();
}
