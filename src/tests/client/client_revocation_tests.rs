use std::collections::HashMap;

use serde_json::json;

use crate::tests::helpers::{test_client, test_client_metadata};
use crate::tests::test_http_client::TestHttpReqRes;
use crate::types::{GrantExtras, HttpMethod};

#[tokio::test]
async fn grant_posts_the_body_with_client_authentication() {
    let http_client = TestHttpReqRes::new("https://op.example.com/token")
        .assert_request_method(HttpMethod::POST)
        .assert_request_header(
            "authorization",
            vec!["Basic aWRlbnRpZmllcjpzZWN1cmU=".to_string()],
        )
        .assert_request_header("accept", vec!["application/json".to_string()])
        .assert_request_body("grant_type=client_credentials")
        .set_response_body(r#"{"access_token":"AT","token_type":"Bearer","expires_in":60}"#)
        .build();

    let mut client = test_client(test_client_metadata());

    let mut body = HashMap::new();
    body.insert("grant_type".to_string(), "client_credentials".to_string());

    let token_set = client
        .grant_async(&http_client, body, GrantExtras::default())
        .await
        .unwrap();

    assert_eq!(Some("AT".to_string()), token_set.get_access_token());
    assert_eq!(Some(60), token_set.get_expires_in());

    http_client.assert();
}

#[tokio::test]
async fn grant_surfaces_the_servers_error() {
    let http_client = TestHttpReqRes::new("https://op.example.com/token")
        .set_response_status_code(400)
        .set_response_body(r#"{"error":"invalid_grant","error_description":"expired code"}"#)
        .build();

    let mut client = test_client(test_client_metadata());

    let mut body = HashMap::new();
    body.insert("grant_type".to_string(), "authorization_code".to_string());

    let err = client
        .grant_async(&http_client, body, GrantExtras::default())
        .await
        .unwrap_err();

    assert!(err.is_op_error());

    let op = err.op_error();
    assert_eq!("invalid_grant", op.error);
    assert_eq!(Some("expired code".to_string()), op.error_description);
}

#[tokio::test]
async fn introspection_returns_the_parsed_document() {
    let http_client = TestHttpReqRes::new("https://op.example.com/token/introspect")
        .assert_request_method(HttpMethod::POST)
        .assert_request_body("token=AT&token_type_hint=access_token")
        .set_response_body(r#"{"active":true,"scope":"openid"}"#)
        .build();

    let mut client = test_client(test_client_metadata());

    let introspection = client
        .introspect_async(&http_client, "AT", Some("access_token"), None)
        .await
        .unwrap();

    assert_eq!(Some(&json!(true)), introspection.get("active"));

    http_client.assert();
}

#[tokio::test]
async fn revocation_accepts_any_success_with_an_empty_body() {
    let http_client = TestHttpReqRes::new("https://op.example.com/token/revoke")
        .assert_request_method(HttpMethod::POST)
        .assert_request_body("token=AT")
        .set_response_status_code(204)
        .build();

    let mut client = test_client(test_client_metadata());

    client
        .revoke_async(&http_client, "AT", None, None)
        .await
        .unwrap();

    http_client.assert();
}

#[tokio::test]
async fn revocation_ignores_a_response_body() {
    let http_client = TestHttpReqRes::new("https://op.example.com/token/revoke")
        .set_response_body("ignored free-form text")
        .build();

    let mut client = test_client(test_client_metadata());

    client
        .revoke_async(&http_client, "AT", None, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn revocation_propagates_server_errors() {
    let http_client = TestHttpReqRes::new("https://op.example.com/token/revoke")
        .set_response_status_code(400)
        .set_response_body(r#"{"error":"unsupported_token_type"}"#)
        .build();

    let mut client = test_client(test_client_metadata());

    let err = client
        .revoke_async(&http_client, "AT", None, None)
        .await
        .unwrap_err();

    assert!(err.is_op_error());
    assert_eq!("unsupported_token_type", err.op_error().error);
}

#[tokio::test]
async fn endpoint_specific_auth_methods_are_honored() {
    let http_client = TestHttpReqRes::new("https://op.example.com/token/introspect")
        .assert_request_body("token=AT&client_id=identifier&client_secret=secure")
        .set_response_body(r#"{"active":false}"#)
        .build();

    let mut client = test_client(crate::types::ClientMetadata {
        introspection_endpoint_auth_method: Some("client_secret_post".to_string()),
        ..test_client_metadata()
    });

    client
        .introspect_async(&http_client, "AT", None, None)
        .await
        .unwrap();

    http_client.assert();
}
