use std::collections::HashMap;

use crate::issuer::Issuer;
use crate::tests::helpers::test_issuer_metadata;
use crate::tests::test_http_client::{TestHttpClient, TestHttpReqRes};
use crate::types::{
    ClientMetadata, GrantExtras, HttpMethod, IssuerMetadata, MtlsEndpoints, UserinfoOptions,
    UserinfoToken,
};

fn mtls_issuer() -> Issuer {
    Issuer::new(IssuerMetadata {
        mtls_endpoint_aliases: Some(MtlsEndpoints {
            token_endpoint: Some("https://mtls.op.example.com/token".to_string()),
            userinfo_endpoint: Some("https://mtls.op.example.com/me".to_string()),
            ..Default::default()
        }),
        ..test_issuer_metadata()
    })
}

#[tokio::test]
async fn tls_client_auth_reroutes_to_the_token_endpoint_alias() {
    let http_client = TestHttpClient::new()
        .add(
            TestHttpReqRes::new("https://mtls.op.example.com/token")
                .assert_request_method(HttpMethod::POST)
                .assert_request_mtls(true)
                .assert_request_body("grant_type=client_credentials&client_id=identifier")
                .set_response_body(r#"{"access_token":"AT","token_type":"Bearer"}"#),
        )
        .with_client_cert();

    let mut client = mtls_issuer()
        .client(
            ClientMetadata {
                client_id: Some("identifier".to_string()),
                token_endpoint_auth_method: Some("tls_client_auth".to_string()),
                ..Default::default()
            },
            None,
            None,
        )
        .unwrap();

    let mut body = HashMap::new();
    body.insert("grant_type".to_string(), "client_credentials".to_string());

    client
        .grant_async(&http_client, body, GrantExtras::default())
        .await
        .unwrap();

    http_client.assert();
}

#[tokio::test]
async fn certificate_bound_access_tokens_use_the_userinfo_alias() {
    let http_client = TestHttpClient::new()
        .add(
            TestHttpReqRes::new("https://mtls.op.example.com/me")
                .assert_request_mtls(true)
                .set_response_body(r#"{"sub":"u"}"#),
        )
        .with_client_cert();

    let mut client = mtls_issuer()
        .client(
            ClientMetadata {
                client_id: Some("identifier".to_string()),
                client_secret: Some("secure".to_string()),
                tls_client_certificate_bound_access_tokens: Some(true),
                ..Default::default()
            },
            None,
            None,
        )
        .unwrap();

    client
        .userinfo_async(
            &http_client,
            UserinfoToken::AccessToken("AT"),
            UserinfoOptions::default(),
        )
        .await
        .unwrap();

    http_client.assert();
}

#[tokio::test]
async fn mtls_requests_require_a_certificate() {
    // the scripted client refuses to hand out a certificate
    let http_client = TestHttpClient::new();

    let mut client = mtls_issuer()
        .client(
            ClientMetadata {
                client_id: Some("identifier".to_string()),
                token_endpoint_auth_method: Some("tls_client_auth".to_string()),
                ..Default::default()
            },
            None,
            None,
        )
        .unwrap();

    let err = client
        .grant_async(&http_client, HashMap::new(), GrantExtras::default())
        .await
        .unwrap_err();

    assert_eq!(
        "mutual-TLS certificate and key not set",
        err.rp_error().message
    );
}
