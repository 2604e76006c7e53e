use serde_json::{json, Value};

use crate::client::Client;
use crate::helpers::generate_hash;
use crate::issuer::Issuer;
use crate::tests::helpers::{secret_jwk, sign_jwt, test_client, test_client_metadata, NOW};
use crate::tests::test_http_client::TestHttpClient;
use crate::tokenset::{TokenSet, TokenSetParams};
use crate::types::{ClientMetadata, ClientOptions, IssuerMetadata};

fn hs_client() -> Client {
    test_client(ClientMetadata {
        id_token_signed_response_alg: Some("HS256".to_string()),
        ..test_client_metadata()
    })
}

fn base_payload() -> Value {
    json!({
        "iss": "https://op.example.com",
        "sub": "user",
        "aud": "identifier",
        "exp": NOW + 3600,
        "iat": NOW,
    })
}

fn hs_id_token(payload: &Value) -> String {
    sign_jwt("HS256", payload, &secret_jwk("secure"), None)
}

fn tokens(id_token: String) -> TokenSet {
    TokenSet::new(TokenSetParams {
        id_token: Some(id_token),
        ..Default::default()
    })
}

#[tokio::test]
async fn accepts_a_valid_hs256_id_token() {
    let mut client = hs_client();

    let token_set = tokens(hs_id_token(&base_payload()));

    client
        .validate_id_token_async(token_set, None, true, "token", None, None, &TestHttpClient::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn requires_the_configured_alg() {
    // client expects RS256 by default
    let mut client = test_client(test_client_metadata());

    let token_set = tokens(hs_id_token(&base_payload()));

    let err = client
        .validate_id_token_async(token_set, None, true, "token", None, None, &TestHttpClient::new())
        .await
        .unwrap_err();

    assert_eq!(
        "unexpected JWT alg received, expected RS256, got: HS256",
        err.rp_error().message
    );
}

#[tokio::test]
async fn requires_the_core_claims_to_be_present() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload.as_object_mut().unwrap().remove("sub");

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!("missing required JWT property sub", err.rp_error().message);
}

#[tokio::test]
async fn rejects_a_foreign_iss() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["iss"] = json!("https://other-op.example.com");

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        "unexpected iss value, expected https://op.example.com, got: https://other-op.example.com",
        err.rp_error().message
    );
}

#[tokio::test]
async fn multitenant_issuer_templates_resolve_against_tid() {
    let issuer = Issuer::new(IssuerMetadata {
        issuer: "https://login/{tenantid}/v2.0".to_string(),
        ..Default::default()
    });

    let mut client = issuer
        .client(
            ClientMetadata {
                id_token_signed_response_alg: Some("HS256".to_string()),
                ..test_client_metadata()
            },
            None,
            None,
        )
        .unwrap();
    client.set_now(crate::tests::helpers::frozen_now);

    let mut payload = base_payload();
    payload["iss"] = json!("https://login/T1/v2.0");
    payload["tid"] = json!("T1");

    client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn iat_within_tolerance_is_accepted_and_beyond_rejected() {
    let mut client = test_client(ClientMetadata {
        id_token_signed_response_alg: Some("HS256".to_string()),
        clock_tolerance: Some(5),
        ..test_client_metadata()
    });

    let mut payload = base_payload();
    payload["iat"] = json!(NOW + 5);

    client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap();

    payload["iat"] = json!(NOW + 6);

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        format!("JWT issued in the future, now {}, iat {}", NOW, NOW + 6),
        err.rp_error().message
    );
}

#[tokio::test]
async fn exp_on_the_tolerance_edge_is_rejected_one_past_is_accepted() {
    let mut client = test_client(ClientMetadata {
        id_token_signed_response_alg: Some("HS256".to_string()),
        clock_tolerance: Some(5),
        ..test_client_metadata()
    });

    let mut payload = base_payload();
    payload["exp"] = json!(NOW - 5);

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert!(err.rp_error().message.starts_with("JWT expired"));

    payload["exp"] = json!(NOW - 4);

    client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn an_expired_token_is_rejected() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["exp"] = json!(NOW - 1);

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        format!("JWT expired, now {}, exp {}", NOW, NOW - 1),
        err.rp_error().message
    );
}

#[tokio::test]
async fn nbf_in_the_future_is_rejected() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["nbf"] = json!(NOW + 60);

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        format!("JWT not active yet, now {}, nbf {}", NOW, NOW + 60),
        err.rp_error().message
    );
}

#[tokio::test]
async fn non_numeric_time_claims_are_rejected() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["nbf"] = json!("soon");

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        "JWT nbf claim must be a JSON numeric value",
        err.rp_error().message
    );
}

#[tokio::test]
async fn a_singleton_aud_array_matching_the_client_is_accepted() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["aud"] = json!(["identifier"]);

    client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn multiple_audiences_require_azp() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["aud"] = json!(["identifier", "another-rp"]);

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!("missing required JWT property azp", err.rp_error().message);

    payload["azp"] = json!("identifier");

    client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn azp_must_name_the_client_or_an_additional_party() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["aud"] = json!(["identifier", "another-rp"]);
    payload["azp"] = json!("another-rp");

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!("azp mismatch, got: another-rp", err.rp_error().message);

    let issuer = crate::tests::helpers::test_issuer();
    let mut lenient = issuer
        .client(
            ClientMetadata {
                id_token_signed_response_alg: Some("HS256".to_string()),
                ..test_client_metadata()
            },
            None,
            Some(ClientOptions {
                additional_authorized_parties: Some(vec!["another-rp".to_string()]),
            }),
        )
        .unwrap();
    lenient.set_now(crate::tests::helpers::frozen_now);

    lenient
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn aud_must_include_the_client() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["aud"] = json!("someone-else");

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        "aud mismatch, expected identifier, got: someone-else",
        err.rp_error().message
    );
}

#[tokio::test]
async fn nonce_must_match_when_expected() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["nonce"] = json!("good");

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            Some("expected"),
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        "nonce mismatch, expected expected, got: good",
        err.rp_error().message
    );
}

#[tokio::test]
async fn an_unexpected_nonce_claim_is_a_mismatch() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["nonce"] = json!("uninvited");

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        "nonce mismatch, expected , got: uninvited",
        err.rp_error().message
    );
}

#[tokio::test]
async fn the_nonce_check_can_be_suppressed() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["nonce"] = json!("from-an-older-authentication");

    // refresh and device flows validate with no nonce applicable
    client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            false,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn max_age_requires_auth_time() {
    let mut client = hs_client();

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&base_payload())),
            None,
            true,
            "token",
            Some(300),
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        "missing required JWT property auth_time",
        err.rp_error().message
    );
}

#[tokio::test]
async fn require_auth_time_clients_always_need_auth_time() {
    let mut client = test_client(ClientMetadata {
        id_token_signed_response_alg: Some("HS256".to_string()),
        require_auth_time: Some(true),
        ..test_client_metadata()
    });

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&base_payload())),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        "missing required JWT property auth_time",
        err.rp_error().message
    );
}

#[tokio::test]
async fn stale_authentication_fails_the_max_age_check() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["auth_time"] = json!(NOW - 7200);

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            Some(3600),
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert!(err
        .rp_error()
        .message
        .starts_with("too much time has elapsed since the last End-User authentication"));
}

#[tokio::test]
async fn fresh_enough_authentication_passes_the_max_age_check() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["auth_time"] = json!(NOW - 60);

    client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "token",
            Some(3600),
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn at_hash_is_mandatory_in_authorization_responses_with_an_access_token() {
    let mut client = hs_client();

    let token_set = TokenSet::new(TokenSetParams {
        access_token: Some("A".to_string()),
        id_token: Some(hs_id_token(&base_payload())),
        ..Default::default()
    });

    let err = client
        .validate_id_token_async(
            token_set,
            None,
            true,
            "authorization",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!("missing required property at_hash", err.rp_error().message);
}

#[tokio::test]
async fn at_hash_is_validated_when_present() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["at_hash"] = json!(generate_hash("HS256", "A", None).unwrap());

    let token_set = TokenSet::new(TokenSetParams {
        access_token: Some("A".to_string()),
        id_token: Some(hs_id_token(&payload)),
        ..Default::default()
    });

    client
        .validate_id_token_async(
            token_set,
            None,
            true,
            "authorization",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap();

    // the same token against a different access token fails
    let mut payload = base_payload();
    payload["at_hash"] = json!(generate_hash("HS256", "A", None).unwrap());

    let token_set = TokenSet::new(TokenSetParams {
        access_token: Some("B".to_string()),
        id_token: Some(hs_id_token(&payload)),
        ..Default::default()
    });

    let err = client
        .validate_id_token_async(
            token_set,
            None,
            true,
            "authorization",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert!(err.rp_error().message.starts_with("at_hash mismatch"));
}

#[tokio::test]
async fn s_hash_needs_the_state_check_value() {
    let mut client = hs_client();

    let mut payload = base_payload();
    payload["s_hash"] = json!(generate_hash("HS256", "state-value", None).unwrap());

    let err = client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "authorization",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        "cannot verify s_hash, \"checks.state\" property not provided",
        err.rp_error().message
    );

    let mut payload = base_payload();
    payload["s_hash"] = json!(generate_hash("HS256", "state-value", None).unwrap());

    client
        .validate_id_token_async(
            tokens(hs_id_token(&payload)),
            None,
            true,
            "authorization",
            None,
            Some("state-value"),
            &TestHttpClient::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn a_tampered_signature_is_a_single_generic_error() {
    let mut client = hs_client();

    let mut id_token = hs_id_token(&base_payload());
    // flip the last character of the signature segment
    let last = id_token.pop().unwrap();
    id_token.push(if last == 'A' { 'B' } else { 'A' });

    let err = client
        .validate_id_token_async(
            tokens(id_token),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!("failed to validate JWT signature", err.rp_error().message);
}

#[tokio::test]
async fn a_missing_id_token_is_an_error() {
    let mut client = hs_client();

    let err = client
        .validate_id_token_async(
            TokenSet::default(),
            None,
            true,
            "token",
            None,
            None,
            &TestHttpClient::new(),
        )
        .await
        .unwrap_err();

    assert_eq!("id_token not present in TokenSet", err.rp_error().message);
}
