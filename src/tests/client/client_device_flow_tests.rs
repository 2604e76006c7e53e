use serde_json::json;

use crate::tests::helpers::{sign_jwt, test_client, test_client_metadata, NOW};
use crate::tests::test_http_client::{TestHttpClient, TestHttpReqRes};
use crate::types::{
    ClientMetadata, DeviceAuthorizationParams, DeviceFlowPoll, HttpMethod,
};

fn device_response_body() -> &'static str {
    r#"{
        "device_code": "GmRhmhcxhwAzkoEqiMEg_DnyEysNkuNhszIySk9eS",
        "user_code": "WDJB-MJHT",
        "verification_uri": "https://op.example.com/device/verify",
        "verification_uri_complete": "https://op.example.com/device/verify?user_code=WDJB-MJHT",
        "expires_in": 1800,
        "interval": 5
    }"#
}

#[tokio::test]
async fn device_authorization_returns_a_handle() {
    let http_client = TestHttpReqRes::new("https://op.example.com/device")
        .assert_request_method(HttpMethod::POST)
        .assert_request_header(
            "authorization",
            vec!["Basic aWRlbnRpZmllcjpzZWN1cmU=".to_string()],
        )
        .assert_request_body("client_id=identifier&scope=openid+profile")
        .set_response_body(device_response_body())
        .build();

    let mut client = test_client(test_client_metadata());

    let handle = client
        .device_authorization_async(
            &http_client,
            DeviceAuthorizationParams {
                scope: Some(vec!["openid".to_string(), "profile".to_string()]),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!("WDJB-MJHT", handle.user_code());
    assert_eq!("https://op.example.com/device/verify", handle.verification_uri());
    assert_eq!(5.0, handle.interval());
    assert_eq!(NOW + 1800, handle.expires_at());
    assert!(!handle.expired());

    http_client.assert();
}

#[tokio::test]
async fn polling_walks_pending_slow_down_then_granted() {
    let id_token = sign_jwt(
        "HS256",
        &json!({
            "iss": "https://op.example.com",
            "sub": "u",
            "aud": "identifier",
            "iat": NOW,
            "exp": NOW + 60,
        }),
        &crate::tests::helpers::secret_jwk("secure"),
        None,
    );

    let http_client = TestHttpReqRes::new("https://op.example.com/device")
        .set_response_body(device_response_body())
        .build()
        .add(
            TestHttpReqRes::new("https://op.example.com/token")
                .set_response_status_code(400)
                .set_response_body(r#"{"error":"authorization_pending"}"#),
        )
        .add(
            TestHttpReqRes::new("https://op.example.com/token")
                .set_response_status_code(400)
                .set_response_body(r#"{"error":"slow_down"}"#),
        )
        .add(TestHttpReqRes::new("https://op.example.com/token").set_response_body(
            format!(
                r#"{{"access_token":"AT","token_type":"Bearer","id_token":"{}"}}"#,
                id_token
            ),
        ));

    let mut client = test_client(ClientMetadata {
        token_endpoint_auth_method: Some("client_secret_post".to_string()),
        id_token_signed_response_alg: Some("HS256".to_string()),
        ..test_client_metadata()
    });

    let mut handle = client
        .device_authorization_async(&http_client, Default::default(), None)
        .await
        .unwrap();

    // the handle debounces within the interval, steer the clock per poll
    handle.now = || NOW + 10;
    let poll = handle.grant_async(&http_client).await.unwrap();
    assert!(matches!(poll, DeviceFlowPoll::AuthorizationPending));

    handle.now = || NOW + 20;
    let poll = handle.grant_async(&http_client).await.unwrap();
    assert!(matches!(poll, DeviceFlowPoll::SlowDown));
    assert_eq!(10.0, handle.interval());

    handle.now = || NOW + 40;
    let poll = handle.grant_async(&http_client).await.unwrap();

    match poll {
        DeviceFlowPoll::Granted(token_set) => {
            assert_eq!(Some("AT".to_string()), token_set.get_access_token());
        }
        other => panic!("expected a grant, got {:?}", other),
    }

    http_client.assert();
}

#[tokio::test]
async fn polls_within_the_interval_are_debounced() {
    let http_client = TestHttpReqRes::new("https://op.example.com/device")
        .set_response_body(device_response_body())
        .build()
        .add(
            TestHttpReqRes::new("https://op.example.com/token")
                .set_response_status_code(400)
                .set_response_body(r#"{"error":"authorization_pending"}"#),
        );

    let mut client = test_client(test_client_metadata());

    let mut handle = client
        .device_authorization_async(&http_client, Default::default(), None)
        .await
        .unwrap();

    handle.now = || NOW + 10;
    let poll = handle.grant_async(&http_client).await.unwrap();
    assert!(matches!(poll, DeviceFlowPoll::AuthorizationPending));

    // still NOW + 10, within the 5 second interval of the last request
    let poll = handle.grant_async(&http_client).await.unwrap();
    assert!(matches!(poll, DeviceFlowPoll::Debounced));

    http_client.assert();
}

#[tokio::test]
async fn denial_is_the_servers_error() {
    let http_client = TestHttpReqRes::new("https://op.example.com/device")
        .set_response_body(device_response_body())
        .build()
        .add(
            TestHttpReqRes::new("https://op.example.com/token")
                .set_response_status_code(400)
                .set_response_body(r#"{"error":"access_denied"}"#),
        );

    let mut client = test_client(test_client_metadata());

    let mut handle = client
        .device_authorization_async(&http_client, Default::default(), None)
        .await
        .unwrap();

    handle.now = || NOW + 10;
    let err = handle.grant_async(&http_client).await.unwrap_err();

    assert!(err.is_op_error());
    assert_eq!("access_denied", err.op_error().error);
}

#[tokio::test]
async fn an_expired_device_code_concludes_the_session() {
    let http_client = TestHttpReqRes::new("https://op.example.com/device")
        .set_response_body(device_response_body())
        .build();

    let mut client = test_client(test_client_metadata());

    let mut handle = client
        .device_authorization_async(&http_client, Default::default(), None)
        .await
        .unwrap();

    handle.now = || NOW + 1801;

    let err = handle.grant_async(&TestHttpClient::new()).await.unwrap_err();

    assert!(err
        .rp_error()
        .message
        .contains("has expired and the device authorization session has concluded"));
}
