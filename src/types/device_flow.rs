use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::tokenset::TokenSet;

/// Parameters of a device authorization request, RFC 8628 §3.1
#[derive(Debug, Default)]
pub struct DeviceAuthorizationParams {
    /// `client_id`, defaults to the client's own
    pub client_id: Option<String>,
    /// Requested scopes
    pub scope: Option<Vec<String>>,
    /// Maximum authentication age enforced on the eventual ID Token
    pub max_age: Option<u64>,
    /// Any other parameter to send
    pub other: HashMap<String, Value>,
}

/// Device authorization response, RFC 8628 §3.2
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorizationResponse {
    /// The device verification code
    pub device_code: String,
    /// The code the end user enters at the verification uri
    pub user_code: String,
    /// Where the end user verifies the `user_code`
    pub verification_uri: String,
    /// Verification uri with the `user_code` embedded
    pub verification_uri_complete: Option<String>,
    /// Lifetime of `device_code` and `user_code` in seconds
    pub expires_in: i64,
    /// Minimum seconds between polls
    pub interval: Option<f64>,
}

/// Extra inputs of the device flow token requests
#[derive(Debug, Default, Clone)]
pub struct DeviceAuthorizationExtras {
    /// Additional body parameters of the token request
    pub exchange_body: Option<HashMap<String, String>>,
    /// Claims overlaid onto the client assertion
    pub client_assertion_payload: Option<HashMap<String, Value>>,
}

/// Outcome of one poll of the device flow handle
#[derive(Debug)]
pub enum DeviceFlowPoll {
    /// Polled again before `interval` elapsed; nothing was sent
    Debounced,
    /// The user has not approved or denied yet
    AuthorizationPending,
    /// The server asked to poll less often; the interval grew by 5 seconds
    SlowDown,
    /// The grant succeeded
    Granted(Box<TokenSet>),
}
