use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::http_client::HttpMethod;

/// Keys an authorization response may legitimately carry. Anything else is
/// discarded by the parser.
const CALLBACK_KEYS: [&str; 14] = [
    "access_token",
    "code",
    "error",
    "error_description",
    "error_uri",
    "expires_in",
    "id_token",
    "iss",
    "refresh_token",
    "scope",
    "session_state",
    "state",
    "token_type",
    "response",
];

/// # CallbackParams
/// Parameters received on the authorization callback
#[derive(Debug, Default, Clone, Serialize)]
pub struct CallbackParams {
    /// `access_token`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// `code`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `error_description`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// `error_uri`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
    /// `expires_in`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<String>,
    /// `id_token`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// `iss`, RFC 9207
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// `refresh_token`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// `scope`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// `session_state`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
    /// `state`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// `token_type`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// JARM style `response` parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Extra values supplied programmatically. The parser never fills this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<HashMap<String, String>>,
}

impl CallbackParams {
    pub(crate) fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut params = CallbackParams::default();

        for (k, v) in pairs {
            if !CALLBACK_KEYS.contains(&k.as_str()) {
                continue;
            }

            match k.as_str() {
                "access_token" => params.access_token = Some(v),
                "code" => params.code = Some(v),
                "error" => params.error = Some(v),
                "error_description" => params.error_description = Some(v),
                "error_uri" => params.error_uri = Some(v),
                "expires_in" => params.expires_in = Some(v),
                "id_token" => params.id_token = Some(v),
                "iss" => params.iss = Some(v),
                "refresh_token" => params.refresh_token = Some(v),
                "scope" => params.scope = Some(v),
                "session_state" => params.session_state = Some(v),
                "state" => params.state = Some(v),
                "token_type" => params.token_type = Some(v),
                "response" => params.response = Some(v),
                _ => {}
            }
        }

        params
    }
}

/// The shapes [`crate::client::Client::callback_params()`] accepts
#[derive(Debug)]
pub enum CallbackInput<'a> {
    /// A full callback url; parameters are read from the query
    Url(&'a str),
    /// An incoming http request. `GET` reads the url query, `POST` the body.
    Request {
        /// Method of the incoming request
        method: HttpMethod,
        /// Full url of the incoming request
        url: Option<&'a str>,
        /// Body of the incoming request
        body: Option<CallbackBody<'a>>,
    },
    /// Already extracted parameters
    Map(HashMap<String, String>),
}

/// Body variants of an incoming `POST` callback
#[derive(Debug)]
pub enum CallbackBody<'a> {
    /// Raw body bytes, form-url-encoded
    Bytes(&'a [u8]),
    /// Body text, form-url-encoded
    Text(&'a str),
    /// A pre-parsed form
    Form(HashMap<String, String>),
}

/// Checks applied to a plain OAuth 2.0 callback
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct OAuthCallbackChecks<'a> {
    /// The response type the request was made with; presence of the implied
    /// response parameters is enforced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<&'a str>,
    /// The state the request was made with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'a str>,
    /// The PKCE code verifier of the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<&'a str>,
}

/// Checks applied to an OpenID Connect callback
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct OpenIdCallbackChecks<'a> {
    /// The nonce the authorization request was made with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<&'a str>,
    /// Maximum age the End-User authentication may have. Inherits the
    /// client's `default_max_age` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,
    /// The plain OAuth 2.0 checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_checks: Option<OAuthCallbackChecks<'a>>,
}

/// Extra inputs of a callback code exchange
#[derive(Debug, Default, Clone)]
pub struct CallbackExtras {
    /// Additional body parameters of the token request
    pub exchange_body: Option<HashMap<String, String>>,
    /// Claims overlaid onto the client assertion
    pub client_assertion_payload: Option<HashMap<String, Value>>,
}
