//! Optional per-request inputs of the token endpoint family of calls.

use std::collections::HashMap;

use serde_json::Value;

/// Extra inputs of [`crate::client::Client::grant_async()`]
#[derive(Debug, Default, Clone)]
pub struct GrantExtras<'a> {
    /// Claims overlaid onto the client assertion
    pub client_assertion_payload: Option<&'a HashMap<String, Value>>,
    /// Authenticate as if posting to this endpoint instead of `token`
    pub endpoint_auth_method: Option<&'a str>,
}

/// Extra inputs of [`crate::client::Client::refresh_async()`]
#[derive(Debug, Default, Clone)]
pub struct RefreshTokenExtras<'a> {
    /// Additional body parameters of the refresh request
    pub exchange_body: Option<HashMap<String, String>>,
    /// Claims overlaid onto the client assertion
    pub client_assertion_payload: Option<&'a HashMap<String, Value>>,
}

/// Extra inputs of [`crate::client::Client::revoke_async()`]
#[derive(Debug, Default, Clone)]
pub struct RevokeExtras<'a> {
    /// Additional body parameters of the revocation request
    pub revocation_body: Option<HashMap<String, String>>,
    /// Claims overlaid onto the client assertion
    pub client_assertion_payload: Option<&'a HashMap<String, Value>>,
}

/// Extra inputs of [`crate::client::Client::introspect_async()`]
#[derive(Debug, Default, Clone)]
pub struct IntrospectionExtras<'a> {
    /// Additional body parameters of the introspection request
    pub introspect_body: Option<HashMap<String, String>>,
    /// Claims overlaid onto the client assertion
    pub client_assertion_payload: Option<&'a HashMap<String, Value>>,
}
