use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// # AuthorizationParameters
/// Parameters of an authorization request, as accepted by
/// [`crate::client::Client::authorization_url()`] and the related builders.
#[derive(Debug, Default, Clone)]
pub struct AuthorizationParameters {
    /// Requested Authentication Context Class Reference values
    pub acr_values: Option<Vec<String>>,
    /// Audience of the requested access token
    pub audience: Option<Vec<String>>,
    /// `claims` request parameter, JSON encoded when serialized
    pub claims: Option<ClaimParam>,
    /// Preferred languages for returned claims
    pub claims_locales: Option<Vec<String>>,
    /// `client_id`, defaults to the client's own
    pub client_id: Option<String>,
    /// PKCE code challenge method
    pub code_challenge_method: Option<String>,
    /// PKCE code challenge
    pub code_challenge: Option<String>,
    /// `display` parameter
    pub display: Option<String>,
    /// ID Token hint for the authorization server
    pub id_token_hint: Option<String>,
    /// Login hint for the authorization server
    pub login_hint: Option<String>,
    /// Maximum authentication age in seconds
    pub max_age: Option<String>,
    /// `nonce`, required whenever the response type includes `id_token`
    pub nonce: Option<String>,
    /// `prompt` values
    pub prompt: Option<Vec<String>>,
    /// Redirect uri the response is sent to
    pub redirect_uri: Option<String>,
    /// `registration` parameter
    pub registration: Option<String>,
    /// Request object by reference
    pub request_uri: Option<String>,
    /// Request object by value
    pub request: Option<String>,
    /// Target resources, RFC 8707. Serialized as repeated `resource`
    /// parameters, one per entry.
    pub resource: Option<Vec<String>>,
    /// `response_mode` parameter
    pub response_mode: Option<String>,
    /// Response type, defaults to the client's single configured one
    pub response_type: Option<Vec<String>>,
    /// Requested scopes, defaults to `openid`
    pub scope: Option<Vec<String>>,
    /// Opaque `state` value
    pub state: Option<String>,
    /// Preferred languages for the UI
    pub ui_locales: Option<Vec<String>>,
    /// Any other parameter to send
    pub other: Option<HashMap<String, String>>,
}

impl From<AuthorizationParameters> for Vec<(String, String)> {
    fn from(val: AuthorizationParameters) -> Self {
        let mut pairs = vec![];

        if let Some(other) = val.other {
            let mut sorted: Vec<(String, String)> = other.into_iter().collect();
            sorted.sort();
            pairs.extend(sorted);
        }

        push_pair(&mut pairs, "client_id", val.client_id);
        push_joined(&mut pairs, "acr_values", val.acr_values);
        push_joined(&mut pairs, "audience", val.audience);

        if let Some(claims) = &val.claims {
            if let Ok(json) = serde_json::to_string(claims) {
                pairs.push(("claims".to_string(), json));
            }
        }

        push_joined(&mut pairs, "claims_locales", val.claims_locales);
        push_pair(&mut pairs, "code_challenge_method", val.code_challenge_method);
        push_pair(&mut pairs, "code_challenge", val.code_challenge);
        push_pair(&mut pairs, "display", val.display);
        push_pair(&mut pairs, "id_token_hint", val.id_token_hint);
        push_pair(&mut pairs, "login_hint", val.login_hint);
        push_pair(&mut pairs, "max_age", val.max_age);
        push_pair(&mut pairs, "nonce", val.nonce);
        push_joined(&mut pairs, "prompt", val.prompt);
        push_pair(&mut pairs, "redirect_uri", val.redirect_uri);
        push_pair(&mut pairs, "registration", val.registration);
        push_pair(&mut pairs, "request_uri", val.request_uri);
        push_pair(&mut pairs, "request", val.request);

        // resource is a multi-valued parameter, one pair per entry
        if let Some(resources) = val.resource {
            for resource in resources {
                pairs.push(("resource".to_string(), resource));
            }
        }

        push_pair(&mut pairs, "response_mode", val.response_mode);
        push_joined(&mut pairs, "response_type", val.response_type);
        push_joined(&mut pairs, "scope", val.scope);
        push_pair(&mut pairs, "state", val.state);
        push_joined(&mut pairs, "ui_locales", val.ui_locales);

        pairs
    }
}

fn push_pair(pairs: &mut Vec<(String, String)>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        pairs.push((key.to_string(), v));
    }
}

fn push_joined(pairs: &mut Vec<(String, String)>, key: &str, values: Option<Vec<String>>) {
    if let Some(values) = values {
        if !values.is_empty() {
            pairs.push((key.to_string(), values.join(" ")));
        }
    }
}

/// Value of a single member inside the `claims` request parameter
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ClaimParamValue {
    /// The claim is requested with default handling (`null`)
    Null,
    /// The claim is requested with qualifiers
    ClaimParamMember(ClaimsParameterMember),
}

/// The `claims` request parameter
/// [Claims Parameter](https://openid.net/specs/openid-connect-core-1_0.html#ClaimsParameter)
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct ClaimParam {
    /// Claims requested for the ID Token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<HashMap<String, ClaimParamValue>>,
    /// Claims requested from the userinfo endpoint
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub userinfo: Option<HashMap<String, ClaimParamValue>>,
}

/// Qualifiers of a requested claim
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct ClaimsParameterMember {
    /// Whether the claim is essential
    #[serde(skip_serializing_if = "Option::is_none")]
    pub essential: Option<bool>,
    /// The value the claim must have
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// The set of values the claim may have
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    /// Other qualifier members
    #[serde(flatten)]
    pub other: Option<HashMap<String, Value>>,
}
