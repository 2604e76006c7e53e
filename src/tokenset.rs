use std::{cmp::max, collections::HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::helpers::now;

/// Fields used to build a [TokenSet]
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TokenSetParams {
    /// `access_token`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// `token_type`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// `id_token`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// `refresh_token`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// `expires_in` - access token lifetime in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// `expires_at` - access token expiry as seconds since the epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// `session_state`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
    /// `scope`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Any other field the token endpoint returned
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub other: Option<HashMap<String, Value>>,
}

/// # TokenSet
/// Whatever the token endpoint (or the authorization callback) returned.
/// Implementation defined fields are kept in `other`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", flatten)]
    other: Option<HashMap<String, Value>>,
    #[serde(skip_serializing, skip_deserializing, default = "default_now")]
    pub(crate) now: fn() -> i64,
}

fn default_now() -> fn() -> i64 {
    now
}

impl Default for TokenSet {
    fn default() -> Self {
        Self::new(TokenSetParams::default())
    }
}

impl TokenSet {
    /// Builds a [TokenSet]. A missing `expires_at` is derived from
    /// `expires_in`.
    pub fn new(params: TokenSetParams) -> Self {
        let mut token_set = Self {
            access_token: params.access_token,
            token_type: params.token_type,
            id_token: params.id_token,
            refresh_token: params.refresh_token,
            expires_in: params.expires_in,
            expires_at: params.expires_at,
            session_state: params.session_state,
            scope: params.scope,
            other: params.other,
            now,
        };

        if token_set.expires_at.is_none() {
            if let Some(expires_in) = token_set.expires_in {
                token_set.expires_at = Some((token_set.now)().wrapping_add(expires_in));
            }
        }

        if token_set.expires_in.is_some_and(|e| e < 0) {
            token_set.expires_in = Some(0);
        }

        token_set
    }

    /// Whether the access token has expired
    pub fn expired(&self) -> bool {
        self.remaining_lifetime().is_some_and(|e| e == 0)
    }

    /// Decodes and returns the ID Token claims. No validation is performed.
    pub fn claims(&self) -> Option<HashMap<String, Value>> {
        let id_token = self.id_token.as_ref()?;
        let payload = id_token.split('.').nth(1)?;

        base64_url::decode(payload)
            .ok()
            .and_then(|decoded| serde_json::from_slice::<HashMap<String, Value>>(&decoded).ok())
    }

    /// The access token
    pub fn get_access_token(&self) -> Option<String> {
        self.access_token.clone()
    }

    /// The access token type
    pub fn get_token_type(&self) -> Option<String> {
        self.token_type.clone()
    }

    /// The raw ID Token
    pub fn get_id_token(&self) -> Option<String> {
        self.id_token.clone()
    }

    /// The refresh token
    pub fn get_refresh_token(&self) -> Option<String> {
        self.refresh_token.clone()
    }

    /// Access token lifetime as returned by the server
    pub fn get_expires_in(&self) -> Option<i64> {
        self.expires_in
    }

    /// Access token expiry as seconds since the epoch
    pub fn get_expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    /// The `session_state` value
    pub fn get_session_state(&self) -> Option<String> {
        self.session_state.clone()
    }

    /// The granted scope
    pub fn get_scope(&self) -> Option<String> {
        self.scope.clone()
    }

    /// The fields not covered by a dedicated accessor
    pub fn get_other(&self) -> Option<HashMap<String, Value>> {
        self.other.clone()
    }

    fn remaining_lifetime(&self) -> Option<i64> {
        self.expires_at
            .map(|e| max(e.wrapping_sub((self.now)()), 0))
    }

    pub(crate) fn set_id_token(&mut self, token: Option<String>) {
        self.id_token = token;
    }

    pub(crate) fn set_session_state(&mut self, session_state: Option<String>) {
        self.session_state = session_state;
    }
}
