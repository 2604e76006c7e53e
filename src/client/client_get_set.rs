//! Read accessors of the client's normalized metadata.

use std::time::Duration;

use crate::issuer::Issuer;

use super::Client;

impl Client {
    /// The client identifier
    pub fn get_client_id(&self) -> &str {
        &self.client_id
    }

    /// The client secret
    pub fn get_client_secret(&self) -> Option<&String> {
        self.client_secret.as_ref()
    }

    /// The effective token endpoint authentication method
    pub fn get_token_endpoint_auth_method(&self) -> &str {
        &self.token_endpoint_auth_method
    }

    /// The effective introspection endpoint authentication method
    pub fn get_introspection_endpoint_auth_method(&self) -> Option<&String> {
        self.introspection_endpoint_auth_method.as_ref()
    }

    /// The effective revocation endpoint authentication method
    pub fn get_revocation_endpoint_auth_method(&self) -> Option<&String> {
        self.revocation_endpoint_auth_method.as_ref()
    }

    /// The registered redirect uris
    pub fn get_redirect_uris(&self) -> Option<&Vec<String>> {
        self.redirect_uris.as_ref()
    }

    /// The registered response types
    pub fn get_response_types(&self) -> &Vec<String> {
        &self.response_types
    }

    /// The registered grant types
    pub fn get_grant_types(&self) -> &Vec<String> {
        &self.grant_types
    }

    /// The JWS algorithm ID Tokens must be signed with
    pub fn get_id_token_signed_response_alg(&self) -> &str {
        &self.id_token_signed_response_alg
    }

    /// The default maximum authentication age
    pub fn get_default_max_age(&self) -> Option<u64> {
        self.default_max_age
    }

    /// Allowed clock skew when validating time based claims
    pub fn get_clock_tolerance(&self) -> Duration {
        self.clock_tolerance
    }

    /// The issuer this client is configured against
    pub fn get_issuer(&self) -> Option<&Issuer> {
        self.issuer.as_ref()
    }

    /// Registry defined metadata without a dedicated field
    pub fn get_other_fields(&self) -> &std::collections::HashMap<String, serde_json::Value> {
        &self.other_fields
    }

    /// Overrides the clock skew allowed when validating time based claims
    pub fn set_clock_tolerance(&mut self, tolerance: Duration) {
        self.clock_tolerance = tolerance;
    }

    #[cfg(test)]
    pub(crate) fn set_now(&mut self, now: fn() -> i64) {
        self.now = now;
    }
}
