use crate::jwks::Jwks;

use super::client_options::ClientOptions;

/// Options of a dynamic client registration
#[derive(Debug, Default, Clone)]
pub struct ClientRegistrationOptions {
    /// Bearer token authorizing the registration request
    pub initial_access_token: Option<String>,
    /// Private keys of the client to be registered. The public half is
    /// exported into the registered metadata when it embeds no `jwks`.
    pub jwks: Option<Jwks>,
    /// Options applied to the resulting client
    pub client_options: ClientOptions,
}
