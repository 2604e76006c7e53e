use std::collections::HashMap;

use crate::tokenset::TokenSet;

/// The `id_token_hint` of an end session request, either a raw JWT or a
/// [TokenSet] whose `id_token` is used.
#[derive(Debug, Clone)]
pub enum IdTokenHint {
    /// A raw ID Token
    Jwt(String),
    /// A token set carrying the ID Token
    Tokens(TokenSet),
}

/// # EndSessionParameters
/// Parameters of an RP initiated logout url
#[derive(Debug, Default, Clone)]
pub struct EndSessionParameters {
    /// `client_id`, defaults to the client's own
    pub client_id: Option<String>,
    /// Where the server may redirect after logout. Defaults to the client's
    /// single configured `post_logout_redirect_uri`.
    pub post_logout_redirect_uri: Option<String>,
    /// The ID Token the logout request is for
    pub id_token_hint: Option<IdTokenHint>,
    /// Hint of the user being logged out
    pub logout_hint: Option<String>,
    /// Opaque state echoed back after logout
    pub state: Option<String>,
    /// Any other parameter to send
    pub other: Option<HashMap<String, String>>,
}
