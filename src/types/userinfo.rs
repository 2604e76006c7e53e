use std::collections::HashMap;

use crate::tokenset::TokenSet;

use super::http_client::HttpMethod;

/// How the access token travels to the userinfo endpoint
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum UserinfoVia {
    /// `Authorization` header, the default
    #[default]
    Header,
    /// `access_token` query parameter. GET only.
    Query,
    /// `access_token` form body field. POST only.
    Body,
}

/// Options of a userinfo request
#[derive(Debug, Default)]
pub struct UserinfoOptions {
    /// GET or POST
    pub method: HttpMethod,
    /// Access token transport
    pub via: UserinfoVia,
    /// Additional parameters sent along
    pub params: Option<HashMap<String, String>>,
}

/// The token input of a userinfo request. The `sub` cross check against the
/// ID Token only runs when a full [TokenSet] is supplied.
#[derive(Debug)]
pub enum UserinfoToken<'a> {
    /// A token set; its `access_token` is used and its ID Token `sub` is
    /// cross checked against the response
    TokenSet(&'a TokenSet),
    /// A bare access token
    AccessToken(&'a str),
}
