use josekit::{jws::JwsHeader, jwt::JwtPayload};

/// A JWT split into its parts without any validation applied
#[derive(Debug)]
pub struct DecodedToken {
    /// Jose header
    pub header: JwsHeader,
    /// Claims set
    pub payload: JwtPayload,
    /// Base64url encoded signature segment
    pub signature: String,
}
