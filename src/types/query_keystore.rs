/// A key lookup against an issuer's JWKS, typically derived from a JOSE
/// header.
#[derive(Debug, Default, Clone)]
pub struct QueryKeyStore {
    /// `kid` the key must carry
    pub key_id: Option<String>,
    /// Key type implied by the algorithm
    pub key_type: Option<String>,
    /// Algorithm the key must support
    pub alg: Option<String>,
    /// `use` the key must be intended for
    pub key_use: Option<String>,
}
