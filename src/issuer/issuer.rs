use std::collections::HashMap;
use std::sync::RwLock;

use josekit::jwk::Jwk;
use lazy_static::lazy_static;

use crate::client::Client;
use crate::helpers::{convert_json_to, validate_url};
use crate::http::request_async;
use crate::jwks::Jwks;
use crate::types::{
    ClientMetadata, ClientOptions, HttpRequest, IssuerMetadata, MtlsEndpoints, OidcError,
    OidcHttpClient, OidcReturn, QueryKeyStore,
};

use super::keystore::KeyStore;

lazy_static! {
    /// Issuers seen by this process, keyed by their `iss`. Used to resolve
    /// signing keys of cross-issuer claim sources without rediscovering them.
    static ref ISSUER_REGISTRY: RwLock<HashMap<String, Issuer>> = RwLock::new(HashMap::new());
}

/// # Issuer
/// The relying party's view of one authorization server: its identifier, its
/// endpoints, what it advertises as supported, and its signing keys.
#[derive(Debug, Clone)]
pub struct Issuer {
    pub(crate) issuer: String,
    pub(crate) authorization_endpoint: Option<String>,
    pub(crate) token_endpoint: Option<String>,
    pub(crate) jwks_uri: Option<String>,
    pub(crate) userinfo_endpoint: Option<String>,
    pub(crate) end_session_endpoint: Option<String>,
    pub(crate) registration_endpoint: Option<String>,
    pub(crate) introspection_endpoint: Option<String>,
    pub(crate) revocation_endpoint: Option<String>,
    pub(crate) device_authorization_endpoint: Option<String>,
    pub(crate) token_endpoint_auth_methods_supported: Option<Vec<String>>,
    pub(crate) token_endpoint_auth_signing_alg_values_supported: Option<Vec<String>>,
    pub(crate) introspection_endpoint_auth_methods_supported: Option<Vec<String>>,
    pub(crate) introspection_endpoint_auth_signing_alg_values_supported: Option<Vec<String>>,
    pub(crate) revocation_endpoint_auth_methods_supported: Option<Vec<String>>,
    pub(crate) revocation_endpoint_auth_signing_alg_values_supported: Option<Vec<String>>,
    pub(crate) authorization_response_iss_parameter_supported: Option<bool>,
    pub(crate) mtls_endpoint_aliases: Option<MtlsEndpoints>,
    pub(crate) other_fields: HashMap<String, serde_json::Value>,
    keystore: KeyStore,
}

impl Issuer {
    /// # Instantiate an Issuer from [IssuerMetadata]
    ///
    /// ```
    /// # use openid_rp::{Issuer, IssuerMetadata};
    /// let metadata = IssuerMetadata {
    ///     issuer: "https://auth.example.com".to_string(),
    ///     authorization_endpoint: Some("https://auth.example.com/authorize".to_string()),
    ///     token_endpoint: Some("https://auth.example.com/token".to_string()),
    ///     jwks_uri: Some("https://auth.example.com/certs".to_string()),
    ///     ..Default::default()
    /// };
    ///
    /// let issuer = Issuer::new(metadata);
    /// ```
    ///
    /// Introspection and revocation endpoint auth methods and algorithms
    /// default to the token endpoint's values when not given.
    pub fn new(metadata: IssuerMetadata) -> Self {
        let introspection_endpoint_auth_methods_supported = metadata
            .introspection_endpoint_auth_methods_supported
            .or_else(|| metadata.token_endpoint_auth_methods_supported.clone());

        let introspection_endpoint_auth_signing_alg_values_supported = metadata
            .introspection_endpoint_auth_signing_alg_values_supported
            .or_else(|| {
                metadata
                    .token_endpoint_auth_signing_alg_values_supported
                    .clone()
            });

        let revocation_endpoint_auth_methods_supported = metadata
            .revocation_endpoint_auth_methods_supported
            .or_else(|| metadata.token_endpoint_auth_methods_supported.clone());

        let revocation_endpoint_auth_signing_alg_values_supported = metadata
            .revocation_endpoint_auth_signing_alg_values_supported
            .or_else(|| {
                metadata
                    .token_endpoint_auth_signing_alg_values_supported
                    .clone()
            });

        let keystore = KeyStore::new(metadata.jwks_uri.clone());

        Self {
            issuer: metadata.issuer,
            authorization_endpoint: metadata.authorization_endpoint,
            token_endpoint: metadata.token_endpoint,
            jwks_uri: metadata.jwks_uri,
            userinfo_endpoint: metadata.userinfo_endpoint,
            end_session_endpoint: metadata.end_session_endpoint,
            registration_endpoint: metadata.registration_endpoint,
            introspection_endpoint: metadata.introspection_endpoint,
            revocation_endpoint: metadata.revocation_endpoint,
            device_authorization_endpoint: metadata.device_authorization_endpoint,
            token_endpoint_auth_methods_supported: metadata.token_endpoint_auth_methods_supported,
            token_endpoint_auth_signing_alg_values_supported: metadata
                .token_endpoint_auth_signing_alg_values_supported,
            introspection_endpoint_auth_methods_supported,
            introspection_endpoint_auth_signing_alg_values_supported,
            revocation_endpoint_auth_methods_supported,
            revocation_endpoint_auth_signing_alg_values_supported,
            authorization_response_iss_parameter_supported: metadata
                .authorization_response_iss_parameter_supported,
            mtls_endpoint_aliases: metadata.mtls_endpoint_aliases,
            other_fields: metadata.other_fields,
            keystore,
        }
    }

    /// The issuer identifier
    pub fn get_issuer(&self) -> &str {
        &self.issuer
    }

    /// # Create a [Client] of this issuer
    ///
    /// - `metadata` - the registered [ClientMetadata], `client_id` required
    /// - `jwks` - private keys of the client, used for `private_key_jwt`
    ///   authentication, request object signing and response decryption
    /// - `options` - [ClientOptions]
    pub fn client(
        &self,
        metadata: ClientMetadata,
        jwks: Option<Jwks>,
        options: Option<ClientOptions>,
    ) -> OidcReturn<Client> {
        Client::from_internal(metadata, Some(self), jwks, options)
    }

    /// # Discover an issuer
    ///
    /// Resolves `issuer` via its `/.well-known/openid-configuration`
    /// document and caches the result in the process wide issuer registry.
    ///
    /// Urls already pointing at a `.well-known` document are used as given.
    pub async fn discover_async<T>(issuer: &str, http_client: &T) -> OidcReturn<Issuer>
    where
        T: OidcHttpClient,
    {
        let mut url = validate_url(issuer)?;

        if !url.path().contains("/.well-known/") {
            let path = format!(
                "{}/.well-known/openid-configuration",
                url.path().trim_end_matches('/')
            );
            url.set_path(&path);
        }

        let req = HttpRequest::new(url).header("accept", "application/json");

        let res = request_async(req, http_client).await?;

        let body = res.body.as_deref().unwrap_or_default();

        let metadata = convert_json_to::<IssuerMetadata>(body).map_err(|_| {
            OidcError::new_op_error(
                "invalid_issuer_metadata".to_string(),
                None,
                None,
                Some(res.clone()),
            )
        })?;

        if metadata.issuer.is_empty() {
            return Err(OidcError::new_rp_error(
                "issuer missing in discovered metadata",
                Some(res),
            ));
        }

        let issuer = Issuer::new(metadata);

        Self::store_in_registry(&issuer);

        Ok(issuer)
    }

    /// Looks an issuer up in the process wide registry
    pub(crate) fn from_registry(iss: &str) -> Option<Issuer> {
        ISSUER_REGISTRY
            .read()
            .ok()
            .and_then(|registry| registry.get(iss).cloned())
    }

    /// Stores the issuer in the process wide registry, replacing an earlier
    /// entry. The registry only ever grows, replacement is value equivalent.
    pub(crate) fn store_in_registry(issuer: &Issuer) {
        if let Ok(mut registry) = ISSUER_REGISTRY.write() {
            registry.insert(issuer.issuer.clone(), issuer.clone());
        }
    }

    /// Returns the keys of this issuer's JWKS matching `query`, best match
    /// first. When a requested `kid` is absent from the cached set the JWKS
    /// is refetched once.
    pub(crate) async fn query_keystore_async<T>(
        &mut self,
        query: QueryKeyStore,
        reload: bool,
        http_client: &T,
    ) -> OidcReturn<Vec<Jwk>>
    where
        T: OidcHttpClient,
    {
        let mut reload = reload;

        loop {
            let jwks = self.keystore.get_keystore_async(reload, http_client).await?;

            let keys: Vec<Jwk> = jwks
                .get(
                    query.alg.as_deref(),
                    query.key_use.as_deref(),
                    query.key_id.as_deref(),
                    query.key_type.as_deref(),
                )
                .into_iter()
                .cloned()
                .collect();

            if !keys.is_empty() {
                return Ok(keys);
            }

            if !reload {
                if let Some(kid) = &query.key_id {
                    if self.keystore.allow_kid_refresh(kid) {
                        reload = true;
                        continue;
                    }
                }
            }

            let description = match &query.key_id {
                Some(kid) => {
                    format!("no valid key found in issuer's jwks_uri for kid {}", kid)
                }
                None => "no valid key found in issuer's jwks_uri".to_string(),
            };

            return Err(OidcError::new_rp_error(&description, None));
        }
    }
}
