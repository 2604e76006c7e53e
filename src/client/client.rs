use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use josekit::jwk::Jwk;

use crate::helpers::{convert_json_to, now, validate_url};
use crate::http::request_async;
use crate::issuer::Issuer;
use crate::jwks::Jwks;
use crate::types::{
    ClientMetadata, ClientOptions, ClientRegistrationOptions, HttpMethod, HttpRequest, OidcError,
    OidcHttpClient, OidcReturn,
};

/// # Client
/// A relying party configured against one [Issuer]. Construction normalizes
/// the metadata once; afterwards the client is immutable apart from its
/// internal key caches and can serve concurrent requests.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) client_id: String,
    pub(crate) client_secret: Option<String>,
    pub(crate) registration_access_token: Option<String>,
    pub(crate) registration_client_uri: Option<String>,
    pub(crate) client_id_issued_at: Option<i64>,
    pub(crate) client_secret_expires_at: Option<i64>,
    pub(crate) token_endpoint_auth_method: String,
    pub(crate) token_endpoint_auth_signing_alg: Option<String>,
    pub(crate) introspection_endpoint_auth_method: Option<String>,
    pub(crate) introspection_endpoint_auth_signing_alg: Option<String>,
    pub(crate) revocation_endpoint_auth_method: Option<String>,
    pub(crate) revocation_endpoint_auth_signing_alg: Option<String>,
    pub(crate) redirect_uri: Option<String>,
    pub(crate) redirect_uris: Option<Vec<String>>,
    pub(crate) response_type: Option<String>,
    pub(crate) response_types: Vec<String>,
    pub(crate) grant_types: Vec<String>,
    pub(crate) jwks_uri: Option<String>,
    pub(crate) jwks: Option<Jwks>,
    pub(crate) id_token_signed_response_alg: String,
    pub(crate) id_token_encrypted_response_alg: Option<String>,
    pub(crate) id_token_encrypted_response_enc: Option<String>,
    pub(crate) userinfo_signed_response_alg: Option<String>,
    pub(crate) userinfo_encrypted_response_alg: Option<String>,
    pub(crate) userinfo_encrypted_response_enc: Option<String>,
    pub(crate) request_object_signing_alg: Option<String>,
    pub(crate) request_object_encryption_alg: Option<String>,
    pub(crate) request_object_encryption_enc: Option<String>,
    pub(crate) default_max_age: Option<u64>,
    pub(crate) require_auth_time: Option<bool>,
    pub(crate) clock_tolerance: Duration,
    pub(crate) tls_client_certificate_bound_access_tokens: Option<bool>,
    pub(crate) post_logout_redirect_uris: Option<Vec<String>>,
    pub(crate) other_fields: HashMap<String, serde_json::Value>,
    pub(crate) private_jwks: Option<Jwks>,
    pub(crate) issuer: Option<Issuer>,
    pub(crate) client_options: Option<ClientOptions>,
    /// Memo of keys derived from `client_secret`, keyed by algorithm.
    /// Append-only; entries are value equivalent per key.
    pub(crate) derived_keys: Arc<Mutex<HashMap<String, Jwk>>>,
    pub(crate) now: fn() -> i64,
}

impl Client {
    pub(crate) fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            registration_access_token: None,
            registration_client_uri: None,
            client_id_issued_at: None,
            client_secret_expires_at: None,
            token_endpoint_auth_method: "client_secret_basic".to_string(),
            token_endpoint_auth_signing_alg: None,
            introspection_endpoint_auth_method: None,
            introspection_endpoint_auth_signing_alg: None,
            revocation_endpoint_auth_method: None,
            revocation_endpoint_auth_signing_alg: None,
            redirect_uri: None,
            redirect_uris: None,
            response_type: None,
            response_types: vec!["code".to_string()],
            grant_types: vec!["authorization_code".to_string()],
            jwks_uri: None,
            jwks: None,
            id_token_signed_response_alg: "RS256".to_string(),
            id_token_encrypted_response_alg: None,
            id_token_encrypted_response_enc: None,
            userinfo_signed_response_alg: None,
            userinfo_encrypted_response_alg: None,
            userinfo_encrypted_response_enc: None,
            request_object_signing_alg: None,
            request_object_encryption_alg: None,
            request_object_encryption_enc: None,
            default_max_age: None,
            require_auth_time: None,
            clock_tolerance: Duration::ZERO,
            tls_client_certificate_bound_access_tokens: None,
            post_logout_redirect_uris: None,
            other_fields: HashMap::new(),
            private_jwks: None,
            issuer: None,
            client_options: None,
            derived_keys: Arc::new(Mutex::new(HashMap::new())),
            now,
        }
    }

    /// Builds a [Client] out of normalized metadata. Every construction path
    /// ([`Issuer::client()`], [`Client::register_async()`],
    /// [`Client::from_uri_async()`]) funnels through here.
    pub(crate) fn from_internal(
        metadata: ClientMetadata,
        issuer: Option<&Issuer>,
        jwks: Option<Jwks>,
        options: Option<ClientOptions>,
    ) -> OidcReturn<Self> {
        let client_id = match metadata.client_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(OidcError::new_rp_error("client_id is required", None)),
        };

        Self::assert_private_jwks(jwks.as_ref())?;

        let mut client = Self {
            client_id,
            client_secret: metadata.client_secret,
            registration_access_token: metadata.registration_access_token,
            registration_client_uri: metadata.registration_client_uri,
            client_id_issued_at: metadata.client_id_issued_at,
            client_secret_expires_at: metadata.client_secret_expires_at,
            jwks_uri: metadata.jwks_uri,
            jwks: metadata.jwks,
            id_token_encrypted_response_alg: metadata.id_token_encrypted_response_alg,
            id_token_encrypted_response_enc: metadata.id_token_encrypted_response_enc,
            userinfo_signed_response_alg: metadata.userinfo_signed_response_alg,
            userinfo_encrypted_response_alg: metadata.userinfo_encrypted_response_alg,
            userinfo_encrypted_response_enc: metadata.userinfo_encrypted_response_enc,
            request_object_signing_alg: metadata.request_object_signing_alg,
            request_object_encryption_alg: metadata.request_object_encryption_alg,
            request_object_encryption_enc: metadata.request_object_encryption_enc,
            default_max_age: metadata.default_max_age,
            require_auth_time: metadata.require_auth_time,
            tls_client_certificate_bound_access_tokens: metadata
                .tls_client_certificate_bound_access_tokens,
            post_logout_redirect_uris: metadata.post_logout_redirect_uris,
            other_fields: metadata.other_fields,
            client_options: options,
            private_jwks: jwks,
            ..Client::default()
        };

        if let Some(seconds) = metadata.clock_tolerance {
            client.clock_tolerance = Duration::from_secs(seconds);
        }

        if client.jwks_uri.is_some() && client.jwks.is_some() {
            client.jwks = None;
        }

        if let Some(alg) = metadata.id_token_signed_response_alg {
            client.id_token_signed_response_alg = alg;
        }

        if metadata.response_type.is_some() && metadata.response_types.is_some() {
            return Err(OidcError::new_rp_error(
                "provide a response_type or response_types, not both",
                None,
            ));
        }

        if let Some(response_type) = metadata.response_type {
            client.response_types = vec![response_type.clone()];
            client.response_type = Some(response_type);
        }

        if let Some(response_types) = metadata.response_types {
            client.response_types = response_types;
        }

        if metadata.redirect_uri.is_some() && metadata.redirect_uris.is_some() {
            return Err(OidcError::new_rp_error(
                "provide a redirect_uri or redirect_uris, not both",
                None,
            ));
        }

        if let Some(redirect_uri) = metadata.redirect_uri {
            client.redirect_uris = Some(vec![redirect_uri.clone()]);
            client.redirect_uri = Some(redirect_uri);
        }

        if let Some(redirect_uris) = metadata.redirect_uris {
            client.redirect_uris = Some(redirect_uris);
        }

        if let Some(grant_types) = metadata.grant_types {
            client.grant_types = grant_types;
        }

        if let Some(method) = metadata.token_endpoint_auth_method {
            client.token_endpoint_auth_method = method;
        } else if let Some(issuer) = issuer {
            // loosely configured clients of servers that do not support
            // client_secret_basic silently fall back to client_secret_post
            if let Some(supported) = &issuer.token_endpoint_auth_methods_supported {
                if !supported.contains(&client.token_endpoint_auth_method)
                    && supported.contains(&"client_secret_post".to_string())
                {
                    client.token_endpoint_auth_method = "client_secret_post".to_string();
                }
            }
        }

        client.token_endpoint_auth_signing_alg = metadata.token_endpoint_auth_signing_alg;

        client.introspection_endpoint_auth_method = metadata
            .introspection_endpoint_auth_method
            .or_else(|| Some(client.token_endpoint_auth_method.clone()));

        client.introspection_endpoint_auth_signing_alg = metadata
            .introspection_endpoint_auth_signing_alg
            .or_else(|| client.token_endpoint_auth_signing_alg.clone());

        client.revocation_endpoint_auth_method = metadata
            .revocation_endpoint_auth_method
            .or_else(|| Some(client.token_endpoint_auth_method.clone()));

        client.revocation_endpoint_auth_signing_alg = metadata
            .revocation_endpoint_auth_signing_alg
            .or_else(|| client.token_endpoint_auth_signing_alg.clone());

        if let Some(issuer) = issuer {
            Self::assert_signing_alg_values_support(
                Some(&client.token_endpoint_auth_method),
                client.token_endpoint_auth_signing_alg.as_ref(),
                issuer
                    .token_endpoint_auth_signing_alg_values_supported
                    .as_ref(),
                "token",
            )?;

            Self::assert_signing_alg_values_support(
                client.introspection_endpoint_auth_method.as_deref(),
                client.introspection_endpoint_auth_signing_alg.as_ref(),
                issuer
                    .introspection_endpoint_auth_signing_alg_values_supported
                    .as_ref(),
                "introspection",
            )?;

            Self::assert_signing_alg_values_support(
                client.revocation_endpoint_auth_method.as_deref(),
                client.revocation_endpoint_auth_signing_alg.as_ref(),
                issuer
                    .revocation_endpoint_auth_signing_alg_values_supported
                    .as_ref(),
                "revocation",
            )?;

            client.issuer = Some(issuer.clone());
        }

        Ok(client)
    }

    fn assert_signing_alg_values_support(
        auth_method: Option<&str>,
        configured_alg: Option<&String>,
        issuer_supported_algs: Option<&Vec<String>>,
        endpoint: &str,
    ) -> OidcReturn<()> {
        if let Some(method) = auth_method {
            if method.ends_with("_jwt") && configured_alg.is_none() && issuer_supported_algs.is_none()
            {
                return Err(OidcError::new_rp_error(
                    &format!(
                        "{0}_endpoint_auth_signing_alg_values_supported must be configured on the issuer if {0}_endpoint_auth_signing_alg is not defined on a client",
                        endpoint
                    ),
                    None,
                ));
            }
        }
        Ok(())
    }

    /// Client JWKS must hold only private, asymmetric keys
    pub(crate) fn assert_private_jwks(jwks: Option<&Jwks>) -> OidcReturn<()> {
        if let Some(jwks) = jwks {
            if !jwks.is_only_private_keys() || jwks.has_oct_keys() {
                return Err(OidcError::new_rp_error(
                    "jwks must only contain private keys",
                    None,
                ));
            }
        }
        Ok(())
    }
}

/// Dynamic Client Registration
impl Client {
    /// # Dynamic Client Registration
    /// Registers `client_metadata` at the issuer's `registration_endpoint`
    /// and returns the [Client] the server created.
    ///
    /// When `register_options` carries a private JWKS and the metadata embeds
    /// neither `jwks` nor `jwks_uri`, the public half of that JWKS is sent.
    pub async fn register_async<T>(
        http_client: &T,
        issuer: &Issuer,
        mut client_metadata: ClientMetadata,
        register_options: Option<ClientRegistrationOptions>,
    ) -> OidcReturn<Self>
    where
        T: OidcHttpClient,
    {
        let registration_endpoint =
            issuer
                .registration_endpoint
                .as_ref()
                .ok_or(OidcError::new_rp_error(
                    "registration_endpoint must be configured on the issuer",
                    None,
                ))?;

        let mut initial_access_token = None;
        let mut jwks = None;
        let mut client_options = None;

        if let Some(options) = register_options {
            initial_access_token = options.initial_access_token;
            client_options = Some(options.client_options);

            if let Some(private_jwks) = options.jwks {
                if client_metadata.jwks_uri.is_none() && client_metadata.jwks.is_none() {
                    client_metadata.jwks = Some(private_jwks.get_public_jwks());
                }
                jwks = Some(private_jwks);
            }
        }

        Self::assert_private_jwks(jwks.as_ref())?;

        let url = validate_url(registration_endpoint)?;

        let body = serde_json::to_string(&client_metadata).map_err(|_| {
            OidcError::new_rp_error("client metadata is an invalid json format", None)
        })?;

        let mut req = HttpRequest::new(url)
            .method(HttpMethod::POST)
            .header("accept", "application/json")
            .json(body)
            .expect_status_code(201)
            .expect_bearer(true);

        if let Some(token) = initial_access_token {
            req = req.header("authorization", format!("Bearer {}", token));
        }

        let res = request_async(req, http_client).await?;

        let registered = convert_json_to::<ClientMetadata>(res.body.as_deref().unwrap_or_default())
            .map_err(|_| {
                OidcError::new_op_error(
                    "invalid client metadata".to_string(),
                    Some("error while deserializing".to_string()),
                    None,
                    Some(res),
                )
            })?;

        Self::from_internal(registered, Some(issuer), jwks, client_options)
    }

    /// # Client read
    /// Fetches the current metadata of a registered client from its
    /// `registration_client_uri` and returns a [Client] built from it.
    pub async fn from_uri_async<T>(
        http_client: &T,
        registration_client_uri: &str,
        registration_access_token: Option<String>,
        jwks: Option<Jwks>,
        client_options: Option<ClientOptions>,
        issuer: Option<&Issuer>,
    ) -> OidcReturn<Self>
    where
        T: OidcHttpClient,
    {
        Self::assert_private_jwks(jwks.as_ref())?;

        let url = validate_url(registration_client_uri)?;

        let mut req = HttpRequest::new(url)
            .header("accept", "application/json")
            .expect_bearer(true);

        if let Some(token) = registration_access_token {
            req = req.header("authorization", format!("Bearer {}", token));
        }

        let res = request_async(req, http_client).await?;

        let metadata = convert_json_to::<ClientMetadata>(res.body.as_deref().unwrap_or_default())
            .map_err(|_| {
                OidcError::new_op_error(
                    "invalid client metadata".to_string(),
                    Some("error while deserializing".to_string()),
                    None,
                    Some(res),
                )
            })?;

        Self::from_internal(metadata, issuer, jwks, client_options)
    }
}
