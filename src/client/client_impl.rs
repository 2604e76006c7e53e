//! The client's protocol operations: authorization url construction, the
//! callback state machines, grants, userinfo, introspection, revocation,
//! device authorization and request objects.

use std::collections::{HashMap, HashSet};

use josekit::jwe::JweHeader;
use josekit::jws::JwsHeader;
use josekit::{jwe, jws};
use serde_json::{json, Value};
use url::{form_urlencoded, Url};

use crate::helpers::{
    convert_json_to, form_url_encoded_to_string_map, generate_random, get_serde_value_as_string,
};
use crate::http::request_async;
use crate::jwks::CustomJwk;
use crate::tokenset::{TokenSet, TokenSetParams};
use crate::types::{
    AuthorizationParameters, CallbackBody, CallbackExtras, CallbackInput, CallbackParams,
    DeviceAuthorizationExtras, DeviceAuthorizationParams, DeviceAuthorizationResponse,
    EndSessionParameters, GrantExtras, HttpMethod, HttpRequest, IdTokenHint, IntrospectionExtras,
    OAuthCallbackChecks, OidcError, OidcHttpClient, OidcReturn, OpenIdCallbackChecks,
    QueryKeyStore, RefreshTokenExtras, RevokeExtras, UserinfoOptions, UserinfoToken, UserinfoVia,
};

use super::helpers::AuthPost;
use super::{Client, DeviceFlowHandle};

impl Client {
    /// # Authorization Url
    /// Builds the authorization request url. Query parameters already
    /// present on the discovered `authorization_endpoint` are preserved.
    ///
    /// ### *Example:*
    /// ```
    /// # use openid_rp::{Issuer, IssuerMetadata, ClientMetadata, AuthorizationParameters};
    /// let issuer = Issuer::new(IssuerMetadata {
    ///     issuer: "https://auth.example.com".to_string(),
    ///     authorization_endpoint: Some("https://auth.example.com/auth".to_string()),
    ///     ..Default::default()
    /// });
    ///
    /// let client = issuer
    ///     .client(
    ///         ClientMetadata {
    ///             client_id: Some("identifier".to_string()),
    ///             ..Default::default()
    ///         },
    ///         None,
    ///         None,
    ///     )
    ///     .unwrap();
    ///
    /// let url = client.authorization_url(Default::default()).unwrap();
    /// ```
    pub fn authorization_url(&self, parameters: AuthorizationParameters) -> OidcReturn<Url> {
        let mut endpoint = self.get_auth_endpoint()?;

        let pairs = self.resolved_auth_request_pairs(parameters)?;

        let existing: Vec<(String, String)> = endpoint
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let overridden: HashSet<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();

        let mut query = form_urlencoded::Serializer::new(String::new());
        let mut any = false;

        for (k, v) in existing
            .iter()
            .filter(|(k, _)| !overridden.contains(k.as_str()))
        {
            query.append_pair(k, v);
            any = true;
        }

        for (k, v) in &pairs {
            query.append_pair(k, v);
            any = true;
        }

        let finished_query = query.finish();
        endpoint.set_query(if any { Some(&finished_query) } else { None });

        Ok(endpoint)
    }

    /// # Authorization Post
    /// Renders the authorization request as a self submitting HTML form.
    pub fn authorization_post(&self, parameters: AuthorizationParameters) -> OidcReturn<String> {
        let endpoint = self.get_auth_endpoint()?;

        let mut pairs: Vec<(String, String)> = endpoint
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        pairs.extend(self.resolved_auth_request_pairs(parameters)?);

        let mut action = endpoint.clone();
        action.set_query(None);

        let mut html = r#"<!DOCTYPE html>
<head>
<title>Requesting Authorization</title>
</head>
<body onload="javascript:document.forms[0].submit()">
<form method="post" action=""#
            .to_string()
            + action.as_ref()
            + "\">\n";

        for (name, value) in pairs {
            html += &format!(
                "<input type=\"hidden\" name=\"{}\" value=\"{}\"/>\n",
                name, value
            );
        }

        html += "</form>\n</body>\n</html>";

        Ok(html)
    }

    /// Applies the client defaults and enforces the cross parameter rules of
    /// an authorization request.
    fn resolved_auth_request_pairs(
        &self,
        parameters: AuthorizationParameters,
    ) -> OidcReturn<Vec<(String, String)>> {
        let resolved = self.authorization_params(parameters);

        let implicit_or_hybrid = resolved
            .response_type
            .as_ref()
            .is_some_and(|rt| rt.iter().any(|r| r.split(' ').any(|p| p == "id_token")));

        if implicit_or_hybrid && resolved.nonce.is_none() {
            return Err(OidcError::new_rp_error(
                "nonce MUST be provided for implicit and hybrid flows",
                None,
            ));
        }

        Ok(resolved.into())
    }

    /// # End Session Url
    /// Builds an RP initiated logout url.
    pub fn end_session_url(&self, parameters: EndSessionParameters) -> OidcReturn<Url> {
        let issuer = self
            .issuer
            .as_ref()
            .ok_or(OidcError::new_rp_error("issuer is required", None))?;

        let endpoint = issuer
            .end_session_endpoint
            .as_ref()
            .ok_or(OidcError::new_rp_error(
                "end_session_endpoint must be configured on the issuer",
                None,
            ))?;

        let mut endpoint = Url::parse(endpoint).map_err(|_| {
            OidcError::new_rp_error("end_session_endpoint is an invalid url", None)
        })?;

        let client_id = parameters
            .client_id
            .unwrap_or_else(|| self.client_id.clone());

        let mut post_logout = match &self.post_logout_redirect_uris {
            Some(uris) if uris.len() == 1 => uris.first().cloned(),
            _ => None,
        };

        if parameters.post_logout_redirect_uri.is_some() {
            post_logout = parameters.post_logout_redirect_uri;
        }

        let id_token_hint = match parameters.id_token_hint {
            Some(IdTokenHint::Jwt(jwt)) => Some(jwt),
            Some(IdTokenHint::Tokens(token_set)) => {
                Some(token_set.get_id_token().ok_or(OidcError::new_rp_error(
                    "id_token not present in TokenSet",
                    None,
                ))?)
            }
            None => None,
        };

        let mut pairs: Vec<(String, String)> = endpoint
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        if let Some(other) = parameters.other {
            let mut sorted: Vec<(String, String)> = other.into_iter().collect();
            sorted.sort();
            pairs.extend(sorted);
        }

        pairs.push(("client_id".to_string(), client_id));

        if let Some(uri) = post_logout {
            pairs.push(("post_logout_redirect_uri".to_string(), uri));
        }

        if let Some(hint) = id_token_hint {
            pairs.push(("id_token_hint".to_string(), hint));
        }

        if let Some(hint) = parameters.logout_hint {
            pairs.push(("logout_hint".to_string(), hint));
        }

        if let Some(state) = parameters.state {
            pairs.push(("state".to_string(), state));
        }

        let mut query = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &pairs {
            query.append_pair(k, v);
        }

        endpoint.set_query(Some(&query.finish()));

        Ok(endpoint)
    }

    /// # Callback Params
    /// Extracts the authorization response parameters from a callback url,
    /// an incoming http request or a plain map. Only the recognized response
    /// keys are retained.
    pub fn callback_params(&self, input: CallbackInput<'_>) -> OidcReturn<CallbackParams> {
        match input {
            CallbackInput::Url(url) => {
                let url = Url::parse(url)
                    .map_err(|_| OidcError::new_rp_error("could not parse the request", None))?;

                Ok(CallbackParams::from_pairs(
                    url.query_pairs().map(|(k, v)| (k.to_string(), v.to_string())),
                ))
            }
            CallbackInput::Request { method, url, body } => match method {
                HttpMethod::GET => {
                    let url = url.ok_or(OidcError::new_rp_error(
                        "could not parse the request",
                        None,
                    ))?;

                    self.callback_params(CallbackInput::Url(url))
                }
                HttpMethod::POST => {
                    let body = body.ok_or(OidcError::new_rp_error(
                        "could not parse the request",
                        None,
                    ))?;

                    let form = match body {
                        CallbackBody::Bytes(bytes) => {
                            let text = std::str::from_utf8(bytes).map_err(|_| {
                                OidcError::new_rp_error("could not parse the request", None)
                            })?;
                            form_url_encoded_to_string_map(text)
                        }
                        CallbackBody::Text(text) => form_url_encoded_to_string_map(text),
                        CallbackBody::Form(map) => map,
                    };

                    Ok(CallbackParams::from_pairs(form))
                }
                _ => Err(OidcError::new_rp_error(
                    "invalid callback method, only GET or POST are supported",
                    None,
                )),
            },
            CallbackInput::Map(map) => Ok(CallbackParams::from_pairs(map)),
        }
    }

    /// # Token Grant
    /// An authenticated POST of `body` to the token endpoint, returning the
    /// [TokenSet] the server issued.
    pub async fn grant_async<T>(
        &mut self,
        http_client: &T,
        body: HashMap<String, String>,
        extras: GrantExtras<'_>,
    ) -> OidcReturn<TokenSet>
    where
        T: OidcHttpClient,
    {
        let auth_post = AuthPost {
            endpoint_auth_method: extras.endpoint_auth_method,
            client_assertion_payload: extras.client_assertion_payload,
            expect_body: true,
            expect_json_body: true,
            any_success: false,
        };

        let response = self
            .authenticated_post_async("token", body, auth_post, http_client)
            .await?;

        let body = response.body.clone().ok_or(OidcError::new_rp_error(
            "body expected in grant response",
            Some(response.clone()),
        ))?;

        let token_params = convert_json_to::<TokenSetParams>(&body).map_err(|_| {
            OidcError::new_rp_error("could not parse the grant response", Some(response))
        })?;

        Ok(TokenSet::new(token_params))
    }

    /// # OAuth Callback
    /// Consumes a plain OAuth 2.0 authorization response: cross checks
    /// `state` and `iss`, enforces the response type implied parameters, and
    /// exchanges a `code` when present. ID Tokens are rejected, use
    /// [`Client::callback_async()`] for OpenID Connect responses.
    pub async fn oauth_callback_async<T>(
        &mut self,
        http_client: &T,
        redirect_uri: Option<&str>,
        parameters: CallbackParams,
        checks: Option<OAuthCallbackChecks<'_>>,
        extras: Option<CallbackExtras>,
    ) -> OidcReturn<TokenSet>
    where
        T: OidcHttpClient,
    {
        let checks = checks.unwrap_or_default();

        self.check_state(&parameters, checks.state, || {
            Self::params_checks_extra(&parameters, &json!(checks))
        })?;

        self.check_iss(&parameters)?;

        if let Some(error) = parameters.error.clone() {
            return Err(OidcError::new_op_error(
                error,
                parameters.error_description.clone(),
                parameters.error_uri.clone(),
                None,
            ));
        }

        if parameters.id_token.as_ref().is_some_and(|t| !t.is_empty()) {
            return Err(OidcError::new_rp_error_extra(
                "id_token detected in the response, you must use client.callback_async() instead of client.oauth_callback_async()",
                None,
                Self::params_checks_extra(&parameters, &json!(checks)),
            ));
        }

        self.check_response_type_params(&parameters, checks.response_type, false, || {
            Self::params_checks_extra(&parameters, &json!(checks))
        })?;

        if parameters.code.is_some() {
            let mut token_set = self
                .exchange_code(http_client, redirect_uri, &parameters, checks.code_verifier, &extras)
                .await?;

            if token_set.get_id_token().is_some_and(|t| !t.is_empty()) {
                return Err(OidcError::new_rp_error_extra(
                    "id_token detected in the response, you must use client.callback_async() instead of client.oauth_callback_async()",
                    None,
                    Self::params_checks_extra(&parameters, &json!(checks)),
                ));
            }

            token_set.set_id_token(None);

            return Ok(token_set);
        }

        Ok(Self::token_set_from_params(&parameters))
    }

    /// # Callback
    /// Consumes an OpenID Connect authorization response. On top of the
    /// plain OAuth checks this validates a returned ID Token (context
    /// `authorization`), exchanges a `code` and validates the ID Token of
    /// the token response (context `token`).
    pub async fn callback_async<T>(
        &mut self,
        http_client: &T,
        redirect_uri: Option<&str>,
        parameters: CallbackParams,
        checks: Option<OpenIdCallbackChecks<'_>>,
        extras: Option<CallbackExtras>,
    ) -> OidcReturn<TokenSet>
    where
        T: OidcHttpClient,
    {
        let mut checks = checks.unwrap_or_default();

        let oauth_checks = checks.oauth_checks.unwrap_or_default();

        if checks.max_age.is_none() {
            checks.max_age = self.default_max_age;
        }

        self.check_state(&parameters, oauth_checks.state, || {
            Self::params_checks_extra(&parameters, &json!(checks))
        })?;

        self.check_iss(&parameters)?;

        if let Some(error) = parameters.error.clone() {
            return Err(OidcError::new_op_error(
                error,
                parameters.error_description.clone(),
                parameters.error_uri.clone(),
                None,
            ));
        }

        self.check_response_type_params(&parameters, oauth_checks.response_type, true, || {
            Self::params_checks_extra(&parameters, &json!(checks))
        })?;

        if parameters.id_token.as_ref().is_some_and(|t| !t.is_empty()) {
            let token_set = Self::token_set_from_params(&parameters);

            let token_set = self.decrypt_id_token(token_set)?;
            let token_set = self
                .validate_id_token_async(
                    token_set,
                    checks.nonce,
                    true,
                    "authorization",
                    checks.max_age,
                    oauth_checks.state,
                    http_client,
                )
                .await?;

            if parameters.code.is_none() {
                return Ok(token_set);
            }
        }

        if parameters.code.is_some() {
            let token_set = self
                .exchange_code(
                    http_client,
                    redirect_uri,
                    &parameters,
                    oauth_checks.code_verifier,
                    &extras,
                )
                .await?;

            let token_set = self.decrypt_id_token(token_set)?;
            let mut token_set = self
                .validate_id_token_async(
                    token_set,
                    checks.nonce,
                    true,
                    "token",
                    checks.max_age,
                    None,
                    http_client,
                )
                .await?;

            if parameters.session_state.is_some() {
                token_set.set_session_state(parameters.session_state.clone());
            }

            return Ok(token_set);
        }

        Ok(Self::token_set_from_params(&parameters))
    }

    fn check_state(
        &self,
        parameters: &CallbackParams,
        expected_state: Option<&str>,
        extra: impl Fn() -> Option<HashMap<String, Value>>,
    ) -> OidcReturn<()> {
        if parameters.state.is_some() && expected_state.is_none() {
            return Err(OidcError::new_rp_error(
                "checks.state argument is missing",
                None,
            ));
        }

        if parameters.state.is_none() && expected_state.is_some() {
            return Err(OidcError::new_rp_error_extra(
                "state missing from the response",
                None,
                extra(),
            ));
        }

        if parameters.state.as_deref() != expected_state {
            return Err(OidcError::new_rp_error_extra(
                &format!(
                    "state mismatch, expected {}, got: {}",
                    expected_state.unwrap_or_default(),
                    parameters.state.as_deref().unwrap_or_default()
                ),
                None,
                extra(),
            ));
        }

        Ok(())
    }

    /// RFC 9207 `iss` response parameter cross check
    fn check_iss(&self, parameters: &CallbackParams) -> OidcReturn<()> {
        let issuer = self
            .issuer
            .as_ref()
            .ok_or(OidcError::new_rp_error("issuer is required", None))?;

        if let Some(iss) = &parameters.iss {
            if iss != &issuer.issuer {
                return Err(OidcError::new_rp_error_extra(
                    &format!("iss mismatch, expected {}, got: {}", issuer.issuer, iss),
                    None,
                    Self::params_checks_extra(parameters, &Value::Null),
                ));
            }
        } else if issuer
            .authorization_response_iss_parameter_supported
            .is_some_and(|v| v)
            && parameters.id_token.is_none()
        {
            return Err(OidcError::new_rp_error_extra(
                "iss missing from the response",
                None,
                Self::params_checks_extra(parameters, &Value::Null),
            ));
        }

        Ok(())
    }

    /// Presence checks implied by `checks.response_type`. `none` forbids any
    /// artifact; members of hybrid response types all enforce theirs.
    fn check_response_type_params(
        &self,
        parameters: &CallbackParams,
        response_type: Option<&str>,
        id_token_expected: bool,
        extra: impl Fn() -> Option<HashMap<String, Value>>,
    ) -> OidcReturn<()> {
        let response_type = match response_type {
            Some(rt) => rt,
            None => return Ok(()),
        };

        for res_type in response_type.split(' ') {
            if res_type == "none"
                && (parameters.code.is_some()
                    || parameters.id_token.is_some()
                    || parameters.access_token.is_some())
            {
                return Err(OidcError::new_rp_error_extra(
                    "unexpected params encountered for \"none\" response",
                    None,
                    extra(),
                ));
            }

            let mut message = "";

            if res_type == "code" && parameters.code.is_none() {
                message = "code missing from response";
            }

            if res_type == "token" && parameters.access_token.is_none() {
                message = "access_token missing from response";
            }

            if res_type == "token" && parameters.token_type.is_none() {
                message = "token_type missing from response";
            }

            if id_token_expected && res_type == "id_token" && parameters.id_token.is_none() {
                message = "id_token missing from response";
            }

            if !message.is_empty() {
                return Err(OidcError::new_rp_error_extra(message, None, extra()));
            }
        }

        Ok(())
    }

    async fn exchange_code<T>(
        &mut self,
        http_client: &T,
        redirect_uri: Option<&str>,
        parameters: &CallbackParams,
        code_verifier: Option<&str>,
        extras: &Option<CallbackExtras>,
    ) -> OidcReturn<TokenSet>
    where
        T: OidcHttpClient,
    {
        let mut exchange_body = extras
            .as_ref()
            .and_then(|e| e.exchange_body.clone())
            .unwrap_or_default();

        exchange_body.insert("grant_type".to_string(), "authorization_code".to_string());
        exchange_body.insert(
            "code".to_string(),
            parameters.code.clone().unwrap_or_default(),
        );

        if let Some(redirect_uri) = redirect_uri {
            exchange_body.insert("redirect_uri".to_string(), redirect_uri.to_string());
        }

        if let Some(code_verifier) = code_verifier {
            exchange_body.insert("code_verifier".to_string(), code_verifier.to_string());
        }

        let grant_extras = GrantExtras {
            client_assertion_payload: extras
                .as_ref()
                .and_then(|e| e.client_assertion_payload.as_ref()),
            endpoint_auth_method: None,
        };

        self.grant_async(http_client, exchange_body, grant_extras)
            .await
    }

    fn token_set_from_params(parameters: &CallbackParams) -> TokenSet {
        let mut other_fields: HashMap<String, Value> = parameters
            .other
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, json!(v)))
            .collect();

        if let Some(state) = &parameters.state {
            other_fields.insert("state".to_string(), json!(state));
        }

        if let Some(code) = &parameters.code {
            other_fields.insert("code".to_string(), json!(code));
        }

        TokenSet::new(TokenSetParams {
            access_token: parameters.access_token.clone(),
            token_type: parameters.token_type.clone(),
            id_token: parameters.id_token.clone(),
            refresh_token: parameters.refresh_token.clone(),
            expires_in: parameters.expires_in.as_ref().and_then(|e| e.parse().ok()),
            expires_at: None,
            session_state: parameters.session_state.clone(),
            scope: parameters.scope.clone(),
            other: if other_fields.is_empty() {
                None
            } else {
                Some(other_fields)
            },
        })
    }

    fn params_checks_extra(
        parameters: &CallbackParams,
        checks: &Value,
    ) -> Option<HashMap<String, Value>> {
        let mut extra = HashMap::new();

        if let Ok(params) = serde_json::to_value(parameters) {
            extra.insert("params".to_string(), params);
        }

        if !checks.is_null() {
            extra.insert("checks".to_string(), checks.clone());
        }

        Some(extra)
    }

    /// # Refresh Grant
    /// Exchanges the refresh token of `token_set` at the token endpoint. A
    /// returned ID Token is validated in context `token` with no nonce
    /// applicable, and its `sub` must match the previous ID Token's.
    pub async fn refresh_async<T>(
        &mut self,
        http_client: &T,
        token_set: TokenSet,
        extras: Option<RefreshTokenExtras<'_>>,
    ) -> OidcReturn<TokenSet>
    where
        T: OidcHttpClient,
    {
        let refresh_token = token_set
            .get_refresh_token()
            .ok_or(OidcError::new_rp_error(
                "refresh_token not present in TokenSet",
                None,
            ))?;

        let mut body = extras
            .as_ref()
            .and_then(|e| e.exchange_body.clone())
            .unwrap_or_default();

        body.insert("grant_type".to_string(), "refresh_token".to_string());
        body.insert("refresh_token".to_string(), refresh_token);

        let grant_extras = GrantExtras {
            client_assertion_payload: extras.as_ref().and_then(|e| e.client_assertion_payload),
            endpoint_auth_method: None,
        };

        let mut new_token_set = self.grant_async(http_client, body, grant_extras).await?;

        if let Some(id_token) = new_token_set.get_id_token() {
            new_token_set = self.decrypt_id_token(new_token_set)?;
            new_token_set = self
                .validate_id_token_async(
                    new_token_set,
                    None,
                    false,
                    "token",
                    None,
                    None,
                    http_client,
                )
                .await?;

            let expected_sub = token_set
                .claims()
                .and_then(|claims| claims.get("sub").cloned());

            if let Some(Value::String(expected_sub)) = expected_sub {
                let new_sub = new_token_set
                    .claims()
                    .and_then(|claims| claims.get("sub").cloned());

                if let Some(Value::String(new_sub)) = new_sub {
                    if expected_sub != new_sub {
                        return Err(OidcError::new_rp_error_extra(
                            &format!("sub mismatch, expected {}, got: {}", expected_sub, new_sub),
                            None,
                            super::helpers::jwt_extra(&id_token),
                        ));
                    }
                }
            }
        }

        Ok(new_token_set)
    }

    /// # Token Introspection
    /// An authenticated POST to the introspection endpoint, RFC 7662,
    /// returning the introspection document.
    pub async fn introspect_async<T>(
        &mut self,
        http_client: &T,
        token: &str,
        token_type_hint: Option<&str>,
        extras: Option<IntrospectionExtras<'_>>,
    ) -> OidcReturn<Value>
    where
        T: OidcHttpClient,
    {
        let mut form = HashMap::new();
        form.insert("token".to_string(), token.to_string());

        if let Some(hint) = token_type_hint {
            form.insert("token_type_hint".to_string(), hint.to_string());
        }

        if let Some(body) = extras.as_ref().and_then(|e| e.introspect_body.as_ref()) {
            for (k, v) in body {
                form.insert(k.clone(), v.clone());
            }
        }

        let auth_post = AuthPost {
            endpoint_auth_method: None,
            client_assertion_payload: extras
                .as_ref()
                .and_then(|e| e.client_assertion_payload),
            expect_body: true,
            expect_json_body: true,
            any_success: false,
        };

        let response = self
            .authenticated_post_async("introspection", form, auth_post, http_client)
            .await?;

        let body = response.body.clone().unwrap_or_default();

        convert_json_to::<Value>(&body).map_err(|_| {
            OidcError::new_rp_error("could not parse the introspection response", Some(response))
        })
    }

    /// # Token Revocation
    /// An authenticated POST to the revocation endpoint. Per RFC 7009 any
    /// 2xx status is a success and the response body is ignored.
    pub async fn revoke_async<T>(
        &mut self,
        http_client: &T,
        token: &str,
        token_type_hint: Option<&str>,
        extras: Option<RevokeExtras<'_>>,
    ) -> OidcReturn<()>
    where
        T: OidcHttpClient,
    {
        let mut form = HashMap::new();
        form.insert("token".to_string(), token.to_string());

        if let Some(hint) = token_type_hint {
            form.insert("token_type_hint".to_string(), hint.to_string());
        }

        if let Some(body) = extras.as_ref().and_then(|e| e.revocation_body.as_ref()) {
            for (k, v) in body {
                form.insert(k.clone(), v.clone());
            }
        }

        let auth_post = AuthPost {
            endpoint_auth_method: None,
            client_assertion_payload: extras
                .as_ref()
                .and_then(|e| e.client_assertion_payload),
            expect_body: false,
            expect_json_body: false,
            any_success: true,
        };

        self.authenticated_post_async("revocation", form, auth_post, http_client)
            .await?;

        Ok(())
    }

    /// # Userinfo
    /// Fetches the userinfo document. The access token travels per
    /// [`UserinfoOptions::via`]; JWT responses are decrypted and validated
    /// per the client's `userinfo_*` metadata. When `token` is a
    /// [TokenSet], the response `sub` must match the ID Token's.
    pub async fn userinfo_async<T>(
        &mut self,
        http_client: &T,
        token: UserinfoToken<'_>,
        options: UserinfoOptions,
    ) -> OidcReturn<Value>
    where
        T: OidcHttpClient,
    {
        let issuer = self
            .issuer
            .as_ref()
            .ok_or(OidcError::new_rp_error("issuer is required", None))?;

        let userinfo_endpoint = issuer
            .userinfo_endpoint
            .as_ref()
            .ok_or(OidcError::new_rp_error(
                "userinfo_endpoint must be configured on the issuer",
                None,
            ))?
            .clone();

        let (access_token, token_type, token_set) = match &token {
            UserinfoToken::TokenSet(token_set) => (
                token_set
                    .get_access_token()
                    .ok_or(OidcError::new_rp_error(
                        "access_token is required in token_set",
                        None,
                    ))?,
                token_set.get_token_type(),
                Some(*token_set),
            ),
            UserinfoToken::AccessToken(token) => (token.to_string(), None, None),
        };

        if !matches!(options.method, HttpMethod::GET | HttpMethod::POST) {
            return Err(OidcError::new_rp_error(
                "userinfo_async() method can only be POST or a GET",
                None,
            ));
        }

        if options.via == UserinfoVia::Query && !matches!(options.method, HttpMethod::GET) {
            return Err(OidcError::new_rp_error(
                "access tokens can only travel in the query on GET",
                None,
            ));
        }

        if options.via == UserinfoVia::Body && !matches!(options.method, HttpMethod::POST) {
            return Err(OidcError::new_rp_error(
                "access tokens can only travel in the body on POST",
                None,
            ));
        }

        let jwt_response = self.userinfo_signed_response_alg.is_some()
            || self.userinfo_encrypted_response_alg.is_some();

        let mtls = self
            .tls_client_certificate_bound_access_tokens
            .is_some_and(|v| v);

        let mut target_url = userinfo_endpoint;

        if mtls {
            if let Some(alias) = issuer
                .mtls_endpoint_aliases
                .as_ref()
                .and_then(|a| a.userinfo_endpoint.clone())
            {
                target_url = alias;
            }
        }

        let mut url = Url::parse(&target_url)
            .map_err(|_| OidcError::new_rp_error("userinfo_endpoint is an invalid url", None))?;

        let mut form: HashMap<String, String> = HashMap::new();

        match options.via {
            UserinfoVia::Query => {
                url.query_pairs_mut()
                    .append_pair("access_token", &access_token);
            }
            UserinfoVia::Body => {
                form.insert("access_token".to_string(), access_token.clone());
            }
            UserinfoVia::Header => {}
        }

        if let Some(params) = options.params {
            match options.method {
                HttpMethod::GET => {
                    for (k, v) in params {
                        url.query_pairs_mut().append_pair(&k, &v);
                    }
                }
                _ => {
                    for (k, v) in params {
                        form.insert(k, v);
                    }
                }
            }
        }

        let mut req = HttpRequest::new(url)
            .method(options.method)
            .mtls(mtls)
            .expect_bearer(true)
            .expect_json_body(!jwt_response)
            .header(
                "accept",
                if jwt_response {
                    "application/jwt"
                } else {
                    "application/json"
                },
            );

        if options.via == UserinfoVia::Header {
            let scheme = token_type.unwrap_or_else(|| "Bearer".to_string());
            req = req.header("authorization", format!("{} {}", scheme, access_token));
        }

        if !form.is_empty() {
            req = req.form(form);
        }

        let res = request_async(req, http_client).await?;

        let body = res.body.clone().ok_or(OidcError::new_rp_error(
            "body was empty",
            Some(res.clone()),
        ))?;

        let payload: Value = if jwt_response {
            let jwt_content_type = res
                .content_type
                .as_ref()
                .and_then(|ct| ct.split(';').next())
                .is_some_and(|ct| ct == "application/jwt");

            if !jwt_content_type {
                return Err(OidcError::new_rp_error(
                    "expected application/jwt response from the userinfo_endpoint",
                    Some(res),
                ));
            }

            let userinfo = self.decrypt_jwt_userinfo(body)?;

            if self.userinfo_signed_response_alg.is_none() {
                match serde_json::from_str::<Value>(&userinfo) {
                    Ok(Value::Object(map)) => Value::Object(map),
                    _ => {
                        return Err(OidcError::new_rp_error_extra(
                            "failed to parse userinfo JWE payload as JSON",
                            Some(res),
                            super::helpers::jwt_extra(&userinfo),
                        ))
                    }
                }
            } else {
                let (jwt_payload, _, _) = self
                    .validate_jwt_userinfo_async(&userinfo, http_client)
                    .await?;

                Value::Object(jwt_payload.claims_set().clone())
            }
        } else {
            match serde_json::from_str::<Value>(&body) {
                Ok(Value::Object(map)) => Value::Object(map),
                _ => {
                    return Err(OidcError::new_rp_error(
                        "failed to parse userinfo response as JSON",
                        Some(res),
                    ))
                }
            }
        };

        if let Some(token_set) = token_set {
            if let Some(id_token) = token_set.get_id_token() {
                let expected_sub = token_set
                    .claims()
                    .and_then(|claims| claims.get("sub").cloned());

                if let Some(Value::String(expected_sub)) = expected_sub {
                    if let Some(Value::String(new_sub)) = payload.get("sub") {
                        if &expected_sub != new_sub {
                            let mut extra =
                                super::helpers::jwt_extra(&id_token).unwrap_or_default();

                            if let Ok(body) = serde_json::from_str::<Value>(
                                res.body.as_deref().unwrap_or_default(),
                            ) {
                                extra.insert("body".to_string(), body);
                            }

                            return Err(OidcError::new_rp_error_extra(
                                &format!(
                                    "userinfo sub mismatch, expected {}, got: {}",
                                    expected_sub, new_sub
                                ),
                                None,
                                Some(extra),
                            ));
                        }
                    }
                }
            }
        }

        Ok(payload)
    }

    /// # Request Object
    /// Builds a request object: the authorization parameters as a JWT signed
    /// under `request_object_signing_alg` (default `none`) and, when
    /// configured, encrypted to the issuer.
    pub async fn request_object_async<T>(
        &mut self,
        http_client: &T,
        mut request_object: Value,
    ) -> OidcReturn<String>
    where
        T: OidcHttpClient,
    {
        if !request_object.is_object() {
            return Err(OidcError::new_rp_error(
                "request_object must be a plain object",
                None,
            ));
        }

        let signing_alg = self
            .request_object_signing_alg
            .clone()
            .unwrap_or_else(|| "none".to_string());

        let header_typ = "oauth-authz-req+jwt";

        let unix = (self.now)();

        request_object["iss"] = json!(self.client_id);

        if let Some(issuer) = &self.issuer {
            request_object["aud"] = json!(issuer.issuer);
        }

        request_object["client_id"] = json!(self.client_id);
        request_object["jti"] = json!(generate_random(None));
        request_object["iat"] = json!(unix);
        request_object["exp"] = json!(unix + 300);

        let payload = request_object.to_string();

        let signed = if signing_alg == "none" {
            let encoded_header = base64_url::encode(&format!(
                "{{\"alg\":\"{}\",\"typ\":\"{}\"}}",
                signing_alg, header_typ
            ));
            let encoded_payload = base64_url::encode(&payload);

            format!("{}.{}.", encoded_header, encoded_payload)
        } else {
            let symmetric = signing_alg.starts_with("HS");

            let key = if symmetric {
                self.secret_for_alg(&signing_alg)?
            } else {
                let jwks = self.private_jwks.as_ref().ok_or(OidcError::new_rp_error(
                    &format!(
                        "no keystore present for client, cannot sign using alg {}",
                        signing_alg
                    ),
                    None,
                ))?;

                let keys = jwks.get(Some(&signing_alg), Some("sig"), None, None);
                let key = keys.first().ok_or(OidcError::new_rp_error(
                    &format!("no key to sign with found for alg {}", signing_alg),
                    None,
                ))?;

                let mut key = (*key).clone();
                if key.algorithm().is_none() {
                    key.set_algorithm(&signing_alg);
                }
                key
            };

            let mut header = JwsHeader::new();
            header.set_algorithm(&signing_alg);
            header.set_token_type(header_typ);

            if !symmetric {
                if let Some(kid) = key.key_id() {
                    header.set_key_id(kid);
                }
            }

            let signer = key.to_signer()?;

            jws::serialize_compact(payload.as_bytes(), &header, &*signer)
                .map_err(|e| OidcError::new_rp_error(&e.to_string(), None))?
        };

        let encryption_alg = match self.request_object_encryption_alg.clone() {
            Some(alg) => alg,
            None => return Ok(signed),
        };

        let encryption_enc = self
            .request_object_encryption_enc
            .clone()
            .unwrap_or_else(|| "A128CBC-HS256".to_string());

        let key = if encryption_alg.contains("RSA") || encryption_alg.contains("ECDH") {
            let issuer = self.issuer.as_mut().ok_or(OidcError::new_rp_error(
                "issuer is required to encrypt a request object to it",
                None,
            ))?;

            let query = QueryKeyStore {
                alg: Some(encryption_alg.clone()),
                key_use: Some("enc".to_string()),
                ..Default::default()
            };

            let keys = issuer.query_keystore_async(query, false, http_client).await?;

            let mut key = keys.into_iter().next().ok_or(OidcError::new_rp_error(
                "no key found for encrypting the request object",
                None,
            ))?;

            if key.algorithm().is_none() {
                key.set_algorithm(&encryption_alg);
            }
            key
        } else if encryption_alg == "dir" {
            self.secret_for_alg(&encryption_enc)?
        } else {
            self.secret_for_alg(&encryption_alg)?
        };

        let mut jwe_header = JweHeader::new();
        jwe_header.set_algorithm(&encryption_alg);
        jwe_header.set_content_encryption(&encryption_enc);
        jwe_header.set_content_type("JWT");

        if let Some(kid) = key.key_id() {
            jwe_header.set_key_id(kid);
        }

        let encrypter = key.to_jwe_encrypter()?;

        jwe::serialize_compact(signed.as_bytes(), &jwe_header, &*encrypter)
            .map_err(|e| OidcError::new_rp_error(&e.to_string(), None))
    }

    /// # Device Authorization
    /// Starts an RFC 8628 device authorization grant. The request is
    /// authenticated with the token endpoint's method. Returns the
    /// [DeviceFlowHandle] to poll with.
    pub async fn device_authorization_async<T>(
        &mut self,
        http_client: &T,
        params: DeviceAuthorizationParams,
        extras: Option<DeviceAuthorizationExtras>,
    ) -> OidcReturn<DeviceFlowHandle>
    where
        T: OidcHttpClient,
    {
        {
            let issuer = self
                .issuer
                .as_ref()
                .ok_or(OidcError::new_rp_error("issuer is required", None))?;

            if issuer.token_endpoint.is_none() {
                return Err(OidcError::new_rp_error(
                    "token_endpoint must be configured on the issuer",
                    None,
                ));
            }

            if issuer.device_authorization_endpoint.is_none() {
                return Err(OidcError::new_rp_error(
                    "device_authorization_endpoint must be configured on the issuer",
                    None,
                ));
            }
        }

        let mut form: HashMap<String, String> = HashMap::new();

        form.insert(
            "client_id".to_string(),
            params.client_id.unwrap_or_else(|| self.client_id.clone()),
        );

        if let Some(scope) = params.scope {
            form.insert("scope".to_string(), scope.join(" "));
        }

        for (k, v) in params.other {
            // these have no place in a device authorization request
            if k == "redirect_uri" || k == "response_type" || k == "client_id" || k == "scope" {
                continue;
            }

            form.insert(k, get_serde_value_as_string(&v)?);
        }

        let auth_post = AuthPost {
            endpoint_auth_method: Some("token"),
            client_assertion_payload: extras
                .as_ref()
                .and_then(|e| e.client_assertion_payload.as_ref()),
            expect_body: true,
            expect_json_body: true,
            any_success: false,
        };

        let res = self
            .authenticated_post_async("device_authorization", form, auth_post, http_client)
            .await?;

        let device_res = res
            .body
            .as_ref()
            .and_then(|b| convert_json_to::<DeviceAuthorizationResponse>(b).ok())
            .ok_or(OidcError::new_rp_error(
                "could not parse the device authorization response",
                Some(res),
            ))?;

        Ok(DeviceFlowHandle::new(
            self.clone(),
            device_res,
            extras,
            params.max_age,
        ))
    }
}
