//! # Http Client Interface
//! The transport seam of the crate. Every network round trip goes through an
//! implementation of [OidcHttpClient]; the crate ships a reqwest backed
//! [crate::http_client::DefaultHttpClient].

use std::collections::HashMap;
use std::future;

use url::Url;

use crate::helpers::string_map_to_form_url_encoded;

/// Http method of an outgoing request
#[derive(Debug, Default, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub enum HttpMethod {
    /// GET
    #[default]
    GET,
    /// POST
    POST,
    /// PUT
    PUT,
    /// DELETE
    DELETE,
}

/// What the caller of [crate::http::request_async] expects from the response.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResponseExpectations {
    /// A body must be present
    pub body: bool,
    /// The body must parse as JSON
    pub json_body: bool,
    /// The request carries bearer auth, so `www-authenticate` challenges are
    /// turned into errors
    pub bearer: bool,
    /// Expected status code
    pub status_code: u16,
    /// Accept any 2xx instead of the exact status code
    pub any_success: bool,
}

/// Client certificate used for mutual TLS
#[derive(Debug)]
pub struct ClientCertificate {
    /// Public certificate, pem encoded
    pub cert: String,
    /// Private key, pem encoded
    pub key: String,
}

/// # HttpRequest
/// An outgoing request as handed to the [OidcHttpClient].
#[derive(Debug)]
pub struct HttpRequest {
    /// Absolute request url, query included
    pub url: Url,
    /// Http method
    pub method: HttpMethod,
    /// Request headers
    pub headers: HashMap<String, Vec<String>>,
    /// Request body
    pub body: Option<String>,
    /// Whether the request must be sent over mutual TLS
    pub mtls: bool,
    pub(crate) expectations: ResponseExpectations,
}

impl HttpRequest {
    pub(crate) fn new(url: Url) -> Self {
        Self {
            url,
            method: HttpMethod::GET,
            headers: HashMap::new(),
            body: None,
            mtls: false,
            expectations: ResponseExpectations {
                body: true,
                json_body: true,
                bearer: false,
                status_code: 200,
                any_success: false,
            },
        }
    }

    pub(crate) fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub(crate) fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub(crate) fn body(mut self, body: String) -> Self {
        self.headers.insert(
            "content-length".to_string(),
            vec![body.len().to_string()],
        );
        self.body = Some(body);
        self
    }

    pub(crate) fn form(self, form: HashMap<String, String>) -> Self {
        let encoded = string_map_to_form_url_encoded(&form);
        self.header("content-type", "application/x-www-form-urlencoded")
            .body(encoded)
    }

    pub(crate) fn json(self, json: String) -> Self {
        self.header("content-type", "application/json").body(json)
    }

    pub(crate) fn mtls(mut self, mtls: bool) -> Self {
        self.mtls = mtls;
        self
    }

    pub(crate) fn expect_body(mut self, expect: bool) -> Self {
        self.expectations.body = expect;
        self
    }

    pub(crate) fn expect_json_body(mut self, expect: bool) -> Self {
        self.expectations.json_body = expect;
        self
    }

    pub(crate) fn expect_bearer(mut self, bearer: bool) -> Self {
        self.expectations.bearer = bearer;
        self
    }

    pub(crate) fn expect_status_code(mut self, code: u16) -> Self {
        self.expectations.status_code = code;
        self
    }

    pub(crate) fn expect_any_success(mut self) -> Self {
        self.expectations.any_success = true;
        self
    }
}

/// An HTTP response as returned by the [OidcHttpClient]
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status_code: u16,
    /// The `content-type` header
    pub content_type: Option<String>,
    /// The `www-authenticate` header
    pub www_authenticate: Option<String>,
    /// Response body, `None` when empty
    pub body: Option<String>,
}

/// The interface the crate uses for making HTTP requests. Implement this to
/// plug in a custom client, connection pool, proxy or mTLS setup.
pub trait OidcHttpClient {
    /// Returns the client certificate for a request marked
    /// [`HttpRequest::mtls`]. Return `None` when the request needs no mutual
    /// TLS.
    fn get_client_certificate(
        &self,
        _req: &HttpRequest,
    ) -> impl std::future::Future<Output = Option<ClientCertificate>> + Send {
        future::ready(None)
    }

    /// Executes the request. `Err` is reserved for transport failures; any
    /// response that was received, whatever its status code, is `Ok`.
    fn request(
        &self,
        req: HttpRequest,
    ) -> impl std::future::Future<Output = Result<HttpResponse, String>> + Send;
}
