use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use super::http_client::HttpResponse;

/// Error document returned by the authorization server.
/// [Error Response](https://datatracker.ietf.org/doc/html/rfc6749#section-5.2)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpErrorBody {
    /// Machine readable error code
    pub error: String,
    /// Human readable description
    pub error_description: Option<String>,
    /// Uri with more information about the error
    pub error_uri: Option<String>,
    /// Scope the error relates to
    pub scope: Option<String>,
    /// State echoed back by the server
    pub state: Option<String>,
    /// Session state echoed back by the server
    pub session_state: Option<String>,
}

/// A violation detected locally by the relying party: a missing or malformed
/// claim, a mismatched check, a configuration problem or API misuse.
#[derive(Debug, Clone)]
pub struct RpErrorBody {
    /// Human readable message
    pub message: String,
    /// Contextual payloads such as `jwt`, `params`, `checks` or `body`.
    /// Never contains secrets.
    pub extra: Option<HashMap<String, Value>>,
}

/// # OidcError
/// The two error families of this crate.
///
/// `Op` carries what the authorization server returned, `Rp` carries what
/// this library asserted. Both optionally carry the [HttpResponse] of the
/// request they occurred in.
#[derive(Debug)]
pub enum OidcError {
    /// The authorization server returned an OAuth style error object or the
    /// HTTP exchange failed with one
    Op(OpErrorBody, Option<HttpResponse>),
    /// Locally detected protocol, configuration or usage violation
    Rp(RpErrorBody, Option<HttpResponse>),
}

/// Return type of all fallible operations in this crate
pub type OidcReturn<T> = Result<T, OidcError>;

impl OidcError {
    pub(crate) fn new_op_error(
        error: String,
        error_description: Option<String>,
        error_uri: Option<String>,
        response: Option<HttpResponse>,
    ) -> Self {
        OidcError::Op(
            OpErrorBody {
                error,
                error_description,
                error_uri,
                ..Default::default()
            },
            response,
        )
    }

    pub(crate) fn from_op_body(body: OpErrorBody, response: Option<HttpResponse>) -> Self {
        OidcError::Op(body, response)
    }

    pub(crate) fn new_rp_error(message: &str, response: Option<HttpResponse>) -> Self {
        OidcError::Rp(
            RpErrorBody {
                message: message.to_string(),
                extra: None,
            },
            response,
        )
    }

    pub(crate) fn new_rp_error_extra(
        message: &str,
        response: Option<HttpResponse>,
        extra: Option<HashMap<String, Value>>,
    ) -> Self {
        OidcError::Rp(
            RpErrorBody {
                message: message.to_string(),
                extra,
            },
            response,
        )
    }

    /// Whether this is an authorization server originated error
    pub fn is_op_error(&self) -> bool {
        matches!(self, OidcError::Op(..))
    }

    /// Whether this is a locally raised error
    pub fn is_rp_error(&self) -> bool {
        matches!(self, OidcError::Rp(..))
    }

    /// Consumes the error and returns the OP error body.
    /// Panics when the error is not [OidcError::Op].
    pub fn op_error(self) -> OpErrorBody {
        match self {
            OidcError::Op(body, _) => body,
            _ => panic!("not an op error"),
        }
    }

    /// Consumes the error and returns the RP error body.
    /// Panics when the error is not [OidcError::Rp].
    pub fn rp_error(self) -> RpErrorBody {
        match self {
            OidcError::Rp(body, _) => body,
            _ => panic!("not an rp error"),
        }
    }

    /// The response the error occurred with, if any
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            OidcError::Op(_, r) | OidcError::Rp(_, r) => r.as_ref(),
        }
    }

    /// Tags the error with the name of the claim source it was raised for.
    pub(crate) fn annotate_source(self, src: &str) -> Self {
        match self {
            OidcError::Rp(mut body, response) => {
                body.message = format!("{} ({})", body.message, src);
                let extra = body.extra.get_or_insert_with(HashMap::new);
                extra.insert("src".to_string(), Value::String(src.to_string()));
                OidcError::Rp(body, response)
            }
            OidcError::Op(mut body, response) => {
                let description = match body.error_description.take() {
                    Some(d) => format!("{} ({})", d, src),
                    None => format!("source: {}", src),
                };
                body.error_description = Some(description);
                OidcError::Op(body, response)
            }
        }
    }
}

impl fmt::Display for OidcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OidcError::Op(body, _) => match &body.error_description {
                Some(d) => write!(f, "{} ({})", body.error, d),
                None => write!(f, "{}", body.error),
            },
            OidcError::Rp(body, _) => write!(f, "{}", body.message),
        }
    }
}

impl std::error::Error for OidcError {}
