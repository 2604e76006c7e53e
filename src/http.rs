//! Request dispatch over the pluggable [OidcHttpClient], plus enforcement of
//! the response expectations set by each flow (status code, body presence,
//! JSON shape, bearer challenges).

use serde_json::Value;

use crate::helpers::{convert_json_to, parse_www_authenticate_error};
use crate::types::{HttpRequest, HttpResponse, OidcError, OidcHttpClient, OidcReturn, OpErrorBody};

pub(crate) async fn request_async<T>(
    request: HttpRequest,
    http_client: &T,
) -> OidcReturn<HttpResponse>
where
    T: OidcHttpClient,
{
    if request.mtls && http_client.get_client_certificate(&request).await.is_none() {
        return Err(OidcError::new_rp_error(
            "mutual-TLS certificate and key not set",
            None,
        ));
    }

    let expectations = request.expectations;

    let response = http_client
        .request(request)
        .await
        .map_err(|e| OidcError::new_rp_error(&format!("request failed: {}", e), None))?;

    let expected_status = response.status_code == expectations.status_code
        || (expectations.any_success && (200..300).contains(&response.status_code));

    if !expected_status {
        if let Some(body) = &response.body {
            if let Ok(op_error) = convert_json_to::<OpErrorBody>(body) {
                if !op_error.error.is_empty() {
                    return Err(OidcError::from_op_body(op_error, Some(response)));
                }
            }
        }

        if expectations.bearer {
            if let Some(header_value) = response.www_authenticate.clone() {
                parse_www_authenticate_error(&header_value, &response)?;
            }
        }

        return Err(OidcError::new_op_error(
            "server_error".to_string(),
            Some(format!(
                "expected {}, got: {}",
                expectations.status_code, response.status_code
            )),
            None,
            Some(response),
        ));
    }

    if expectations.body && response.body.is_none() {
        return Err(OidcError::new_op_error(
            "server_error".to_string(),
            Some(format!(
                "expected {} with body but no body was returned",
                expectations.status_code
            )),
            None,
            Some(response),
        ));
    }

    if expectations.body && expectations.json_body {
        let valid_json = response
            .body
            .as_ref()
            .map(|b| convert_json_to::<Value>(b).is_ok())
            .unwrap_or(false);

        if !valid_json {
            return Err(OidcError::new_rp_error(
                "unexpected body type",
                Some(response),
            ));
        }
    }

    Ok(response)
}
