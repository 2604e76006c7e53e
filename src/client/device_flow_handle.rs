use std::cmp::max;

use crate::types::{
    DeviceAuthorizationExtras, DeviceAuthorizationResponse, DeviceFlowPoll, GrantExtras,
    OidcError, OidcHttpClient, OidcReturn,
};

use super::Client;

/// # DeviceFlowHandle
/// Polling handle of an RFC 8628 device authorization grant. The handle does
/// not sleep; callers time their polls with [`DeviceFlowHandle::interval()`]
/// and stop once [`DeviceFlowHandle::expired()`].
#[derive(Debug)]
pub struct DeviceFlowHandle {
    client: Client,
    extras: Option<DeviceAuthorizationExtras>,
    expires_at: i64,
    interval: f64,
    max_age: Option<u64>,
    response: DeviceAuthorizationResponse,
    last_requested: i64,
    pub(crate) now: fn() -> i64,
}

impl DeviceFlowHandle {
    pub(crate) fn new(
        client: Client,
        response: DeviceAuthorizationResponse,
        extras: Option<DeviceAuthorizationExtras>,
        max_age: Option<u64>,
    ) -> Self {
        let now = client.now;

        Self {
            expires_at: now().wrapping_add(response.expires_in),
            interval: response.interval.unwrap_or(5.0),
            client,
            extras,
            max_age,
            response,
            last_requested: 0,
            now,
        }
    }

    /// When the device code expires, seconds since the epoch
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Seconds until the device code expires
    pub fn expires_in(&self) -> i64 {
        max(self.expires_at.wrapping_sub((self.now)()), 0)
    }

    /// Whether the device code has expired
    pub fn expired(&self) -> bool {
        self.expires_in() == 0
    }

    /// Current polling interval in seconds
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// The client polling this grant
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The device verification code
    pub fn device_code(&self) -> &str {
        &self.response.device_code
    }

    /// The code the end user enters at the verification uri
    pub fn user_code(&self) -> &str {
        &self.response.user_code
    }

    /// Where the end user verifies the `user_code`
    pub fn verification_uri(&self) -> &str {
        &self.response.verification_uri
    }

    /// Verification uri with the `user_code` embedded
    pub fn verification_uri_complete(&self) -> Option<&String> {
        self.response.verification_uri_complete.as_ref()
    }

    /// # Poll
    /// One POST of the device code grant to the token endpoint.
    ///
    /// `authorization_pending` and `slow_down` keep the handle pending (the
    /// latter growing the interval by 5 seconds); `access_denied` and
    /// `expired_token` surface as the server's error; anything else grants,
    /// with a returned ID Token validated in context `token`.
    pub async fn grant_async<T>(&mut self, http_client: &T) -> OidcReturn<DeviceFlowPoll>
    where
        T: OidcHttpClient,
    {
        if self.expired() {
            return Err(OidcError::new_rp_error(
                &format!(
                    "the device code {} has expired and the device authorization session has concluded",
                    self.device_code()
                ),
                None,
            ));
        }

        if ((self.now)().wrapping_sub(self.last_requested) as f64) < self.interval {
            return Ok(DeviceFlowPoll::Debounced);
        }

        let mut body = self
            .extras
            .as_ref()
            .and_then(|e| e.exchange_body.clone())
            .unwrap_or_default();

        body.insert(
            "grant_type".to_string(),
            "urn:ietf:params:oauth:grant-type:device_code".to_string(),
        );

        body.insert("device_code".to_string(), self.device_code().to_string());

        let extras = GrantExtras {
            client_assertion_payload: self
                .extras
                .as_ref()
                .and_then(|e| e.client_assertion_payload.as_ref()),
            endpoint_auth_method: None,
        };

        self.last_requested = (self.now)();

        let mut token_set = match self.client.grant_async(http_client, body, extras).await {
            Ok(token_set) => token_set,
            Err(OidcError::Op(body, response)) => {
                return match body.error.as_str() {
                    "authorization_pending" => Ok(DeviceFlowPoll::AuthorizationPending),
                    "slow_down" => {
                        self.interval += 5.0;
                        Ok(DeviceFlowPoll::SlowDown)
                    }
                    _ => Err(OidcError::Op(body, response)),
                };
            }
            Err(err) => return Err(err),
        };

        if token_set.get_id_token().is_some() {
            token_set = self.client.decrypt_id_token(token_set)?;
            token_set = self
                .client
                .validate_id_token_async(
                    token_set,
                    None,
                    false,
                    "token",
                    self.max_age,
                    None,
                    http_client,
                )
                .await?;
        }

        Ok(DeviceFlowPoll::Granted(Box::new(token_set)))
    }
}

