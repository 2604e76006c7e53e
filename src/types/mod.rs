//! # Types Module
//! Request parameters, metadata documents, checks and errors used across the
//! crate.

mod authorization_parameters;
mod callback_params;
mod client_metadata;
mod client_options;
mod decoded_token;
mod device_flow;
mod end_session_parameters;
mod errors;
mod extras;
pub(crate) mod http_client;
mod issuer_metadata;
mod query_keystore;
mod registration;
mod userinfo;

pub use authorization_parameters::{
    AuthorizationParameters, ClaimParam, ClaimParamValue, ClaimsParameterMember,
};
pub use callback_params::{
    CallbackBody, CallbackExtras, CallbackInput, CallbackParams, OAuthCallbackChecks,
    OpenIdCallbackChecks,
};
pub use client_metadata::ClientMetadata;
pub use client_options::ClientOptions;
pub use decoded_token::DecodedToken;
pub use device_flow::{
    DeviceAuthorizationExtras, DeviceAuthorizationParams, DeviceAuthorizationResponse,
    DeviceFlowPoll,
};
pub use end_session_parameters::{EndSessionParameters, IdTokenHint};
pub use errors::{OidcError, OidcReturn, OpErrorBody, RpErrorBody};
pub use extras::{GrantExtras, IntrospectionExtras, RefreshTokenExtras, RevokeExtras};
pub use http_client::{ClientCertificate, HttpMethod, HttpRequest, HttpResponse, OidcHttpClient};
pub use issuer_metadata::{IssuerMetadata, MtlsEndpoints};
pub use query_keystore::QueryKeyStore;
pub use registration::ClientRegistrationOptions;
pub use userinfo::{UserinfoOptions, UserinfoToken, UserinfoVia};
