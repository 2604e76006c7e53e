//! # openid-rp
//! An OpenID Connect / OAuth 2.0 Relying Party client: authorization request
//! construction, callback validation, ID Token verification, client
//! authentication, token grants, userinfo, device authorization and dynamic
//! registration.
//!
//! The HTTP transport is pluggable through [types::OidcHttpClient]; a
//! reqwest backed [http_client::DefaultHttpClient] is included.

#![deny(missing_docs)]

/// Request dispatch internals
mod http;

pub(crate) mod helpers;

/// The relying party client
pub mod client;

/// The default HTTP client
pub mod http_client;

/// The authorization server as seen by the client
pub mod issuer;

/// JWK set container
pub mod jwks;

/// Token container
pub mod tokenset;

/// Parameter, metadata and error types
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{Client, DeviceFlowHandle};
pub use http_client::DefaultHttpClient;
pub use helpers::{
    code_challenge, decode_jwt, generate_code_verifier, generate_nonce, generate_random,
    generate_state, now,
};
pub use issuer::Issuer;
pub use jwks::Jwks;
pub use tokenset::{TokenSet, TokenSetParams};
pub use types::{
    AuthorizationParameters, CallbackParams, ClientMetadata, IssuerMetadata, OidcError,
    OidcReturn,
};
