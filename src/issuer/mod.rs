//! # Issuer module
//! The authorization server as seen by the relying party.

#[allow(clippy::module_inception)]
mod issuer;

pub(crate) mod keystore;

pub use issuer::Issuer;
