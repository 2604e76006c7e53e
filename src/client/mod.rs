//! # Client module
//! The relying party client and its flows.

#[allow(clippy::module_inception)]
mod client;

mod claims;

/// Read accessors of the normalized client metadata
pub mod client_get_set;

/// Protocol operation implementations
pub mod client_impl;

/// Handle returned from [`Client::device_authorization_async()`]
pub mod device_flow_handle;

pub(super) mod helpers;

pub use client::Client;
pub use device_flow_handle::DeviceFlowHandle;
