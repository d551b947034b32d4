// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod config;
pub mod consts;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::net::Ipv4Addr;

//======================================================================================================================
// Traits
//======================================================================================================================

/// API for the unreliable datagram layer underneath the transport. Delivery is best effort: segments may be dropped,
/// duplicated, or reordered, and transmission never reports back.
pub trait NetworkRuntime {
    /// Transmits a single checksummed segment to `dest`.
    fn transmit(&self, segment: Vec<u8>, dest: Ipv4Addr);
}
