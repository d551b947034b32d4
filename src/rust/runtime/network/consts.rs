// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::time::Duration;

//======================================================================================================================
// Constants
//======================================================================================================================

/// Minimum MSS Parameter for TCP
pub const MIN_MSS: usize = 1;

/// Maximum MSS Parameter for TCP. A segment still has to fit in an IPv4 datagram along with both headers.
pub const MAX_MSS: usize = u16::MAX as usize - 40;

/// Default MSS Parameter for TCP (Ethernet MTU minus IPv4 and TCP headers).
pub const DEFAULT_MSS: usize = 1460;

/// Retransmission timeout used until the first RTT sample arrives.
/// See: https://www.rfc-editor.org/rfc/rfc6298#section-2.1
pub const DEFAULT_RTO: Duration = Duration::from_secs(1);

/// Receive window advertised in every segment. Flow control is not enforced.
pub const DEFAULT_RECEIVE_WINDOW_SIZE: u16 = 0xffff;
