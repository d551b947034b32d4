// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::network::consts::{
    DEFAULT_MSS,
    DEFAULT_RECEIVE_WINDOW_SIZE,
    DEFAULT_RTO,
    MAX_MSS,
    MIN_MSS,
};
use ::std::time::Duration;

//==============================================================================
// Structures
//==============================================================================

/// TCP Configuration Descriptor
#[derive(Clone, Debug)]
pub struct TcpConfig {
    /// Maximum Segment Size used to split outgoing data.
    mss: usize,
    /// Retransmission timeout before any RTT sample has been taken.
    initial_rto: Duration,
    /// Window Size
    receive_window_size: u16,
    /// Skip checksum validation of inbound segments?
    ignore_checksum: bool,
    /// Re-arm the retransmission timer (with back-off) after it fires?
    rearm_on_timeout: bool,
    /// Seed for initial sequence number generation.
    rng_seed: Option<u64>,
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate Functions for TCP Configuration Descriptor
impl TcpConfig {
    /// Creates a TCP Configuration Descriptor.
    pub fn new(
        mss: Option<usize>,
        initial_rto: Option<Duration>,
        receive_window_size: Option<u16>,
        ignore_checksum: Option<bool>,
        rearm_on_timeout: Option<bool>,
        rng_seed: Option<u64>,
    ) -> Self {
        let mut options = Self::default();

        if let Some(value) = mss {
            options = options.set_mss(value);
        }
        if let Some(value) = initial_rto {
            options = options.set_initial_rto(value);
        }
        if let Some(value) = receive_window_size {
            options.receive_window_size = value;
        }
        if let Some(value) = ignore_checksum {
            options.ignore_checksum = value;
        }
        if let Some(value) = rearm_on_timeout {
            options.rearm_on_timeout = value;
        }
        options.rng_seed = rng_seed;

        options
    }

    /// Gets the maximum segment size in the target [TcpConfig].
    pub fn get_mss(&self) -> usize {
        self.mss
    }

    /// Gets the initial retransmission timeout in the target [TcpConfig].
    pub fn get_initial_rto(&self) -> Duration {
        self.initial_rto
    }

    /// Gets the receiver window size in the target [TcpConfig].
    pub fn get_receive_window_size(&self) -> u16 {
        self.receive_window_size
    }

    /// Gets the option to skip checksum validation in the target [TcpConfig].
    pub fn get_ignore_checksum(&self) -> bool {
        self.ignore_checksum
    }

    /// Gets the retransmission timer re-arm option in the target [TcpConfig].
    pub fn get_rearm_on_timeout(&self) -> bool {
        self.rearm_on_timeout
    }

    /// Gets the seed for initial sequence numbers in the target [TcpConfig].
    pub fn get_rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }

    /// Sets the maximum segment size in the target [TcpConfig].
    fn set_mss(mut self, value: usize) -> Self {
        assert!(value >= MIN_MSS);
        assert!(value <= MAX_MSS);
        self.mss = value;
        self
    }

    /// Sets the initial retransmission timeout in the target [TcpConfig].
    fn set_initial_rto(mut self, value: Duration) -> Self {
        assert!(value > Duration::new(0, 0));
        self.initial_rto = value;
        self
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

/// Default Trait Implementation for TCP Configuration Descriptor
impl Default for TcpConfig {
    /// Creates a TCP Configuration Descriptor with the default values.
    fn default() -> Self {
        TcpConfig {
            mss: DEFAULT_MSS,
            initial_rto: DEFAULT_RTO,
            receive_window_size: DEFAULT_RECEIVE_WINDOW_SIZE,
            ignore_checksum: false,
            rearm_on_timeout: false,
            rng_seed: None,
        }
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
