// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use ::std::time::Duration;

// TCP Retransmission Timeout (RTO) Calculator.
// Jacobson/Karels estimator as in RFC 6298, except that the variance update uses the freshly smoothed RTT and the
// timeout is not clamped to the RFC bounds.

#[derive(Debug)]
pub struct RtoCalculator {
    // Smoothed round-trip time, in seconds. `None` until the first sample.
    srtt: Option<f64>,

    // Round-trip time variation, in seconds. `None` until the first sample.
    rttvar: Option<f64>,

    // Retransmission timeout, in seconds.
    rto: f64,
}

// Weight of a new sample in the smoothed RTT.
const ALPHA: f64 = 0.125;
// Weight of a new deviation in the RTT variation.
const BETA: f64 = 0.25;
// Upper bound applied only when backing off.
const MAX_BACKOFF_SEC: f64 = 60.0;

impl RtoCalculator {
    /// Initializes an RTO Calculator that times out after `initial_rto` until a sample arrives.
    pub fn new(initial_rto: Duration) -> Self {
        Self {
            srtt: None,
            rttvar: None,
            rto: initial_rto.as_secs_f64(),
        }
    }

    /// Adds an RTT sample to the calculator.
    pub fn add_sample(&mut self, rtt: Duration) {
        let rtt: f64 = rtt.as_secs_f64();

        let (srtt, rttvar): (f64, f64) = match (self.srtt, self.rttvar) {
            (Some(srtt), Some(rttvar)) => {
                let srtt: f64 = (1.0 - ALPHA) * srtt + ALPHA * rtt;
                let rttvar: f64 = (1.0 - BETA) * rttvar + BETA * (rtt - srtt).abs();
                (srtt, rttvar)
            },
            _ => (rtt, rtt / 2.0),
        };

        self.srtt = Some(srtt);
        self.rttvar = Some(rttvar);
        self.rto = srtt + 4.0 * rttvar;
        trace!("rtt sample={:?} srtt={:?} rttvar={:?} rto={:?}", rtt, srtt, rttvar, self.rto);
    }

    /// Performs an exponential "back off" of the RTO (doubles the current timeout).
    pub fn back_off(&mut self) {
        self.rto = (self.rto * 2.0).min(MAX_BACKOFF_SEC);
    }

    /// Gets the current RTO value.
    pub fn rto(&self) -> Duration {
        Duration::from_secs_f64(self.rto)
    }

    /// Gets the smoothed RTT in seconds, if a sample was taken.
    pub fn estimate(&self) -> Option<f64> {
        self.srtt
    }

    /// Gets the RTT variation in seconds, if a sample was taken.
    pub fn deviation(&self) -> Option<f64> {
        self.rttvar
    }
}
