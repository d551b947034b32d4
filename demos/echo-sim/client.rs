// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::network::SimNetwork;
use ::std::{
    collections::VecDeque,
    net::SocketAddrV4,
    time::{
        Duration,
        Instant,
    },
};
use ::tinytcp::{
    inetstack::protocols::tcp::header::verify_checksum,
    SeqNumber,
    TcpHeader,
};

//==============================================================================
// Constants
//==============================================================================

/// FIN retransmissions before the client stops waiting for the server's FIN.
const MAX_FIN_RETRIES: usize = 3;

//==============================================================================
// Structures
//==============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Connecting,
    Echoing,
    Closing,
    Done,
}

// Segment awaiting acknowledgement from the server.
struct Outstanding {
    bytes: Vec<u8>,
    end: SeqNumber,
    last_tx: Instant,
}

/// Stop-and-wait echo client: one message in flight, the next one goes out once the echo is complete and the
/// message is acknowledged. Retransmits on a fixed timeout.
pub struct ScriptedClient {
    local: SocketAddrV4,
    remote: SocketAddrV4,
    isn: SeqNumber,
    // Oldest sequence number the server has not acknowledged.
    send_una: SeqNumber,
    send_next: SeqNumber,
    // Unknown until the SYN+ACK arrives.
    recv_next: Option<SeqNumber>,
    rto: Duration,
    phase: Phase,
    outstanding: Option<Outstanding>,
    pending: VecDeque<Vec<u8>>,
    current: Vec<u8>,
    echoed: Vec<u8>,
    completed: usize,
    retransmissions: usize,
    fin_retries: usize,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl ScriptedClient {
    pub fn new(local: SocketAddrV4, remote: SocketAddrV4, isn: u32, messages: Vec<Vec<u8>>, rto: Duration) -> Self {
        let isn: SeqNumber = SeqNumber::from(isn);
        Self {
            local,
            remote,
            isn,
            send_una: isn,
            send_next: isn,
            recv_next: None,
            rto,
            phase: Phase::Connecting,
            outstanding: None,
            pending: messages.into(),
            current: Vec::new(),
            echoed: Vec::new(),
            completed: 0,
            retransmissions: 0,
            fin_retries: 0,
        }
    }

    /// Sends the SYN.
    pub fn start(&mut self, now: Instant, network: &SimNetwork) {
        let mut header: TcpHeader = self.header(self.send_next);
        header.syn = true;
        info!("client: connecting to {}", self.remote);
        self.transmit(header, &[], 1, now, network);
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Messages fully echoed back.
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn retransmissions(&self) -> usize {
        self.retransmissions
    }

    /// Handles one segment from the server.
    pub fn on_segment(&mut self, bytes: &[u8], now: Instant, network: &SimNetwork) {
        if !verify_checksum(bytes, self.remote.ip(), self.local.ip()) {
            warn!("client: dropping corrupted segment");
            return;
        }
        let (header, payload): (TcpHeader, &[u8]) = match TcpHeader::parse(bytes) {
            Ok(result) => result,
            Err(e) => {
                warn!("client: dropping malformed segment: {:?}", e);
                return;
            },
        };

        if header.syn {
            self.on_syn_ack(&header, now, network);
            return;
        }
        let mut recv_next: SeqNumber = match self.recv_next {
            Some(recv_next) => recv_next,
            None => return,
        };

        if header.ack {
            self.on_ack(header.ack_num);
        }

        if !payload.is_empty() {
            if header.seq_num == recv_next {
                self.echoed.extend_from_slice(payload);
                recv_next = recv_next + SeqNumber::from(payload.len() as u32);
                self.recv_next = Some(recv_next);
                trace!("client: received {} bytes", payload.len());
            } else {
                debug!("client: out-of-order segment seq={} (expected {})", header.seq_num, recv_next);
            }
            // Acknowledge whatever we have, including duplicates.
            self.send_ack(network);
        }

        if header.fin && header.seq_num + SeqNumber::from(payload.len() as u32) == recv_next {
            info!("client: server closed the connection");
            self.recv_next = Some(recv_next + SeqNumber::from(1));
            self.phase = Phase::Done;
            return;
        }

        self.make_progress(now, network);
    }

    /// Retransmits the outstanding segment once it has waited `rto`.
    pub fn on_tick(&mut self, now: Instant, network: &SimNetwork) {
        let timed_out: bool = match &self.outstanding {
            Some(outstanding) => now.saturating_duration_since(outstanding.last_tx) >= self.rto,
            None => false,
        };
        if !timed_out {
            return;
        }

        if self.phase == Phase::Closing {
            self.fin_retries += 1;
            if self.fin_retries > MAX_FIN_RETRIES {
                warn!("client: no FIN from the server, giving up");
                self.phase = Phase::Done;
                return;
            }
        }

        if let Some(outstanding) = self.outstanding.as_mut() {
            debug!("client: retransmitting up to seq={}", outstanding.end);
            network.send_to_server(outstanding.bytes.clone());
            outstanding.last_tx = now;
            self.retransmissions += 1;
        }
    }

    fn on_syn_ack(&mut self, header: &TcpHeader, now: Instant, network: &SimNetwork) {
        if self.phase != Phase::Connecting || !header.ack || header.ack_num != self.isn + SeqNumber::from(1) {
            debug!("client: ignoring stray SYN");
            return;
        }
        info!("client: connected (server isn={})", header.seq_num);
        self.recv_next = Some(header.seq_num + SeqNumber::from(1));
        self.on_ack(header.ack_num);
        self.phase = Phase::Echoing;
        self.make_progress(now, network);
    }

    fn on_ack(&mut self, ack_num: SeqNumber) {
        if ack_num > self.send_una && ack_num <= self.send_next {
            self.send_una = ack_num;
        }
        if let Some(outstanding) = &self.outstanding {
            if self.send_una >= outstanding.end {
                self.outstanding = None;
            }
        }
    }

    // Moves on to the next message, or to closing, once the current one is acknowledged and echoed.
    fn make_progress(&mut self, now: Instant, network: &SimNetwork) {
        if self.phase != Phase::Echoing || self.outstanding.is_some() || self.echoed.len() < self.current.len() {
            return;
        }
        if !self.current.is_empty() {
            if self.echoed != self.current {
                warn!("client: echo mismatch");
            }
            self.completed += 1;
            info!("client: message {} echoed", self.completed);
        }
        self.echoed.clear();

        match self.pending.pop_front() {
            Some(message) => {
                let header: TcpHeader = self.header(self.send_next);
                let len: u32 = message.len() as u32;
                self.transmit(header, &message, len, now, network);
                self.current = message;
            },
            None => {
                let mut header: TcpHeader = self.header(self.send_next);
                header.fin = true;
                info!("client: closing");
                self.transmit(header, &[], 1, now, network);
                self.current.clear();
                self.phase = Phase::Closing;
            },
        }
    }

    fn send_ack(&self, network: &SimNetwork) {
        // The server only takes segments at its receive point, which is our oldest unacknowledged byte.
        let header: TcpHeader = self.header(self.send_una);
        network.send_to_server(header.serialize(&[], self.local.ip(), self.remote.ip()));
    }

    fn transmit(&mut self, header: TcpHeader, payload: &[u8], len: u32, now: Instant, network: &SimNetwork) {
        let bytes: Vec<u8> = header.serialize(payload, self.local.ip(), self.remote.ip());
        network.send_to_server(bytes.clone());
        self.send_next = self.send_next + SeqNumber::from(len);
        self.outstanding = Some(Outstanding {
            bytes,
            end: self.send_next,
            last_tx: now,
        });
    }

    fn header(&self, seq: SeqNumber) -> TcpHeader {
        let mut header: TcpHeader = TcpHeader::new(self.local.port(), self.remote.port());
        header.seq_num = seq;
        if let Some(recv_next) = self.recv_next {
            header.ack = true;
            header.ack_num = recv_next;
        }
        header.window_size = 0xffff;
        header
    }
}
