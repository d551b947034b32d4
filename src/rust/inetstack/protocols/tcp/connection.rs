// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    inetstack::protocols::tcp::{
        header::TcpHeader,
        rto::RtoCalculator,
        SeqNumber,
    },
    runtime::{
        fail::Fail,
        network::{
            config::TcpConfig,
            NetworkRuntime,
        },
        timer::{
            SharedTimer,
            TimerHandle,
        },
    },
};
use ::libc::ENOTCONN;
use ::std::{
    collections::VecDeque,
    fmt,
    net::{
        Ipv4Addr,
        SocketAddrV4,
    },
    rc::Rc,
    time::{
        Duration,
        Instant,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Identity of a connection: the remote endpoint and the local endpoint it was accepted on.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ConnectionId {
    remote: SocketAddrV4,
    local: SocketAddrV4,
}

/// Application hook invoked for every in-order delivery. A FIN is delivered as an empty payload.
pub type ReceiveCallback = Box<dyn FnMut(&mut Connection, &[u8])>;

// Entry of the retransmission queue.
struct UnackedSegment {
    // Checksummed segment exactly as first transmitted.
    bytes: Vec<u8>,
    seq: SeqNumber,
    len: u32,
    dest: Ipv4Addr,
    // Cleared once sampled or retransmitted, so each transmission yields at most one RTT sample.
    initial_tx: Option<Instant>,
}

/// One accepted connection. It is considered established from the moment the SYN+ACK is sent; there is no
/// representation of the other RFC 793 states.
///
/// Inbound segments only arrive through [`Dispatcher::receive`](super::dispatcher::Dispatcher::receive), which
/// checks the port and checksum first:
///
/// ```compile_fail
/// fn inject(connection: &mut tinytcp::Connection, header: &tinytcp::TcpHeader) {
///     connection.receive(header, &[]);
/// }
/// ```
pub struct Connection {
    id: ConnectionId,

    // Next sequence number to use for new data (SND.NXT).
    send_seq: SeqNumber,
    // Oldest unacknowledged sequence number (SND.UNA).
    base_seq: SeqNumber,
    // Next sequence number expected from the peer (RCV.NXT).
    recv_next: SeqNumber,

    // Segments sent but not yet cumulatively acknowledged, in transmission order.
    unacked_queue: VecDeque<UnackedSegment>,
    rto: RtoCalculator,
    // Armed for the head of `unacked_queue`.
    retransmit_timer: Option<TimerHandle>,

    on_receive: Option<ReceiveCallback>,
    closed: bool,

    transport: Rc<dyn NetworkRuntime>,
    clock: SharedTimer<ConnectionId>,
    tcp_config: TcpConfig,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl ConnectionId {
    pub fn new(remote: SocketAddrV4, local: SocketAddrV4) -> Self {
        Self { remote, local }
    }

    pub fn remote(&self) -> SocketAddrV4 {
        self.remote
    }

    pub fn local(&self) -> SocketAddrV4 {
        self.local
    }
}

impl Connection {
    pub(super) fn new(
        id: ConnectionId,
        local_isn: SeqNumber,
        remote_isn: SeqNumber,
        transport: Rc<dyn NetworkRuntime>,
        clock: SharedTimer<ConnectionId>,
        tcp_config: TcpConfig,
    ) -> Self {
        Self {
            id,
            send_seq: local_isn,
            base_seq: local_isn,
            recv_next: remote_isn + SeqNumber::from(1),
            unacked_queue: VecDeque::new(),
            rto: RtoCalculator::new(tcp_config.get_initial_rto()),
            retransmit_timer: None,
            on_receive: None,
            closed: false,
            transport,
            clock,
            tcp_config,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send_seq(&self) -> SeqNumber {
        self.send_seq
    }

    pub fn base_seq(&self) -> SeqNumber {
        self.base_seq
    }

    pub fn recv_next(&self) -> SeqNumber {
        self.recv_next
    }

    /// Number of segments awaiting acknowledgement.
    pub fn unacked_len(&self) -> usize {
        self.unacked_queue.len()
    }

    /// Smoothed RTT in seconds, once a sample has been taken.
    pub fn rtt_estimate(&self) -> Option<f64> {
        self.rto.estimate()
    }

    /// RTT deviation in seconds, once a sample has been taken.
    pub fn rtt_deviation(&self) -> Option<f64> {
        self.rto.deviation()
    }

    pub fn timeout_interval(&self) -> Duration {
        self.rto.rto()
    }

    pub fn has_retransmit_timer(&self) -> bool {
        self.retransmit_timer.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Registers the handler for in-order payload and FIN deliveries, replacing any previous one.
    pub fn on_receive<F>(&mut self, callback: F)
    where
        F: FnMut(&mut Connection, &[u8]) + 'static,
    {
        self.on_receive = Some(Box::new(callback));
    }

    /// Answers the peer's SYN. The SYN+ACK consumes one sequence number and is never retransmitted.
    pub(super) fn send_syn_ack(&mut self) {
        let mut header: TcpHeader = self.tcp_header();
        header.syn = true;
        debug!("{}: sending SYN+ACK seq={} ack={}", self, header.seq_num, header.ack_num);
        self.emit(&header, &[]);

        self.send_seq = self.send_seq + SeqNumber::from(1);
        self.base_seq = self.send_seq;
    }

    /// Handles a segment routed here by the dispatcher. Only the segment carrying exactly `recv_next` is accepted;
    /// anything else, including retransmitted duplicates, is dropped without acknowledgement.
    pub(super) fn receive(&mut self, header: &TcpHeader, payload: &[u8]) {
        if self.closed {
            debug!("{}: dropping segment for closed connection", self);
            return;
        }
        if header.seq_num != self.recv_next {
            debug!(
                "{}: dropping out-of-order segment (seq={}, expected={})",
                self, header.seq_num, self.recv_next
            );
            return;
        }

        if header.ack && header.ack_num > self.base_seq {
            self.process_ack(header.ack_num);
        }

        if header.fin {
            // Data riding on the FIN precedes it in sequence space.
            if !payload.is_empty() {
                self.recv_next = self.recv_next + SeqNumber::from(payload.len() as u32);
                self.deliver(payload);
            }
            debug!("{}: received FIN", self);
            self.recv_next = self.recv_next + SeqNumber::from(1);
            self.deliver(&[]);
            self.send_ack();
        } else if !payload.is_empty() {
            self.recv_next = self.recv_next + SeqNumber::from(payload.len() as u32);
            self.deliver(payload);
            self.send_ack();
        }
    }

    /// Sends `data` right away, split into MSS-sized segments. There is no send window.
    pub fn send(&mut self, data: &[u8]) -> Result<(), Fail> {
        if self.closed {
            let cause: String = format!("{}: connection is closed", self);
            warn!("send(): {}", cause);
            return Err(Fail::new(ENOTCONN, &cause));
        }

        let now: Instant = self.clock.now();
        for chunk in data.chunks(self.tcp_config.get_mss()) {
            let len: u32 = chunk.len() as u32;
            let mut header: TcpHeader = self.tcp_header();
            header.seq_num = self.send_seq;
            trace!("{}: sending seq={} len={}", self, self.send_seq, len);
            let bytes: Vec<u8> = self.emit(&header, chunk);

            self.unacked_queue.push_back(UnackedSegment {
                bytes,
                seq: self.send_seq,
                len,
                dest: *self.id.remote.ip(),
                initial_tx: Some(now),
            });

            // Start the retransmission timer if it isn't already running.
            if self.retransmit_timer.is_none() {
                self.arm_retransmit_timer();
            }

            self.send_seq = self.send_seq + SeqNumber::from(len);
        }
        Ok(())
    }

    /// Handles expiration of the retransmission timer: resends the oldest unacknowledged segment verbatim.
    pub fn retransmit_timeout(&mut self) {
        // The timer that got us here is spent.
        self.retransmit_timer = None;
        if self.closed {
            return;
        }

        let head: &mut UnackedSegment = match self.unacked_queue.front_mut() {
            Some(head) => head,
            None => return,
        };
        info!("{}: retransmission timeout, resending seq={} len={}", self.id, head.seq, head.len);
        self.transport.transmit(head.bytes.clone(), head.dest);
        head.initial_tx = None;

        if self.tcp_config.get_rearm_on_timeout() {
            self.rto.back_off();
            self.arm_retransmit_timer();
        }
    }

    /// Sends a FIN and marks the connection closed. The dispatcher forgets it right away: there is no wait for the
    /// peer's acknowledgement, no TIME-WAIT, and unacknowledged data is abandoned. Not RFC 793 compliant.
    pub fn close(&mut self) {
        if self.closed {
            debug!("{}: already closed", self);
            return;
        }

        let mut header: TcpHeader = self.tcp_header();
        header.fin = true;
        debug!("{}: sending FIN seq={} ack={}", self, header.seq_num, header.ack_num);
        self.emit(&header, &[]);
        self.send_seq = self.send_seq + SeqNumber::from(1);

        self.cancel_retransmit_timer();
        self.closed = true;
        info!("{}: closed ({} segments unacknowledged)", self, self.unacked_queue.len());
    }

    pub(super) fn cancel_retransmit_timer(&mut self) {
        if let Some(handle) = self.retransmit_timer.take() {
            self.clock.cancel(handle);
        }
    }

    // Slides the cumulative-ack floor up to `ack_num` and retires every segment it covers.
    fn process_ack(&mut self, ack_num: SeqNumber) {
        if ack_num > self.send_seq {
            warn!("{}: ignoring ACK for unsent data (ack={}, send_seq={})", self, ack_num, self.send_seq);
            return;
        }
        self.base_seq = ack_num;

        // Karn's algorithm: retransmitted segments are not sampled. Taking the send time also keeps a head that is
        // only partly acknowledged from being sampled a second time.
        if let Some(initial_tx) = self.unacked_queue.front_mut().and_then(|segment| segment.initial_tx.take()) {
            let now: Instant = self.clock.now();
            self.rto.add_sample(now.saturating_duration_since(initial_tx));
        }

        self.cancel_retransmit_timer();
        while let Some(segment) = self.unacked_queue.front() {
            if segment.seq + SeqNumber::from(segment.len) > ack_num {
                break;
            }
            self.unacked_queue.pop_front();
        }

        if !self.unacked_queue.is_empty() {
            self.arm_retransmit_timer();
        }
    }

    fn arm_retransmit_timer(&mut self) {
        self.cancel_retransmit_timer();
        let rto: Duration = self.rto.rto();
        self.retransmit_timer = Some(self.clock.arm(rto, self.id));
    }

    fn deliver(&mut self, payload: &[u8]) {
        match self.on_receive.take() {
            Some(mut callback) => {
                callback(self, payload);
                // Keep a handler installed from within the callback.
                if self.on_receive.is_none() {
                    self.on_receive = Some(callback);
                }
            },
            None => warn!("{}: no receive handler, dropping {} bytes", self, payload.len()),
        }
    }

    fn send_ack(&mut self) {
        // A FIN sent from within the receive handler already carries this acknowledgement.
        if self.closed {
            return;
        }
        let header: TcpHeader = self.tcp_header();
        trace!("{}: sending ACK ack={}", self, header.ack_num);
        self.emit(&header, &[]);
    }

    // Header for the next segment: current sequence and acknowledgement numbers with ACK set.
    fn tcp_header(&self) -> TcpHeader {
        let mut header: TcpHeader = TcpHeader::new(self.id.local.port(), self.id.remote.port());
        header.seq_num = self.send_seq;
        header.ack_num = self.recv_next;
        header.ack = true;
        header.window_size = self.tcp_config.get_receive_window_size();
        header
    }

    fn emit(&self, header: &TcpHeader, payload: &[u8]) -> Vec<u8> {
        let bytes: Vec<u8> = header.serialize(payload, self.id.local.ip(), self.id.remote.ip());
        self.transport.transmit(bytes.clone(), *self.id.remote.ip());
        bytes
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.remote, self.local)
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("send_seq", &self.send_seq)
            .field("base_seq", &self.base_seq)
            .field("recv_next", &self.recv_next)
            .field("unacked", &self.unacked_queue.len())
            .field("rto", &self.rto)
            .field("retransmit_timer", &self.retransmit_timer)
            .field("closed", &self.closed)
            .finish()
    }
}
