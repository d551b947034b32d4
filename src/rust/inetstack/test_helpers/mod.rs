// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::{
    inetstack::protocols::tcp::{
        connection::ConnectionId,
        header::TcpHeader,
        SeqNumber,
    },
    runtime::{
        logging,
        network::NetworkRuntime,
    },
};
use ::std::{
    cell::RefCell,
    collections::VecDeque,
    net::{
        Ipv4Addr,
        SocketAddrV4,
    },
    rc::Rc,
};

//==============================================================================
// Constants
//==============================================================================

pub const ALICE_IPV4: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
pub const ALICE_PORT: u16 = 49152;
pub const BOB_IPV4: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 2);
pub const BOB_PORT: u16 = 80;
pub const CARRIE_IPV4: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 3);
pub const CARRIE_PORT: u16 = 50000;

//==============================================================================
// Structures
//==============================================================================

/// Datagram layer that never delivers anything: transmitted segments are queued for inspection.
pub struct TestNetwork {
    outgoing: RefCell<VecDeque<(Vec<u8>, Ipv4Addr)>>,
}

/// Client side of a connection, scripted by hand. Keeps track of its own sequence number so tests only have to care
/// about what the server sends back.
pub struct TestPeer {
    local: SocketAddrV4,
    remote: SocketAddrV4,
    seq: SeqNumber,
    ack: SeqNumber,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl TestNetwork {
    pub fn new() -> Rc<Self> {
        logging::initialize();
        Rc::new(Self {
            outgoing: RefCell::new(VecDeque::new()),
        })
    }

    /// Removes the oldest transmitted segment.
    pub fn pop_segment(&self) -> Option<(Vec<u8>, Ipv4Addr)> {
        self.outgoing.borrow_mut().pop_front()
    }

    pub fn pop_all_segments(&self) -> Vec<(Vec<u8>, Ipv4Addr)> {
        self.outgoing.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.outgoing.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.borrow().is_empty()
    }
}

impl TestPeer {
    /// Alice talking to Bob's listening port.
    pub fn alice(isn: u32) -> Self {
        Self::new(SocketAddrV4::new(ALICE_IPV4, ALICE_PORT), isn)
    }

    /// Carrie talking to Bob's listening port.
    pub fn carrie(isn: u32) -> Self {
        Self::new(SocketAddrV4::new(CARRIE_IPV4, CARRIE_PORT), isn)
    }

    pub fn new(local: SocketAddrV4, isn: u32) -> Self {
        Self {
            local,
            remote: SocketAddrV4::new(BOB_IPV4, BOB_PORT),
            seq: SeqNumber::from(isn),
            ack: SeqNumber::from(0),
        }
    }

    /// Identity of this peer's connection as seen by the server.
    pub fn id(&self) -> ConnectionId {
        ConnectionId::new(self.local, self.remote)
    }

    pub fn ip(&self) -> Ipv4Addr {
        *self.local.ip()
    }

    pub fn seq(&self) -> SeqNumber {
        self.seq
    }

    /// Sets the acknowledgement number carried by subsequent segments.
    pub fn set_ack(&mut self, ack: SeqNumber) {
        self.ack = ack;
    }

    pub fn syn(&mut self) -> Vec<u8> {
        let mut header: TcpHeader = self.header(self.seq);
        header.syn = true;
        header.ack = false;
        self.seq = self.seq + SeqNumber::from(1);
        self.serialize(&header, &[])
    }

    /// Data segment at the current sequence number, acknowledging `ack`.
    pub fn data(&mut self, payload: &[u8]) -> Vec<u8> {
        let header: TcpHeader = self.header(self.seq);
        self.seq = self.seq + SeqNumber::from(payload.len() as u32);
        self.serialize(&header, payload)
    }

    /// Data segment at an arbitrary sequence number. Does not advance the peer.
    pub fn data_at(&self, seq: SeqNumber, payload: &[u8]) -> Vec<u8> {
        let header: TcpHeader = self.header(seq);
        self.serialize(&header, payload)
    }

    pub fn pure_ack(&mut self, ack: SeqNumber) -> Vec<u8> {
        self.ack = ack;
        let header: TcpHeader = self.header(self.seq);
        self.serialize(&header, &[])
    }

    pub fn fin(&mut self) -> Vec<u8> {
        let mut header: TcpHeader = self.header(self.seq);
        header.fin = true;
        self.seq = self.seq + SeqNumber::from(1);
        self.serialize(&header, &[])
    }

    fn header(&self, seq: SeqNumber) -> TcpHeader {
        let mut header: TcpHeader = TcpHeader::new(self.local.port(), self.remote.port());
        header.seq_num = seq;
        header.ack_num = self.ack;
        header.ack = true;
        header.window_size = 0xffff;
        header
    }

    fn serialize(&self, header: &TcpHeader, payload: &[u8]) -> Vec<u8> {
        header.serialize(payload, self.local.ip(), self.remote.ip())
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl NetworkRuntime for TestNetwork {
    fn transmit(&self, segment: Vec<u8>, dest: Ipv4Addr) {
        self.outgoing.borrow_mut().push_back((segment, dest));
    }
}
