// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.


use crate::{
    inetstack::{
        protocols::tcp::{
            connection::Connection,
            dispatcher::Dispatcher,
            header::{
                verify_checksum,
                TcpHeader,
            },
            SeqNumber,
        },
        test_helpers::{
            TestNetwork,
            TestPeer,
            BOB_IPV4,
            BOB_PORT,
        },
    },
    runtime::network::{
        config::TcpConfig,
        NetworkRuntime,
    },
};
use ::anyhow::Result;
use ::std::{
    cell::RefCell,
    net::Ipv4Addr,
    rc::Rc,
    time::Instant,
};

//=============================================================================

/// Payloads handed to a receive callback, in delivery order.
pub type Deliveries = Rc<RefCell<Vec<Vec<u8>>>>;

/// Creates a dispatcher listening on Bob's port, along with the network it transmits on.
pub fn new_dispatcher(now: Instant, tcp_config: TcpConfig) -> (Dispatcher, Rc<TestNetwork>) {
    let network: Rc<TestNetwork> = TestNetwork::new();
    let transport: Rc<dyn NetworkRuntime> = network.clone();
    (Dispatcher::new(BOB_PORT, transport, now, tcp_config), network)
}

/// Removes the next segment the server transmitted and decodes it.
pub fn pop_segment(network: &TestNetwork) -> Result<(TcpHeader, Vec<u8>, Ipv4Addr)> {
    let (bytes, dest): (Vec<u8>, Ipv4Addr) = match network.pop_segment() {
        Some(segment) => segment,
        None => anyhow::bail!("no segment was transmitted"),
    };
    crate::ensure_eq!(verify_checksum(&bytes, &BOB_IPV4, &dest), true);
    let (header, payload): (TcpHeader, &[u8]) = TcpHeader::parse(&bytes)?;
    Ok((header, payload.to_vec(), dest))
}

/// Delivers a segment from `peer` to the server.
pub fn deliver(dispatcher: &mut Dispatcher, peer: &TestPeer, segment: &[u8]) {
    dispatcher.receive(peer.ip(), BOB_IPV4, segment);
}

/// Runs the handshake for `peer` and returns the server's initial sequence number. The peer is left acknowledging
/// the SYN+ACK.
pub fn accept(dispatcher: &mut Dispatcher, network: &TestNetwork, peer: &mut TestPeer) -> Result<SeqNumber> {
    let syn: Vec<u8> = peer.syn();
    deliver(dispatcher, peer, &syn);

    let (header, payload, dest): (TcpHeader, Vec<u8>, Ipv4Addr) = pop_segment(network)?;
    crate::ensure_eq!(header.syn, true);
    crate::ensure_eq!(header.ack, true);
    crate::ensure_eq!(header.ack_num, peer.seq());
    crate::ensure_eq!(payload.is_empty(), true);
    crate::ensure_eq!(dest, peer.ip());

    peer.set_ack(header.seq_num + SeqNumber::from(1));
    Ok(header.seq_num)
}

/// Installs a receive callback on `connection` that records every delivery.
pub fn record_deliveries(connection: &mut Connection) -> Deliveries {
    let deliveries: Deliveries = Rc::new(RefCell::new(Vec::new()));
    let sink: Deliveries = deliveries.clone();
    connection.on_receive(move |_, payload| sink.borrow_mut().push(payload.to_vec()));
    deliveries
}

/// Connection accepted for `peer`. Fails the test if the dispatcher does not know it.
pub fn connection<'a>(dispatcher: &'a mut Dispatcher, peer: &TestPeer) -> Result<&'a mut Connection> {
    match dispatcher.connection_mut(&peer.id()) {
        Some(connection) => Ok(connection),
        None => anyhow::bail!("connection {} not found", peer.id()),
    }
}
