// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::std::{
    cell::RefCell,
    collections::VecDeque,
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
use ::tinytcp::{
    inetstack::protocols::tcp::header::verify_checksum,
    Config,
    Connection,
    ConnectionId,
    Dispatcher,
    NetworkRuntime,
    SeqNumber,
    TcpConfig,
    TcpHeader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

const CLIENT_IPV4: Ipv4Addr = Ipv4Addr::new(172, 16, 0, 1);
const CLIENT_PORT: u16 = 40000;
const SERVER_IPV4: Ipv4Addr = Ipv4Addr::new(172, 16, 0, 2);
const SERVER_PORT: u16 = 7;

const CONFIG: &str = r#"
tinytcp:
  local_ipv4_addr: "172.16.0.2"
  local_port: 7
  mss: 8
  initial_rto_ms: 500
  rng_seed: 2024
"#;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Loopback wire: whatever the server transmits is queued for the test to read.
#[derive(Default)]
struct Wire {
    segments: RefCell<VecDeque<(Vec<u8>, Ipv4Addr)>>,
}

impl NetworkRuntime for Wire {
    fn transmit(&self, segment: Vec<u8>, dest: Ipv4Addr) {
        self.segments.borrow_mut().push_back((segment, dest));
    }
}

impl Wire {
    fn pop(&self) -> Result<(TcpHeader, Vec<u8>)> {
        let (bytes, dest): (Vec<u8>, Ipv4Addr) = match self.segments.borrow_mut().pop_front() {
            Some(segment) => segment,
            None => anyhow::bail!("server sent nothing"),
        };
        tinytcp::ensure_eq!(dest, CLIENT_IPV4);
        tinytcp::ensure_eq!(verify_checksum(&bytes, &SERVER_IPV4, &CLIENT_IPV4), true);
        let (header, payload): (TcpHeader, &[u8]) = TcpHeader::parse(&bytes)?;
        Ok((header, payload.to_vec()))
    }

    fn is_empty(&self) -> bool {
        self.segments.borrow().is_empty()
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn client_segment(seq: SeqNumber, ack: Option<SeqNumber>, syn: bool, fin: bool, payload: &[u8]) -> Vec<u8> {
    let mut header: TcpHeader = TcpHeader::new(CLIENT_PORT, SERVER_PORT);
    header.seq_num = seq;
    header.syn = syn;
    header.fin = fin;
    if let Some(ack) = ack {
        header.ack = true;
        header.ack_num = ack;
    }
    header.window_size = 1024;
    header.serialize(payload, &CLIENT_IPV4, &SERVER_IPV4)
}

/// Echo server: every payload is sent back, and the peer's FIN is answered with our own.
fn echo_server(now: Instant, wire: Rc<Wire>, tcp_config: TcpConfig) -> Dispatcher {
    let transport: Rc<dyn NetworkRuntime> = wire;
    let mut dispatcher: Dispatcher = Dispatcher::new(SERVER_PORT, transport, now, tcp_config);
    dispatcher.on_accept(|connection: &mut Connection| {
        connection.on_receive(|connection: &mut Connection, payload: &[u8]| {
            if payload.is_empty() {
                connection.close();
            } else if let Err(e) = connection.send(payload) {
                panic!("echo failed: {:?}", e);
            }
        });
    });
    dispatcher
}

//======================================================================================================================
// Tests
//======================================================================================================================

/// Full conversation with an echo server: handshake, segmented echo, loss recovery, and teardown.
#[test]
fn echo_conversation() -> Result<()> {
    let config: Config = Config::parse(CONFIG)?;
    let tcp_config: TcpConfig = config.tcp_config()?;
    tinytcp::ensure_eq!(config.local_port()?, SERVER_PORT);
    tinytcp::ensure_eq!(config.local_ipv4_addr()?, SERVER_IPV4);

    let mut now: Instant = Instant::now();
    let wire: Rc<Wire> = Rc::new(Wire::default());
    let mut server: Dispatcher = echo_server(now, wire.clone(), tcp_config);
    let id: ConnectionId = ConnectionId::new(
        SocketAddrV4::new(CLIENT_IPV4, CLIENT_PORT),
        SocketAddrV4::new(SERVER_IPV4, SERVER_PORT),
    );

    // Handshake.
    let client_isn: SeqNumber = SeqNumber::from(9000);
    server.receive(
        CLIENT_IPV4,
        SERVER_IPV4,
        &client_segment(client_isn, None, true, false, &[]),
    );
    let (syn_ack, _): (TcpHeader, Vec<u8>) = wire.pop()?;
    tinytcp::ensure_eq!(syn_ack.syn && syn_ack.ack, true);
    tinytcp::ensure_eq!(syn_ack.ack_num, client_isn + SeqNumber::from(1));
    tinytcp::ensure_eq!(server.connection_ids(), vec![id]);

    let mut client_seq: SeqNumber = client_isn + SeqNumber::from(1);
    let mut server_seq: SeqNumber = syn_ack.seq_num + SeqNumber::from(1);

    // Twelve bytes come back as an 8-byte and a 4-byte segment, followed by the pure ACK.
    let message: &[u8] = b"hello, echo!";
    server.receive(
        CLIENT_IPV4,
        SERVER_IPV4,
        &client_segment(client_seq, Some(server_seq), false, false, message),
    );
    client_seq = client_seq + SeqNumber::from(message.len() as u32);

    let (first, first_payload): (TcpHeader, Vec<u8>) = wire.pop()?;
    let (second, second_payload): (TcpHeader, Vec<u8>) = wire.pop()?;
    let (ack, ack_payload): (TcpHeader, Vec<u8>) = wire.pop()?;
    tinytcp::ensure_eq!(first.seq_num, server_seq);
    tinytcp::ensure_eq!(first_payload, b"hello, e".to_vec());
    tinytcp::ensure_eq!(second.seq_num, server_seq + SeqNumber::from(8));
    tinytcp::ensure_eq!(second_payload, b"cho!".to_vec());
    tinytcp::ensure_eq!(ack_payload.is_empty(), true);
    tinytcp::ensure_eq!(ack.ack_num, client_seq);
    tinytcp::ensure_eq!(wire.is_empty(), true);

    // The client only got the first segment. After the timeout the head is resent; acknowledging it leaves the
    // second segment for the next timeout.
    now += Duration::from_millis(500);
    server.advance_clock(now);
    let (resent, resent_payload): (TcpHeader, Vec<u8>) = wire.pop()?;
    tinytcp::ensure_eq!(resent.seq_num, server_seq);
    tinytcp::ensure_eq!(resent_payload, b"hello, e".to_vec());

    server.receive(
        CLIENT_IPV4,
        SERVER_IPV4,
        &client_segment(client_seq, Some(server_seq + SeqNumber::from(8)), false, false, &[]),
    );
    tinytcp::ensure_eq!(wire.is_empty(), true);
    match server.connection(&id) {
        Some(connection) => {
            tinytcp::ensure_eq!(connection.unacked_len(), 1);
            tinytcp::ensure_eq!(connection.rtt_estimate(), None);
        },
        None => anyhow::bail!("connection vanished"),
    }

    now += Duration::from_millis(500);
    server.advance_clock(now);
    let (resent, resent_payload): (TcpHeader, Vec<u8>) = wire.pop()?;
    tinytcp::ensure_eq!(resent.seq_num, second.seq_num);
    tinytcp::ensure_eq!(resent_payload, b"cho!".to_vec());
    server_seq = server_seq + SeqNumber::from(message.len() as u32);

    // Client hangs up; the server answers with its own FIN and forgets the connection.
    server.receive(
        CLIENT_IPV4,
        SERVER_IPV4,
        &client_segment(client_seq, Some(server_seq), false, true, &[]),
    );
    let (fin, _): (TcpHeader, Vec<u8>) = wire.pop()?;
    tinytcp::ensure_eq!(fin.fin, true);
    tinytcp::ensure_eq!(fin.seq_num, server_seq);
    tinytcp::ensure_eq!(fin.ack_num, client_seq + SeqNumber::from(1));
    tinytcp::ensure_eq!(wire.is_empty(), true);
    tinytcp::ensure_eq!(server.is_empty(), true);
    tinytcp::ensure_eq!(server.connection(&id).is_none(), true);
    tinytcp::ensure_eq!(server.next_timeout(), None);
    Ok(())
}

/// Foreign traffic never creates state or replies.
#[test]
fn foreign_segments_ignored() -> Result<()> {
    let wire: Rc<Wire> = Rc::new(Wire::default());
    let mut server: Dispatcher = echo_server(Instant::now(), wire.clone(), TcpConfig::default());

    // Wrong port.
    let mut header: TcpHeader = TcpHeader::new(CLIENT_PORT, SERVER_PORT + 1);
    header.syn = true;
    server.receive(CLIENT_IPV4, SERVER_IPV4, &header.serialize(&[], &CLIENT_IPV4, &SERVER_IPV4));

    // Checksum computed for another source.
    let spoofed: Vec<u8> = client_segment(SeqNumber::from(1), None, true, false, &[]);
    server.receive(Ipv4Addr::new(10, 9, 8, 7), SERVER_IPV4, &spoofed);

    // Garbage.
    server.receive(CLIENT_IPV4, SERVER_IPV4, b"not a tcp segment");

    // Data without a handshake.
    server.receive(
        CLIENT_IPV4,
        SERVER_IPV4,
        &client_segment(SeqNumber::from(5), Some(SeqNumber::from(5)), false, false, b"hi"),
    );

    tinytcp::ensure_eq!(wire.is_empty(), true);
    tinytcp::ensure_eq!(server.len(), 0);
    Ok(())
}
