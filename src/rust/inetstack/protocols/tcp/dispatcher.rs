// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    inetstack::protocols::tcp::{
        connection::{
            Connection,
            ConnectionId,
        },
        header::{
            verify_checksum,
            TcpHeader,
        },
        isn_generator::IsnGenerator,
        SeqNumber,
    },
    runtime::{
        fail::Fail,
        network::{
            config::TcpConfig,
            NetworkRuntime,
        },
        timer::SharedTimer,
    },
};
use ::libc::ENOTCONN;
use ::std::{
    collections::HashMap,
    net::{
        Ipv4Addr,
        SocketAddrV4,
    },
    rc::Rc,
    time::Instant,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Application hook invoked once per accepted connection, right after the SYN+ACK goes out.
pub type AcceptCallback = Box<dyn FnMut(&mut Connection)>;

/// Passive-open endpoint bound to one local port. Owns every connection accepted on it and drives their timers.
pub struct Dispatcher {
    local_port: u16,
    connections: HashMap<ConnectionId, Connection>,
    isn_generator: IsnGenerator,
    on_accept: Option<AcceptCallback>,
    transport: Rc<dyn NetworkRuntime>,
    clock: SharedTimer<ConnectionId>,
    tcp_config: TcpConfig,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Dispatcher {
    pub fn new(local_port: u16, transport: Rc<dyn NetworkRuntime>, now: Instant, tcp_config: TcpConfig) -> Self {
        Self {
            local_port,
            connections: HashMap::new(),
            isn_generator: IsnGenerator::new(tcp_config.get_rng_seed()),
            on_accept: None,
            transport,
            clock: SharedTimer::new(now),
            tcp_config,
        }
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Registers the handler for new connections, replacing any previous one.
    pub fn on_accept<F>(&mut self, callback: F)
    where
        F: FnMut(&mut Connection) + 'static,
    {
        self.on_accept = Some(Box::new(callback));
    }

    /// Handles one segment delivered by the datagram layer. Segments that cannot be attributed to a connection are
    /// dropped here and never reach the application.
    pub fn receive(&mut self, src_ipv4_addr: Ipv4Addr, dst_ipv4_addr: Ipv4Addr, buf: &[u8]) {
        let (header, payload): (TcpHeader, &[u8]) = match TcpHeader::parse(buf) {
            Ok(result) => result,
            Err(e) => {
                warn!("dropping malformed segment from {}: {:?}", src_ipv4_addr, e);
                return;
            },
        };

        if header.dst_port != self.local_port {
            trace!(
                "dropping segment for port {} (listening on {})",
                header.dst_port,
                self.local_port
            );
            return;
        }

        if !self.tcp_config.get_ignore_checksum() && !verify_checksum(buf, &src_ipv4_addr, &dst_ipv4_addr) {
            warn!("dropping segment from {}:{} with bad checksum", src_ipv4_addr, header.src_port);
            return;
        }

        let id: ConnectionId = ConnectionId::new(
            SocketAddrV4::new(src_ipv4_addr, header.src_port),
            SocketAddrV4::new(dst_ipv4_addr, header.dst_port),
        );

        self.purge_closed();
        if header.syn {
            self.handle_syn(id, header.seq_num);
        } else if let Some(connection) = self.connections.get_mut(&id) {
            connection.receive(&header, payload);
        } else {
            warn!("dropping segment for unknown connection {}", id);
        }
        self.purge_closed();
    }

    /// Moves the clock forward and fires every retransmission timer that expired on the way.
    pub fn advance_clock(&mut self, now: Instant) {
        for id in self.clock.advance_clock(now) {
            match self.connections.get_mut(&id) {
                Some(connection) => connection.retransmit_timeout(),
                None => debug!("retransmission timer fired for forgotten connection {}", id),
            }
        }
        self.purge_closed();
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Earliest instant at which `advance_clock` has work to do.
    pub fn next_timeout(&self) -> Option<Instant> {
        self.clock.next_expiry()
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id).filter(|connection| !connection.is_closed())
    }

    pub fn connection_mut(&mut self, id: &ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(id).filter(|connection| !connection.is_closed())
    }

    /// Closes a connection on behalf of the application and forgets it.
    pub fn close(&mut self, id: &ConnectionId) -> Result<(), Fail> {
        match self.connection_mut(id) {
            Some(connection) => connection.close(),
            None => {
                let cause: String = format!("unknown connection {}", id);
                warn!("close(): {}", cause);
                return Err(Fail::new(ENOTCONN, &cause));
            },
        }
        self.purge_closed();
        Ok(())
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|connection| !connection.is_closed())
            .map(|connection| connection.id())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.values().filter(|connection| !connection.is_closed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Accepts a connection request. A SYN for an identity we already know starts over with a fresh connection.
    fn handle_syn(&mut self, id: ConnectionId, remote_isn: SeqNumber) {
        if let Some(mut old) = self.connections.remove(&id) {
            info!("{}: SYN for existing connection, replacing it", id);
            old.cancel_retransmit_timer();
        }

        let local_isn: SeqNumber = self.isn_generator.generate();
        info!("{}: accepting connection (isn={}, peer isn={})", id, local_isn, remote_isn);
        let mut connection: Connection = Connection::new(
            id,
            local_isn,
            remote_isn,
            self.transport.clone(),
            self.clock.clone(),
            self.tcp_config.clone(),
        );
        connection.send_syn_ack();
        self.connections.insert(id, connection);

        if let (Some(callback), Some(connection)) = (self.on_accept.as_mut(), self.connections.get_mut(&id)) {
            callback(connection);
        }
    }

    fn purge_closed(&mut self) {
        self.connections.retain(|id, connection| {
            if connection.is_closed() {
                debug!("{}: removing closed connection", id);
                false
            } else {
                true
            }
        });
    }
}
