// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::rand::{
    prelude::SmallRng,
    Rng,
    SeedableRng,
};
use ::std::{
    cell::{
        Cell,
        RefCell,
    },
    collections::VecDeque,
    net::Ipv4Addr,
};
use ::tinytcp::NetworkRuntime;

//==============================================================================
// Structures
//==============================================================================

/// In-memory datagram network between one client and one server. Each segment is dropped independently with a
/// fixed probability; survivors are delivered in order on the next tick.
pub struct SimNetwork {
    client_ipv4_addr: Ipv4Addr,
    server_ipv4_addr: Ipv4Addr,
    loss: f64,
    rng: RefCell<SmallRng>,
    to_client: RefCell<VecDeque<Vec<u8>>>,
    to_server: RefCell<VecDeque<Vec<u8>>>,
    delivered: Cell<usize>,
    dropped: Cell<usize>,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl SimNetwork {
    pub fn new(client_ipv4_addr: Ipv4Addr, server_ipv4_addr: Ipv4Addr, loss: f64, seed: u64) -> Self {
        Self {
            client_ipv4_addr,
            server_ipv4_addr,
            loss,
            rng: RefCell::new(SmallRng::seed_from_u64(seed)),
            to_client: RefCell::new(VecDeque::new()),
            to_server: RefCell::new(VecDeque::new()),
            delivered: Cell::new(0),
            dropped: Cell::new(0),
        }
    }

    /// Sends a segment from the client towards the server.
    pub fn send_to_server(&self, segment: Vec<u8>) {
        if self.survives("client -> server") {
            self.to_server.borrow_mut().push_back(segment);
        }
    }

    pub fn take_for_server(&self) -> Vec<Vec<u8>> {
        self.to_server.borrow_mut().drain(..).collect()
    }

    pub fn take_for_client(&self) -> Vec<Vec<u8>> {
        self.to_client.borrow_mut().drain(..).collect()
    }

    pub fn client_ipv4_addr(&self) -> Ipv4Addr {
        self.client_ipv4_addr
    }

    pub fn server_ipv4_addr(&self) -> Ipv4Addr {
        self.server_ipv4_addr
    }

    pub fn delivered(&self) -> usize {
        self.delivered.get()
    }

    pub fn dropped(&self) -> usize {
        self.dropped.get()
    }

    fn survives(&self, direction: &str) -> bool {
        if self.rng.borrow_mut().gen_bool(self.loss) {
            self.dropped.set(self.dropped.get() + 1);
            debug!("{}: segment lost", direction);
            false
        } else {
            self.delivered.set(self.delivered.get() + 1);
            true
        }
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl NetworkRuntime for SimNetwork {
    fn transmit(&self, segment: Vec<u8>, dest: Ipv4Addr) {
        if dest != self.client_ipv4_addr {
            warn!("no route to {}", dest);
            return;
        }
        if self.survives("server -> client") {
            self.to_client.borrow_mut().push_back(segment);
        }
    }
}
