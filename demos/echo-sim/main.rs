// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

#[macro_use]
extern crate log;

mod args;
mod client;
mod network;

//==============================================================================
// Imports
//==============================================================================

use crate::{
    args::ProgramArguments,
    client::ScriptedClient,
    network::SimNetwork,
};
use ::anyhow::{
    bail,
    Result,
};
use ::std::{
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
    runtime::logging,
    Config,
    Connection,
    Dispatcher,
    NetworkRuntime,
    TcpConfig,
};

//==============================================================================
// Constants
//==============================================================================

const CLIENT_IPV4: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const CLIENT_PORT: u16 = 49152;
const SERVER_IPV4: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
const SERVER_PORT: u16 = 7;

/// Simulated time between network deliveries.
const TICK: Duration = Duration::from_millis(50);
/// Simulated time after which the run is declared stalled.
const MAX_SIMULATED_TIME: Duration = Duration::from_secs(300);
/// Client retransmission timeout.
const CLIENT_RTO: Duration = Duration::from_millis(500);
/// Segment size used when no configuration file is given, small enough to split every message.
const DEMO_MSS: usize = 16;

//==============================================================================
// Standalone Functions
//==============================================================================

/// Server settings and listening address, taken from the configuration file when one is given.
fn server_setup(args: &ProgramArguments) -> Result<(TcpConfig, SocketAddrV4)> {
    match args.get_config_path() {
        Some(path) => server_setup_from(&Config::new(path)?),
        None => {
            let tcp_config: TcpConfig = TcpConfig::new(
                Some(DEMO_MSS),
                None,
                None,
                None,
                Some(!args.get_no_rearm()),
                Some(args.get_seed()),
            );
            Ok((tcp_config, SocketAddrV4::new(SERVER_IPV4, SERVER_PORT)))
        },
    }
}

fn server_setup_from(config: &Config) -> Result<(TcpConfig, SocketAddrV4)> {
    let local: SocketAddrV4 = SocketAddrV4::new(config.local_ipv4_addr()?, config.local_port()?);
    Ok((config.tcp_config()?, local))
}

fn messages(nmessages: usize, msgsize: usize) -> Vec<Vec<u8>> {
    (0..nmessages)
        .map(|i| (0..msgsize).map(|j| b'a' + ((i + j) % 26) as u8).collect())
        .collect()
}

//==============================================================================
// Main
//==============================================================================

fn main() -> Result<()> {
    logging::initialize();
    let args: ProgramArguments = ProgramArguments::new(
        "echo-sim",
        "Microsoft Corporation",
        "Echoes messages over a simulated lossy network.",
    )?;
    let (tcp_config, server_addr): (TcpConfig, SocketAddrV4) = server_setup(&args)?;

    let start: Instant = Instant::now();
    let mut now: Instant = start;
    let network: Rc<SimNetwork> = Rc::new(SimNetwork::new(
        CLIENT_IPV4,
        *server_addr.ip(),
        args.get_loss(),
        args.get_seed(),
    ));

    // Echo server.
    let transport: Rc<dyn NetworkRuntime> = network.clone();
    let mut server: Dispatcher = Dispatcher::new(server_addr.port(), transport, now, tcp_config);
    server.on_accept(|connection: &mut Connection| {
        println!("server: accepted {}", connection.id());
        connection.on_receive(|connection: &mut Connection, payload: &[u8]| {
            if payload.is_empty() {
                println!("server: {} hung up", connection.id());
                connection.close();
            } else if let Err(e) = connection.send(payload) {
                error!("server: echo failed: {:?}", e);
            }
        });
    });

    let mut client: ScriptedClient = ScriptedClient::new(
        SocketAddrV4::new(CLIENT_IPV4, CLIENT_PORT),
        server_addr,
        u32::from(args.get_seed() as u16),
        messages(args.get_nmessages(), args.get_msgsize()),
        CLIENT_RTO,
    );
    client.start(now, &network);

    while !client.is_done() && now.duration_since(start) < MAX_SIMULATED_TIME {
        now += TICK;
        for segment in network.take_for_server() {
            server.receive(network.client_ipv4_addr(), network.server_ipv4_addr(), &segment);
        }
        server.advance_clock(now);
        for segment in network.take_for_client() {
            client.on_segment(&segment, now, &network);
        }
        client.on_tick(now, &network);
    }

    println!(
        "echoed {}/{} messages in {:?} of simulated time",
        client.completed(),
        args.get_nmessages(),
        now.duration_since(start)
    );
    println!(
        "segments: {} delivered, {} lost, {} client retransmissions",
        network.delivered(),
        network.dropped(),
        client.retransmissions()
    );
    println!("server connections left open: {}", server.len());

    if client.completed() < args.get_nmessages() {
        bail!("simulation stalled");
    }
    Ok(())
}

//==============================================================================
// Unit Tests
//==============================================================================
