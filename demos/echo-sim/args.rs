// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::anyhow::{
    bail,
    Result,
};
use ::clap::{
    Arg,
    ArgAction,
    ArgMatches,
    Command,
};

//==============================================================================
// Program Arguments
//==============================================================================

/// Program Arguments
#[derive(Debug)]
pub struct ProgramArguments {
    /// Path to a YAML configuration file.
    config_path: Option<String>,
    /// Probability of dropping a segment, in either direction.
    loss: f64,
    /// Number of messages the client sends.
    nmessages: usize,
    /// Message size (in bytes).
    msgsize: usize,
    /// Seed for the simulated network and the transport.
    seed: u64,
    /// Stop re-arming the retransmission timer after it fires once?
    no_rearm: bool,
}

/// Associate functions for Program Arguments
impl ProgramArguments {
    /// Default loss rate.
    const DEFAULT_LOSS: f64 = 0.2;
    /// Default number of messages.
    const DEFAULT_NMESSAGES: usize = 5;
    /// Default message size.
    const DEFAULT_MSGSIZE: usize = 40;
    /// Default seed.
    const DEFAULT_SEED: u64 = 0xdead_beef;

    /// Parses the program arguments from the command line interface.
    pub fn new(app_name: &'static str, app_author: &'static str, app_about: &'static str) -> Result<Self> {
        let matches: ArgMatches = Command::new(app_name)
            .author(app_author)
            .about(app_about)
            .arg(
                Arg::new("config")
                    .long("config")
                    .value_parser(clap::value_parser!(String))
                    .required(false)
                    .value_name("PATH")
                    .help("Sets the transport configuration file"),
            )
            .arg(
                Arg::new("loss")
                    .long("loss")
                    .value_parser(clap::value_parser!(f64))
                    .required(false)
                    .value_name("RATE")
                    .help("Sets the probability of dropping a segment"),
            )
            .arg(
                Arg::new("nmessages")
                    .long("nmessages")
                    .value_parser(clap::value_parser!(usize))
                    .required(false)
                    .value_name("COUNT")
                    .help("Sets the number of messages to echo"),
            )
            .arg(
                Arg::new("msgsize")
                    .long("msgsize")
                    .value_parser(clap::value_parser!(usize))
                    .required(false)
                    .value_name("SIZE")
                    .help("Sets the message size"),
            )
            .arg(
                Arg::new("seed")
                    .long("seed")
                    .value_parser(clap::value_parser!(u64))
                    .required(false)
                    .value_name("SEED")
                    .help("Sets the simulation seed"),
            )
            .arg(
                Arg::new("no-rearm")
                    .long("no-rearm")
                    .action(ArgAction::SetTrue)
                    .help("Retransmits at most once per timer, as the bare protocol does"),
            )
            .get_matches();

        // Default arguments.
        let mut args: ProgramArguments = ProgramArguments {
            config_path: None,
            loss: Self::DEFAULT_LOSS,
            nmessages: Self::DEFAULT_NMESSAGES,
            msgsize: Self::DEFAULT_MSGSIZE,
            seed: Self::DEFAULT_SEED,
            no_rearm: matches.get_flag("no-rearm"),
        };

        if let Some(config_path) = matches.get_one::<String>("config") {
            args.config_path = Some(config_path.to_string());
        }

        if let Some(loss) = matches.get_one::<f64>("loss") {
            args.set_loss(*loss)?;
        }

        if let Some(nmessages) = matches.get_one::<usize>("nmessages") {
            args.nmessages = *nmessages;
        }

        if let Some(msgsize) = matches.get_one::<usize>("msgsize") {
            args.set_msgsize(*msgsize)?;
        }

        if let Some(seed) = matches.get_one::<u64>("seed") {
            args.seed = *seed;
        }

        Ok(args)
    }

    pub fn get_config_path(&self) -> Option<&str> {
        self.config_path.as_deref()
    }

    pub fn get_loss(&self) -> f64 {
        self.loss
    }

    pub fn get_nmessages(&self) -> usize {
        self.nmessages
    }

    pub fn get_msgsize(&self) -> usize {
        self.msgsize
    }

    pub fn get_seed(&self) -> u64 {
        self.seed
    }

    pub fn get_no_rearm(&self) -> bool {
        self.no_rearm
    }

    /// Sets the loss rate, which must be a probability below one.
    fn set_loss(&mut self, loss: f64) -> Result<()> {
        if (0.0..1.0).contains(&loss) {
            self.loss = loss;
            Ok(())
        } else {
            bail!("invalid loss rate")
        }
    }

    fn set_msgsize(&mut self, msgsize: usize) -> Result<()> {
        if msgsize > 0 {
            self.msgsize = msgsize;
            Ok(())
        } else {
            bail!("invalid message size")
        }
    }
}
