// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    network::{
        config::TcpConfig,
        consts::{
            MAX_MSS,
            MIN_MSS,
        },
    },
};
use ::std::{
    fs,
    net::Ipv4Addr,
    ops::Index,
    str::FromStr,
    time::Duration,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Transport options. Every option may be overridden by an environment variable named after it in upper case.
mod tinytcp_config {
    pub const SECTION_NAME: &str = "tinytcp";
    // Local IPv4 addr.
    pub const LOCAL_IPV4_ADDR: &str = "local_ipv4_addr";
    // Listening port.
    pub const LOCAL_PORT: &str = "local_port";
    pub const MSS: &str = "mss";
    pub const INITIAL_RTO_MS: &str = "initial_rto_ms";
    // Optional from here on.
    pub const RECEIVE_WINDOW_SIZE: &str = "receive_window_size";
    pub const IGNORE_CHECKSUM: &str = "ignore_checksum";
    pub const REARM_ON_TIMEOUT: &str = "rearm_on_timeout";
    pub const RNG_SEED: &str = "rng_seed";
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// Transport configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn new(config_path: &str) -> Result<Self, Fail> {
        let config_s: String = fs::read_to_string(config_path)?;
        Self::parse(&config_s)
    }

    /// Builds a [Config] object from YAML text.
    pub fn parse(config_s: &str) -> Result<Self, Fail> {
        let config: Vec<Yaml> = match YamlLoader::load_from_str(config_s) {
            Ok(config) => config,
            Err(e) => {
                let cause: String = format!("failed to parse configuration: {}", e);
                error!("parse(): {}", cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            },
        };
        let config_obj: &Yaml = match &config[..] {
            [c] => c,
            _ => return Err(Fail::new(libc::EINVAL, "Wrong number of config objects")),
        };

        Ok(Self(config_obj.clone()))
    }

    fn get_tinytcp_config(&self) -> Result<&Yaml, Fail> {
        Self::get_subsection(&self.0, tinytcp_config::SECTION_NAME)
    }

    /// Reads the local IPv4 address parameter from the environment variable first and then the underlying
    /// configuration file.
    pub fn local_ipv4_addr(&self) -> Result<Ipv4Addr, Fail> {
        let local_ipv4_addr: Ipv4Addr =
            if let Some(addr) = Self::get_typed_env_option(tinytcp_config::LOCAL_IPV4_ADDR)? {
                addr
            } else {
                Self::get_typed_str_option(
                    self.get_tinytcp_config()?,
                    tinytcp_config::LOCAL_IPV4_ADDR,
                    |val: &str| val.parse().ok(),
                )?
            };

        if local_ipv4_addr.is_unspecified() || local_ipv4_addr.is_broadcast() {
            let cause: String = format!("invalid IPv4 address: {}", local_ipv4_addr);
            error!("local_ipv4_addr(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        Ok(local_ipv4_addr)
    }

    pub fn local_port(&self) -> Result<u16, Fail> {
        let port: u16 = if let Some(port) = Self::get_typed_env_option(tinytcp_config::LOCAL_PORT)? {
            port
        } else {
            Self::get_int_option(self.get_tinytcp_config()?, tinytcp_config::LOCAL_PORT)?
        };

        if port == 0 {
            error!("local_port(): invalid listening port");
            return Err(Fail::new(libc::EINVAL, "invalid listening port"));
        }
        Ok(port)
    }

    /// Reads the maximum segment size, which must lie within the range a single IPv4 datagram can carry.
    pub fn mss(&self) -> Result<usize, Fail> {
        let mss: usize = if let Some(mss) = Self::get_typed_env_option(tinytcp_config::MSS)? {
            mss
        } else {
            Self::get_int_option(self.get_tinytcp_config()?, tinytcp_config::MSS)?
        };

        if !(MIN_MSS..=MAX_MSS).contains(&mss) {
            let cause: String = format!("mss {} is out of range ({}..={})", mss, MIN_MSS, MAX_MSS);
            error!("mss(): {}", cause);
            return Err(Fail::new(libc::ERANGE, &cause));
        }
        Ok(mss)
    }

    pub fn initial_rto(&self) -> Result<Duration, Fail> {
        let rto_ms: u64 = if let Some(rto_ms) = Self::get_typed_env_option(tinytcp_config::INITIAL_RTO_MS)? {
            rto_ms
        } else {
            Self::get_int_option(self.get_tinytcp_config()?, tinytcp_config::INITIAL_RTO_MS)?
        };

        if rto_ms == 0 {
            return Err(Fail::new(libc::ERANGE, "initial rto must be positive"));
        }
        Ok(Duration::from_millis(rto_ms))
    }

    pub fn receive_window_size(&self) -> Result<Option<u16>, Fail> {
        self.get_optional_int(tinytcp_config::RECEIVE_WINDOW_SIZE)
    }

    pub fn ignore_checksum(&self) -> Result<Option<bool>, Fail> {
        self.get_optional_bool(tinytcp_config::IGNORE_CHECKSUM)
    }

    pub fn rearm_on_timeout(&self) -> Result<Option<bool>, Fail> {
        self.get_optional_bool(tinytcp_config::REARM_ON_TIMEOUT)
    }

    /// Seed for initial sequence numbers. Entropy is used when unset.
    pub fn rng_seed(&self) -> Result<Option<u64>, Fail> {
        self.get_optional_int(tinytcp_config::RNG_SEED)
    }

    /// Collects every transport option into a [TcpConfig].
    pub fn tcp_config(&self) -> Result<TcpConfig, Fail> {
        Ok(TcpConfig::new(
            Some(self.mss()?),
            Some(self.initial_rto()?),
            self.receive_window_size()?,
            self.ignore_checksum()?,
            self.rearm_on_timeout()?,
            self.rng_seed()?,
        ))
    }

    //======================================================================================================================
    // Static Functions
    //======================================================================================================================

    fn get_optional_int<T: TryFrom<i64> + FromStr>(&self, index: &str) -> Result<Option<T>, Fail> {
        if let Some(value) = Self::get_typed_env_option(index)? {
            return Ok(Some(value));
        }
        let section: &Yaml = self.get_tinytcp_config()?;
        match Self::get_optional(section, index) {
            Some(_) => Ok(Some(Self::get_int_option(section, index)?)),
            None => Ok(None),
        }
    }

    fn get_optional_bool(&self, index: &str) -> Result<Option<bool>, Fail> {
        if let Some(value) = Self::get_typed_env_option(index)? {
            return Ok(Some(value));
        }
        let section: &Yaml = self.get_tinytcp_config()?;
        match Self::get_optional(section, index) {
            Some(_) => Ok(Some(Self::get_bool_option(section, index)?)),
            None => Ok(None),
        }
    }

    /// Similar to `require_typed_option` using `Yaml::as_hash` receiver. This method returns a `&Yaml` instead of
    /// yaml::Hash, and Yaml is more natural for indexing.
    fn get_subsection<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        let section: &'a Yaml = Self::get_option(yaml, index)?;
        match section {
            Yaml::Hash(_) => Ok(section),
            _ => {
                let message: String = format!("parameter \"{}\" has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find the value at `index`, validating that the index exists.
    fn get_option<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        match Self::get_optional(yaml, index) {
            Some(value) => Ok(value),
            None => {
                let message: String = format!("missing configuration option \"{}\"", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find the value at `index`, if there is one.
    fn get_optional<'a>(yaml: &'a Yaml, index: &str) -> Option<&'a Yaml> {
        match yaml.index(index) {
            Yaml::BadValue | Yaml::Null => None,
            value => Some(value),
        }
    }

    /// Index `yaml` to find the value at `index`, validating that it exists and that the receiver returns Some(_).
    fn get_typed_option<'a, T, Fn>(yaml: &'a Yaml, index: &str, receiver: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&'a Yaml) -> Option<T>,
    {
        let option: &'a Yaml = Self::get_option(yaml, index)?;
        match receiver(option) {
            Some(value) => Ok(value),
            None => {
                let message: String = format!("parameter {} has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find value at `index`, validating it as a string.
    fn get_typed_str_option<T, Fn>(yaml: &Yaml, index: &str, parser: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&str) -> Option<T>,
    {
        let option: &Yaml = Self::get_option(yaml, index)?;
        if let Some(value) = option.as_str() {
            if let Some(value) = parser(value) {
                return Ok(value);
            }
        }
        let message: String = format!("parameter {} has unexpected type", index);
        Err(Fail::new(libc::EINVAL, message.as_str()))
    }

    /// Get value where the environment value overrides the config file if it exists.
    fn get_typed_env_option<T: FromStr>(index: &str) -> Result<Option<T>, Fail> {
        if let Ok(var) = ::std::env::var(index.to_uppercase()) {
            return match var.as_str().parse() {
                Ok(value) => Ok(Some(value)),
                Err(_) => {
                    let message: String = format!("environment variable {} has unexpected type", index.to_uppercase());
                    Err(Fail::new(libc::EINVAL, message.as_str()))
                },
            };
        }
        Ok(None)
    }

    /// Similar to `get_typed_option` using `Yaml::as_i64` as the receiver, but additionally verifies that the
    /// destination type may hold the i64 value.
    fn get_int_option<T: TryFrom<i64>>(yaml: &Yaml, index: &str) -> Result<T, Fail> {
        let val: i64 = Self::get_typed_option(yaml, index, &Yaml::as_i64)?;
        match T::try_from(val) {
            Ok(val) => Ok(val),
            _ => {
                let message: String = format!("parameter \"{}\" is out of range", index);
                Err(Fail::new(libc::ERANGE, message.as_str()))
            },
        }
    }

    /// Same as `Self::get_typed_option` using `Yaml::as_bool` as the receiver.
    fn get_bool_option(yaml: &Yaml, index: &str) -> Result<bool, Fail> {
        Self::get_typed_option(yaml, index, &Yaml::as_bool)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
