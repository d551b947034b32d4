// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

#[macro_use]
extern crate log;

pub mod config;
pub mod inetstack;
pub mod runtime;

pub use self::{
    config::Config,
    inetstack::protocols::tcp::{
        connection::{
            Connection,
            ConnectionId,
        },
        dispatcher::Dispatcher,
        header::TcpHeader,
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

//======================================================================================================================
// Test Macros
//======================================================================================================================

/// Ensures that two expressions are equal, bailing out of the enclosing function with an error otherwise.
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr $(,)?) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    anyhow::bail!(r#"ensure failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`"#, left_val, right_val)
                }
            }
        }
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    anyhow::bail!(r#"ensure failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`: {}"#, left_val, right_val, format_args!($($arg)+))
                }
            }
        }
    });
}

/// Ensures that two expressions are not equal, bailing out of the enclosing function with an error otherwise.
#[macro_export]
macro_rules! ensure_neq {
    ($left:expr, $right:expr $(,)?) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if *left_val == *right_val {
                    anyhow::bail!(r#"ensure failed: `(left != right)`
  left: `{:?}`,
 right: `{:?}`"#, left_val, right_val)
                }
            }
        }
    });
}
