// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

pub mod connection;
pub mod dispatcher;
pub mod header;
mod isn_generator;
mod rto;
mod sequence_number;

#[cfg(test)]
mod tests;

pub use self::{
    header::MIN_TCP_HEADER_SIZE,
    sequence_number::SeqNumber,
};
