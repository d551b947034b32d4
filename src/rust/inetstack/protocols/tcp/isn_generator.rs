// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use crate::inetstack::protocols::tcp::SeqNumber;
use ::rand::{
    prelude::SmallRng,
    Rng,
    SeedableRng,
};

/// Largest initial sequence number handed out. The space is deliberately small; collisions are accepted.
const MAX_ISN: u32 = 0xffff;

pub struct IsnGenerator {
    rng: SmallRng,
}

impl IsnGenerator {
    /// Creates a generator. A fixed seed makes the sequence reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        let rng: SmallRng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self { rng }
    }

    /// Picks an initial sequence number uniformly from `0..=0xffff`.
    pub fn generate(&mut self) -> SeqNumber {
        SeqNumber::from(self.rng.gen_range(0..=MAX_ISN))
    }
}
