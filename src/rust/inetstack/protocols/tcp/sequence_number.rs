// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

// Sequence numbers live in a 32-bit space that wraps around (RFC 793, Section 3.3), so arithmetic is modulo 2^32
// and ordering is only meaningful between numbers less than 2^31 apart. Comparisons are therefore not transitive:
// a < b < c < a is possible. This type keeps callers from treating them as plain integers.

use ::std::{
    cmp::Ordering,
    convert::From,
    fmt,
};

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct SeqNumber {
    value: u32,
}

impl From<SeqNumber> for u32 {
    #[inline]
    fn from(item: SeqNumber) -> u32 {
        item.value
    }
}

impl From<u32> for SeqNumber {
    #[inline]
    fn from(item: u32) -> Self {
        SeqNumber { value: item }
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl std::ops::Add for SeqNumber {
    type Output = SeqNumber;

    #[inline]
    fn add(self, other: SeqNumber) -> SeqNumber {
        (self.value.wrapping_add(other.value)).into()
    }
}

impl std::ops::Sub for SeqNumber {
    type Output = SeqNumber;

    #[inline]
    fn sub(self, other: SeqNumber) -> SeqNumber {
        (self.value.wrapping_sub(other.value)).into()
    }
}

// Only the comparison operators are supported. There is no total order, so `partial_cmp` (and anything built on it,
// like sorting) must not be used.
impl std::cmp::PartialOrd for SeqNumber {
    fn partial_cmp(&self, _other: &Self) -> Option<Ordering> {
        panic!("sequence numbers have no total order; use the comparison operators");
    }

    #[inline]
    fn lt(&self, other: &Self) -> bool {
        (self.value.wrapping_sub(other.value) as i32) < 0
    }

    #[inline]
    fn le(&self, other: &Self) -> bool {
        (self.value.wrapping_sub(other.value) as i32) <= 0
    }

    #[inline]
    fn gt(&self, other: &Self) -> bool {
        (self.value.wrapping_sub(other.value) as i32) > 0
    }

    #[inline]
    fn ge(&self, other: &Self) -> bool {
        (self.value.wrapping_sub(other.value) as i32) >= 0
    }
}
