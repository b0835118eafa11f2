// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

// TCP sequence numbers live in a space that wraps around modulo 2^32 (RFC 793, Section 3.3), so excluding equality,
// comparisons between them are non-transitive: for distinct a, b, c one can have a < b < c < a.  Plain integer
// comparison is therefore wrong for them, and we give sequence numbers their own type whose ordering operators treat
// the 32-bit difference between two values as signed.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::{
    cmp::Ordering,
    fmt,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// A TCP sequence number.
///
/// Stored as an unsigned 32-bit integer. Arithmetic wraps; ordering is wrap-safe. There is deliberately no [Ord]
/// implementation, as the sequence space has no total order, no minimum, and no maximum.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SeqNumber {
    value: u32,
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl From<u32> for SeqNumber {
    #[inline]
    fn from(value: u32) -> Self {
        SeqNumber { value }
    }
}

impl From<SeqNumber> for u32 {
    #[inline]
    fn from(item: SeqNumber) -> u32 {
        item.value
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.value.fmt(f)
    }
}

/// Addition of two sequence numbers wraps modulo 2^32.
impl std::ops::Add for SeqNumber {
    type Output = SeqNumber;

    #[inline]
    fn add(self, other: SeqNumber) -> SeqNumber {
        self.value.wrapping_add(other.value).into()
    }
}

/// Subtraction of two sequence numbers wraps modulo 2^32.
impl std::ops::Sub for SeqNumber {
    type Output = SeqNumber;

    #[inline]
    fn sub(self, other: SeqNumber) -> SeqNumber {
        self.value.wrapping_sub(other.value).into()
    }
}

// The comparison operators below are the usual SEQ_LT/SEQ_GT treatment: a sequence number compares less than another
// when the wrapped difference, read as a signed 32-bit quantity, is negative.  We implement PartialOrd only for the
// operators; partial_cmp itself would promise an ordering that the sequence space cannot deliver, so calling it is a
// programming error.
impl PartialOrd for SeqNumber {
    fn partial_cmp(&self, _other: &Self) -> Option<Ordering> {
        panic!("sequence numbers have no total order; use the comparison operators directly");
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

//======================================================================================================================
// Unit Tests
//======================================================================================================================
