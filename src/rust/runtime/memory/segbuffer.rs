// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::std::{
    fmt::Debug,
    ops::Deref,
    sync::Arc,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Segment payload buffer.
///
/// Holds one contiguous run of received bytes. The backing storage is immutable once created; `adjust` and `trim`
/// narrow the visible range in constant time, which is what segment trimming leans on.
#[derive(Clone, Debug)]
pub struct SegmentBuffer {
    /// Backing storage.
    data: Arc<[u8]>,
    /// Offset of the first visible byte.
    offset: usize,
    /// Number of visible bytes.
    len: usize,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl SegmentBuffer {
    /// Creates a segment buffer that takes ownership of a copy of `src`.
    pub fn from_slice(src: &[u8]) -> Self {
        Self {
            data: Arc::from(src),
            offset: 0,
            len: src.len(),
        }
    }

    /// Creates an empty segment buffer.
    pub fn empty() -> Self {
        Self {
            data: Arc::from(&[][..]),
            offset: 0,
            len: 0,
        }
    }

    /// Returns the number of visible bytes in the target [SegmentBuffer].
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the target [SegmentBuffer] holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes `nbytes` bytes from the front of the target [SegmentBuffer].
    pub fn adjust(&mut self, nbytes: usize) -> Result<(), Fail> {
        if nbytes > self.len {
            return Err(Fail::new(libc::EINVAL, "tried to remove more bytes than are present"));
        }
        self.offset += nbytes;
        self.len -= nbytes;
        Ok(())
    }

    /// Removes `nbytes` bytes from the back of the target [SegmentBuffer].
    pub fn trim(&mut self, nbytes: usize) -> Result<(), Fail> {
        if nbytes > self.len {
            return Err(Fail::new(libc::EINVAL, "tried to remove more bytes than are present"));
        }
        self.len -= nbytes;
        Ok(())
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

/// De-Reference Trait Implementation for Segment Buffers
impl Deref for SegmentBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.len]
    }
}

/// Equality Trait Implementation for Segment Buffers
impl PartialEq for SegmentBuffer {
    fn eq(&self, other: &Self) -> bool {
        self[..] == other[..]
    }
}

impl Eq for SegmentBuffer {}

/// Conversion Trait Implementation for Segment Buffers
impl From<&[u8]> for SegmentBuffer {
    fn from(src: &[u8]) -> Self {
        Self::from_slice(src)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
