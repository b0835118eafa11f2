// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::{
        fail::Fail,
        memory::SegmentBuffer,
    },
    tcp::SeqNumber,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// One buffered, not-yet-delivered contiguous run of received bytes.
///
/// Descriptors only ever shrink: trimming removes bytes already represented by an overlapping neighbor. A descriptor
/// sitting in a reassembly queue always holds at least one byte.
pub struct SegmentDescriptor {
    /// Sequence number of the first byte.
    start_seq: SeqNumber,
    /// Payload bytes, owned exclusively by this descriptor until delivered or freed.
    payload: SegmentBuffer,
    /// Whether the sender marked end-of-stream on this segment.
    fin: bool,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl SegmentDescriptor {
    /// Creates a descriptor. Descriptors are handed out by the segment pool.
    pub(crate) fn new(start_seq: SeqNumber, payload: SegmentBuffer, fin: bool) -> Self {
        Self {
            start_seq,
            payload,
            fin,
        }
    }

    /// Gets the sequence number of the first byte of the target [SegmentDescriptor].
    pub fn start_seq(&self) -> SeqNumber {
        self.start_seq
    }

    /// Gets the number of bytes currently represented by the target [SegmentDescriptor].
    pub fn len(&self) -> u32 {
        self.payload.len() as u32
    }

    /// Returns `true` if the target [SegmentDescriptor] holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Gets the sequence number one past the last byte of the target [SegmentDescriptor].
    pub fn end_seq(&self) -> SeqNumber {
        self.start_seq + SeqNumber::from(self.len())
    }

    /// Returns `true` if the sender marked end-of-stream on this segment.
    pub fn has_fin(&self) -> bool {
        self.fin
    }

    /// Gets the payload of the target [SegmentDescriptor].
    pub fn payload(&self) -> &SegmentBuffer {
        &self.payload
    }

    /// Removes `nbytes` bytes from the front, advancing the starting sequence number accordingly. Trimming must leave
    /// at least one byte behind.
    pub(crate) fn trim_front(&mut self, nbytes: u32) -> Result<(), Fail> {
        debug_assert!((nbytes as usize) < self.payload.len());
        self.payload.adjust(nbytes as usize)?;
        self.start_seq = self.start_seq + SeqNumber::from(nbytes);
        Ok(())
    }

    /// Consumes the target [SegmentDescriptor], yielding its payload.
    pub(crate) fn into_payload(self) -> SegmentBuffer {
        self.payload
    }
}
