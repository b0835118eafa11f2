// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::memory::SegmentBuffer;
use ::std::collections::VecDeque;

//======================================================================================================================
// Traits
//======================================================================================================================

/// Append-only sink for in-order stream bytes.
///
/// The reassembly engine delivers contiguous payloads into a sink and otherwise knows nothing about it. A closed sink
/// still consumes sequence space: delivery is skipped but the stream cursor advances.
pub trait ReceiveSink {
    /// Appends in-order payload bytes to the sink.
    fn append(&mut self, payload: SegmentBuffer);

    /// Returns `true` when the sink can no longer accept bytes.
    fn is_closed(&self) -> bool;
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// In-memory receive queue backing a socket.
///
/// Contains in-order received data ready for the application to read. Waking a blocked reader is the caller's
/// concern, not this queue's.
pub struct ReceiveQueue {
    /// Delivered payloads, oldest first.
    queue: VecDeque<SegmentBuffer>,
    /// Total bytes buffered.
    nbytes: usize,
    /// Whether the application shut down its receiving side.
    closed: bool,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl ReceiveQueue {
    /// Creates an empty receive queue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            nbytes: 0,
            closed: false,
        }
    }

    /// Removes and returns the oldest delivered payload.
    pub fn pop(&mut self) -> Option<SegmentBuffer> {
        let payload: SegmentBuffer = self.queue.pop_front()?;
        self.nbytes -= payload.len();
        Some(payload)
    }

    /// Gets the total number of bytes currently buffered.
    pub fn nbytes(&self) -> usize {
        self.nbytes
    }

    /// Marks the receiving side as shut down. Subsequent deliveries are discarded.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

/// Receive Sink Trait Implementation for Receive Queues
impl ReceiveSink for ReceiveQueue {
    fn append(&mut self, payload: SegmentBuffer) {
        self.nbytes += payload.len();
        self.queue.push_back(payload);
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Default Trait Implementation for Receive Queues
impl Default for ReceiveQueue {
    fn default() -> Self {
        Self::new()
    }
}
