// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::memory::SegmentBuffer,
    tcp::{
        reassembly::{
            accountant::SharedAccountant,
            pool::SharedSegmentPool,
            queue::{
                MergeResult,
                ReassemblyQueue,
            },
            segment::SegmentDescriptor,
            sink::ReceiveSink,
        },
        SeqNumber,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Control flags reported back to the caller of a reassembly pass. The caller owns waking any readers that block on
/// the sink.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DeliveryFlags {
    /// A delivered segment carried end-of-stream.
    pub end_of_stream: bool,
}

/// Connection state as far as data acceptance is concerned. The full connection state machine lives with the caller;
/// the engine only needs to know whether application data may be delivered yet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    /// Handshake not completed; segments may be queued but nothing is presented.
    SynReceived,
    /// Data may be delivered to the application.
    Established,
}

/// Receive-side reassembly engine of one connection.
///
/// Accepts arbitrarily out-of-order, overlapping segments and delivers a single ordered, duplicate-free byte stream
/// into the connection's sink. Runs synchronously inside the thread handling the connection's inbound-segment event;
/// it never blocks and never suspends. The exclusive borrow taken by every mutating operation is the per-connection
/// lock: callers that share a connection across threads wrap the receiver in their own lock and hold it for a whole
/// insert-then-present pass.
pub struct Receiver<S: ReceiveSink> {
    /// Sequence number of the next byte expected from the peer (RCV.NXT).
    receive_next: SeqNumber,
    /// Data-acceptance state of the connection.
    state: State,
    /// Segments received ahead of a gap, waiting for the gap to fill.
    out_of_order: ReassemblyQueue,
    /// Bounded descriptor allocator, shared across connections.
    pool: SharedSegmentPool,
    /// Process-wide admission control, shared across connections.
    accountant: SharedAccountant,
    /// In-order byte sink of the owning socket.
    sink: S,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl<S: ReceiveSink> Receiver<S> {
    /// Creates the reassembly engine for a connection expecting its next byte at `receive_next`.
    pub fn new(receive_next: SeqNumber, pool: SharedSegmentPool, accountant: SharedAccountant, sink: S) -> Self {
        Self {
            receive_next,
            state: State::SynReceived,
            out_of_order: ReassemblyQueue::new(),
            pool,
            accountant,
            sink,
        }
    }

    /// Gets the sequence number of the next byte expected from the peer.
    pub fn receive_next(&self) -> SeqNumber {
        self.receive_next
    }

    /// Gets the number of segments currently held in the out-of-order queue.
    pub fn queue_length(&self) -> usize {
        self.out_of_order.len()
    }

    /// Gets the sink of the target [Receiver].
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Gets a mutable reference to the sink of the target [Receiver].
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Marks the connection as able to deliver application data and presents anything queued up to that point. Data
    /// received during the handshake sits in the queue until this transition.
    pub fn set_established(&mut self) -> DeliveryFlags {
        self.state = State::Established;
        self.present()
    }

    /// Processes one newly arrived, already-validated segment and delivers whatever became contiguous.
    ///
    /// Drops are silent at this layer: a refused or unallocatable segment is simply consumed, and the peer
    /// retransmits it once it notices the missing acknowledgment.
    pub fn reassemble(&mut self, mut seq: SeqNumber, mut payload: SegmentBuffer, fin: bool) -> DeliveryFlags {
        // Data-less segments carry nothing to queue. An in-sequence FIN is reported directly; an out-of-order one is
        // dropped and the peer retransmits it later.
        if payload.is_empty() {
            let mut flags: DeliveryFlags = self.present();
            if fin && self.can_receive_data() && seq == self.receive_next {
                flags.end_of_stream = true;
            }
            return flags;
        }

        // A retransmission can reach back before the receive cursor. Cut the already-delivered bytes off the front;
        // a segment with nothing new left is a plain duplicate.
        if seq < self.receive_next {
            let already_delivered: u32 = (self.receive_next - seq).into();
            if already_delivered as usize >= payload.len() {
                self.accountant.record_duplicate(payload.len() as u32);
                trace!("reassemble(): segment at {} was already delivered in full", seq);
                return self.present();
            }
            payload
                .adjust(already_delivered as usize)
                .expect("delivered prefix is smaller than the segment");
            seq = self.receive_next;
        }

        // Limit the number of queued segments to avoid running out of buffers, but always let the missing segment
        // through which caused this queue.
        let is_next_expected: bool = seq == self.receive_next;
        if !self.accountant.admit(is_next_expected, self.out_of_order.len()) {
            debug!("reassemble(): dropping segment at {} (reassembly limits reached)", seq);
            return DeliveryFlags::default();
        }

        let segment: SegmentDescriptor = match self.pool.alloc(seq, payload, fin) {
            Some(segment) => segment,
            None => {
                // Pool exhaustion is an ordinary drop, handled exactly like an admission refusal.
                self.accountant.release();
                self.accountant.record_overflow();
                debug!("reassemble(): dropping segment at {} (descriptor pool exhausted)", seq);
                return DeliveryFlags::default();
            },
        };

        let result: MergeResult = self.out_of_order.insert(segment);
        if let Some(nbytes) = result.inserted_bytes {
            self.accountant.record_out_of_order(nbytes);
        }
        for evicted in result.evicted {
            self.accountant.release();
            self.pool.free(evicted);
        }
        if let Some(duplicate) = result.rejected {
            self.accountant.release();
            self.accountant.record_duplicate(duplicate.len());
            self.pool.free(duplicate);
        }

        self.present()
    }

    /// Presents queued data to the application, advancing the receive cursor through completed sequence space.
    ///
    /// Safe to call at any time; with no new arrivals a second call performs no further mutation. Returns the control
    /// flags accumulated from the delivered segments.
    pub fn present(&mut self) -> DeliveryFlags {
        let mut flags: DeliveryFlags = DeliveryFlags::default();
        if !self.can_receive_data() {
            return flags;
        }
        while let Some(segment) = self.out_of_order.pop_front_if(self.receive_next) {
            trace!("present(): delivering {} bytes at {}", segment.len(), segment.start_seq());
            self.receive_next = self.receive_next + SeqNumber::from(segment.len());
            if segment.has_fin() {
                flags.end_of_stream = true;
            }
            self.accountant.release();
            let payload: SegmentBuffer = self.pool.free(segment);
            if self.sink.is_closed() {
                // The stream is logically consumed even when nobody reads it anymore.
                trace!("present(): sink closed, discarding {} bytes", payload.len());
            } else {
                self.sink.append(payload);
            }
        }
        flags
    }

    /// Returns `true` when the connection may deliver application data.
    fn can_receive_data(&self) -> bool {
        self.state == State::Established
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

/// Drop Trait Implementation for Receivers
impl<S: ReceiveSink> Drop for Receiver<S> {
    /// Returns every still-queued descriptor to the pool and its admission slot to the accountant.
    fn drop(&mut self) {
        while let Some(segment) = self.out_of_order.pop_front() {
            self.accountant.release();
            self.pool.free(segment);
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
