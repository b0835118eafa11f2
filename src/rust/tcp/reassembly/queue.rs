// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::tcp::{
    reassembly::segment::SegmentDescriptor,
    SeqNumber,
};
use ::slab::Slab;
use ::std::collections::VecDeque;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Per-connection queue of out-of-order segments.
///
/// Descriptors live in a slab arena and the order list holds their keys, sorted by starting sequence number. Keys
/// stay valid across trims and evictions, so no entry ever aliases another while the merge loop reshapes the queue.
///
/// Queue invariant: entries are strictly increasing in starting sequence number and never overlap; every entry holds
/// at least one byte.
pub struct ReassemblyQueue {
    /// Arena owning the queued descriptors.
    store: Slab<SegmentDescriptor>,
    /// Slab keys in sequence order.
    order: VecDeque<usize>,
}

/// Result of merging one segment into a [ReassemblyQueue].
///
/// The queue hands removed descriptors back to the caller, which owns the accounting for their pool and admission
/// slots.
pub struct MergeResult {
    /// Bytes actually inserted, after any predecessor trimming. `None` when the segment was not inserted.
    pub inserted_bytes: Option<u32>,
    /// The incoming descriptor, handed back when an existing entry already represents all of its bytes.
    pub rejected: Option<SegmentDescriptor>,
    /// Entries removed because the incoming segment fully covers them.
    pub evicted: Vec<SegmentDescriptor>,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl ReassemblyQueue {
    /// Creates an empty reassembly queue.
    pub fn new() -> Self {
        Self {
            store: Slab::new(),
            order: VecDeque::new(),
        }
    }

    /// Gets the number of segments currently queued.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no segments are queued.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Gets the starting sequence number of the first queued segment.
    pub fn front_start_seq(&self) -> Option<SeqNumber> {
        self.order.front().map(|&key| self.store[key].start_seq())
    }

    /// Merges one segment into the queue.
    ///
    /// Bytes already represented by the predecessor are trimmed off the front of the incoming segment; queued
    /// successors that the (trimmed) segment overlaps are shrunk from their front or evicted outright when fully
    /// covered. The segment is then spliced in at its position in sequence order. A segment whose every byte is
    /// already represented is not inserted and comes back in [MergeResult::rejected]; retransmissions routinely end
    /// up here and this is not an error.
    pub fn insert(&mut self, mut segment: SegmentDescriptor) -> MergeResult {
        debug_assert!(!segment.is_empty());
        let mut result: MergeResult = MergeResult {
            inserted_bytes: None,
            rejected: None,
            evicted: Vec::new(),
        };

        // Find the first queued segment that begins after this one does.
        let index: usize = self
            .order
            .iter()
            .position(|&key| self.store[key].start_seq() > segment.start_seq())
            .unwrap_or_else(|| self.order.len());

        // If there is a preceding segment, it may provide some of our data already. If so, drop the data from the
        // incoming segment. If it provides all of our data, drop the segment.
        if index > 0 {
            let pred: &SegmentDescriptor = &self.store[self.order[index - 1]];
            if pred.end_seq() > segment.start_seq() {
                let overlap: u32 = (pred.end_seq() - segment.start_seq()).into();
                if overlap >= segment.len() {
                    trace!("insert(): segment at {} already represented in full", segment.start_seq());
                    result.rejected = Some(segment);
                    return result;
                }
                segment
                    .trim_front(overlap)
                    .expect("predecessor overlap is smaller than the segment");
            }
        }

        // While we overlap succeeding segments, trim them or, if they are completely covered, evict them.
        while index < self.order.len() {
            let succ_key: usize = self.order[index];
            let succ_start: SeqNumber = self.store[succ_key].start_seq();
            if segment.end_seq() <= succ_start {
                break;
            }
            let overlap: u32 = (segment.end_seq() - succ_start).into();
            if overlap < self.store[succ_key].len() {
                self.store[succ_key]
                    .trim_front(overlap)
                    .expect("partially covered successor retains bytes");
                break;
            }
            trace!("insert(): evicting fully covered segment at {}", succ_start);
            if let Some(key) = self.order.remove(index) {
                result.evicted.push(self.store.remove(key));
            }
        }

        // Splice the (possibly trimmed) segment in at its position in sequence order.
        result.inserted_bytes = Some(segment.len());
        let key: usize = self.store.insert(segment);
        self.order.insert(index, key);
        self.check_invariants();

        result
    }

    /// Removes and returns the first queued segment, provided it starts exactly at `seq`.
    pub fn pop_front_if(&mut self, seq: SeqNumber) -> Option<SegmentDescriptor> {
        let front_key: usize = *self.order.front()?;
        if self.store[front_key].start_seq() != seq {
            return None;
        }
        let _ = self.order.pop_front();
        Some(self.store.remove(front_key))
    }

    /// Removes and returns the first queued segment, if any. Used when draining a dead connection.
    pub fn pop_front(&mut self) -> Option<SegmentDescriptor> {
        let front_key: usize = self.order.pop_front()?;
        Some(self.store.remove(front_key))
    }

    /// Checks the queue invariant. Ordering corruption cannot happen under correct use, so this is fatal.
    fn check_invariants(&self) {
        #[cfg(debug_assertions)]
        {
            let mut prev_end: Option<SeqNumber> = None;
            for &key in &self.order {
                let entry: &SegmentDescriptor = &self.store[key];
                debug_assert!(!entry.is_empty());
                if let Some(end) = prev_end {
                    debug_assert!(end <= entry.start_seq());
                }
                prev_end = Some(entry.end_seq());
            }
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

/// Default Trait Implementation for Reassembly Queues
impl Default for ReassemblyQueue {
    fn default() -> Self {
        Self::new()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
