// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::tcp::reassembly::config::ReassemblyConfig;
use ::std::{
    ops::Deref,
    sync::{
        atomic::{
            AtomicU64,
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Process-wide accounting for reassembly queues.
///
/// Bounds how many segment descriptors may be pinned down system-wide and per connection, so that a burst of
/// out-of-order traffic on a few connections cannot exhaust the stack's buffer budget. Counters are atomic: many
/// connections mutate them concurrently without touching each other's locks.
pub struct ResourceAccountant {
    /// Global ceiling on queued segments.
    max_queued_segments: usize,
    /// Per-connection ceiling on queued segments.
    max_segments_per_queue: usize,
    /// Segments currently queued across all connections.
    queued_segments: AtomicUsize,
    /// Admission refusals.
    overflows: AtomicU64,
    /// Segments discarded as entirely duplicate data.
    duplicate_segments: AtomicU64,
    /// Bytes discarded as entirely duplicate data.
    duplicate_bytes: AtomicU64,
    /// Segments accepted into a reassembly queue.
    out_of_order_segments: AtomicU64,
    /// Bytes accepted into a reassembly queue.
    out_of_order_bytes: AtomicU64,
}

/// Reference-counted handle to a [ResourceAccountant], shared by all connections of a stack instance.
#[derive(Clone)]
pub struct SharedAccountant(Arc<ResourceAccountant>);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl ResourceAccountant {
    /// Creates an accountant enforcing the limits of the given configuration.
    pub fn new(config: &ReassemblyConfig) -> Self {
        Self {
            max_queued_segments: config.get_max_queued_segments(),
            max_segments_per_queue: config.get_max_segments_per_queue(),
            queued_segments: AtomicUsize::new(0),
            overflows: AtomicU64::new(0),
            duplicate_segments: AtomicU64::new(0),
            duplicate_bytes: AtomicU64::new(0),
            out_of_order_segments: AtomicU64::new(0),
            out_of_order_bytes: AtomicU64::new(0),
        }
    }

    /// Decides whether one more segment may be queued on a connection currently holding `queue_length` segments.
    ///
    /// The segment that would unblock forward progress (the one starting exactly at the connection's receive cursor)
    /// is always admitted, even when this transiently exceeds a ceiling by one entry. Refusing it while the queue is
    /// full of unrelated out-of-order data would stall the connection permanently.
    pub fn admit(&self, is_next_expected: bool, queue_length: usize) -> bool {
        if !is_next_expected
            && (self.queued_segments.load(Ordering::Relaxed) + 1 >= self.max_queued_segments
                || queue_length >= self.max_segments_per_queue)
        {
            self.overflows.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.queued_segments.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Returns the admission slot of one removed segment.
    pub fn release(&self) {
        let previous: usize = self.queued_segments.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(previous > 0);
    }

    /// Records a drop that happened after admission (e.g. descriptor-pool exhaustion).
    pub fn record_overflow(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a segment discarded as entirely duplicate data.
    pub fn record_duplicate(&self, nbytes: u32) {
        self.duplicate_segments.fetch_add(1, Ordering::Relaxed);
        self.duplicate_bytes.fetch_add(u64::from(nbytes), Ordering::Relaxed);
    }

    /// Records a segment accepted into a reassembly queue.
    pub fn record_out_of_order(&self, nbytes: u32) {
        self.out_of_order_segments.fetch_add(1, Ordering::Relaxed);
        self.out_of_order_bytes.fetch_add(u64::from(nbytes), Ordering::Relaxed);
    }

    /// Gets the number of segments currently queued across all connections.
    pub fn queued_segments(&self) -> usize {
        self.queued_segments.load(Ordering::Relaxed)
    }

    /// Gets the number of admission refusals recorded so far.
    pub fn overflows(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }

    /// Gets the number of segments discarded as duplicates so far.
    pub fn duplicate_segments(&self) -> u64 {
        self.duplicate_segments.load(Ordering::Relaxed)
    }

    /// Gets the number of bytes discarded as duplicates so far.
    pub fn duplicate_bytes(&self) -> u64 {
        self.duplicate_bytes.load(Ordering::Relaxed)
    }

    /// Gets the number of segments accepted into reassembly queues so far.
    pub fn out_of_order_segments(&self) -> u64 {
        self.out_of_order_segments.load(Ordering::Relaxed)
    }

    /// Gets the number of bytes accepted into reassembly queues so far.
    pub fn out_of_order_bytes(&self) -> u64 {
        self.out_of_order_bytes.load(Ordering::Relaxed)
    }
}

impl SharedAccountant {
    /// Creates a shareable accountant enforcing the limits of the given configuration.
    pub fn new(config: &ReassemblyConfig) -> Self {
        Self(Arc::new(ResourceAccountant::new(config)))
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

/// De-Reference Trait Implementation for Shared Accountants
impl Deref for SharedAccountant {
    type Target = ResourceAccountant;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
