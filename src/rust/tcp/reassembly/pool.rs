// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::memory::SegmentBuffer,
    tcp::{
        reassembly::{
            config::ReassemblyConfig,
            segment::SegmentDescriptor,
        },
        SeqNumber,
    },
};
use ::std::{
    ops::Deref,
    sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Bounded allocator for segment descriptors.
///
/// Stands in for the zone allocator of a kernel stack: allocation never blocks, and when the pool is exhausted the
/// caller treats the failure as an ordinary segment drop, not a fault.
pub struct SegmentPool {
    /// Maximum number of outstanding descriptors.
    capacity: usize,
    /// Number of descriptors currently outstanding.
    allocated: AtomicUsize,
}

/// Reference-counted handle to a [SegmentPool], shared by all connections of a stack instance.
#[derive(Clone)]
pub struct SharedSegmentPool(Arc<SegmentPool>);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl SegmentPool {
    /// Creates a pool with the capacity of the given configuration.
    pub fn new(config: &ReassemblyConfig) -> Self {
        Self {
            capacity: config.get_pool_capacity(),
            allocated: AtomicUsize::new(0),
        }
    }

    /// Allocates a descriptor for the given segment, or `None` if the pool is exhausted.
    pub fn alloc(&self, start_seq: SeqNumber, payload: SegmentBuffer, fin: bool) -> Option<SegmentDescriptor> {
        let reserve = |outstanding: usize| -> Option<usize> {
            if outstanding < self.capacity {
                Some(outstanding + 1)
            } else {
                None
            }
        };
        if self
            .allocated
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, reserve)
            .is_err()
        {
            return None;
        }
        Some(SegmentDescriptor::new(start_seq, payload, fin))
    }

    /// Frees a descriptor, yielding its payload and returning its slot to the pool.
    pub fn free(&self, descriptor: SegmentDescriptor) -> SegmentBuffer {
        let previous: usize = self.allocated.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(previous > 0);
        descriptor.into_payload()
    }

    /// Gets the number of descriptors currently outstanding.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Gets the capacity of the target [SegmentPool].
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl SharedSegmentPool {
    /// Creates a shareable pool with the capacity of the given configuration.
    pub fn new(config: &ReassemblyConfig) -> Self {
        Self(Arc::new(SegmentPool::new(config)))
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

/// De-Reference Trait Implementation for Shared Segment Pools
impl Deref for SharedSegmentPool {
    type Target = SegmentPool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
