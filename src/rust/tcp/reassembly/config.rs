// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Constants
//======================================================================================================================

/// Number of network buffers the stack is provisioned with, used to derive the reassembly budget when no explicit
/// limit is configured.
pub const DEFAULT_NETWORK_BUFFER_COUNT: usize = 16384;

/// Fraction of the network-buffer budget that reassembly queues may pin down.
const BUFFER_BUDGET_DIVISOR: usize = 16;

/// Maximum number of segments a single connection may hold in its reassembly queue.
pub const DEFAULT_MAX_SEGMENTS_PER_QUEUE: usize = 48;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Reassembly Configuration Descriptor
#[derive(Clone, Debug)]
pub struct ReassemblyConfig {
    /// Global ceiling on queued reassembly segments across all connections.
    max_queued_segments: usize,
    /// Per-connection ceiling on queued reassembly segments.
    max_segments_per_queue: usize,
    /// Capacity of the segment-descriptor pool.
    pool_capacity: usize,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

/// Associated Functions for Reassembly Configuration Descriptors
impl ReassemblyConfig {
    /// Creates a Reassembly Configuration Descriptor.
    pub fn new(
        network_buffer_count: Option<usize>,
        max_queued_segments: Option<usize>,
        max_segments_per_queue: Option<usize>,
        pool_capacity: Option<usize>,
    ) -> Self {
        let mut options: Self = Self::default();

        if let Some(value) = network_buffer_count {
            let budget: usize = value / BUFFER_BUDGET_DIVISOR;
            options = options.set_max_queued_segments(budget);
            options = options.set_pool_capacity(budget);
        }
        if let Some(value) = max_queued_segments {
            options = options.set_max_queued_segments(value);
            options = options.set_pool_capacity(value);
        }
        if let Some(value) = max_segments_per_queue {
            options = options.set_max_segments_per_queue(value);
        }
        if let Some(value) = pool_capacity {
            options = options.set_pool_capacity(value);
        }

        options
    }

    /// Gets the global segment ceiling in the target [ReassemblyConfig].
    pub fn get_max_queued_segments(&self) -> usize {
        self.max_queued_segments
    }

    /// Gets the per-connection segment ceiling in the target [ReassemblyConfig].
    pub fn get_max_segments_per_queue(&self) -> usize {
        self.max_segments_per_queue
    }

    /// Gets the descriptor pool capacity in the target [ReassemblyConfig].
    pub fn get_pool_capacity(&self) -> usize {
        self.pool_capacity
    }

    /// Sets the global segment ceiling in the target [ReassemblyConfig].
    fn set_max_queued_segments(mut self, value: usize) -> Self {
        assert!(value > 0);
        self.max_queued_segments = value;
        self
    }

    /// Sets the per-connection segment ceiling in the target [ReassemblyConfig].
    fn set_max_segments_per_queue(mut self, value: usize) -> Self {
        assert!(value > 0);
        self.max_segments_per_queue = value;
        self
    }

    /// Sets the descriptor pool capacity in the target [ReassemblyConfig].
    fn set_pool_capacity(mut self, value: usize) -> Self {
        assert!(value > 0);
        self.pool_capacity = value;
        self
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

/// Default Trait Implementation for Reassembly Configuration Descriptors
impl Default for ReassemblyConfig {
    /// Creates a Reassembly Configuration Descriptor with the default values.
    fn default() -> Self {
        ReassemblyConfig {
            max_queued_segments: DEFAULT_NETWORK_BUFFER_COUNT / BUFFER_BUDGET_DIVISOR,
            max_segments_per_queue: DEFAULT_MAX_SEGMENTS_PER_QUEUE,
            pool_capacity: DEFAULT_NETWORK_BUFFER_COUNT / BUFFER_BUDGET_DIVISOR,
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
