// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod accountant;
mod config;
mod pool;
mod queue;
mod receiver;
mod segment;
mod sink;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    accountant::{
        ResourceAccountant,
        SharedAccountant,
    },
    config::{
        ReassemblyConfig,
        DEFAULT_MAX_SEGMENTS_PER_QUEUE,
        DEFAULT_NETWORK_BUFFER_COUNT,
    },
    pool::{
        SegmentPool,
        SharedSegmentPool,
    },
    queue::{
        MergeResult,
        ReassemblyQueue,
    },
    receiver::{
        DeliveryFlags,
        Receiver,
    },
    segment::SegmentDescriptor,
    sink::{
        ReceiveQueue,
        ReceiveSink,
    },
};
