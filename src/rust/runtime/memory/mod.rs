// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod segbuffer;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::segbuffer::SegmentBuffer;
