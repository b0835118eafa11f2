// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod sequence_number;

pub mod reassembly;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::sequence_number::SeqNumber;
