// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod databuffer;

//==============================================================================
// Exports
//==============================================================================

pub use self::databuffer::{
    BufferDestructor,
    DataBuffer,
};
