// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod buffer;
mod cow;

pub mod annotation;
pub mod headers;
pub mod packet;
pub mod pool;

//==============================================================================
// Exports
//==============================================================================

pub use self::{
    annotation::{
        Annotations,
        DeviceId,
        PacketType,
    },
    buffer::{
        BufferDestructor,
        DataBuffer,
    },
    headers::HeaderMarkers,
    packet::{
        Packet,
        WritablePacket,
    },
    pool::{
        PoolConfig,
        PoolStats,
    },
};
