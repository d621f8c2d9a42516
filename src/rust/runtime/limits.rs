// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

/// Headroom reserved by the convenience constructors. Fits an Ethernet header plus a small encapsulation.
pub const DEFAULT_HEADROOM: usize = 28;

/// Smallest data buffer ever allocated for a packet.
pub const MIN_BUFFER_LENGTH: usize = 64;

/// Size of the canonical, recyclable data buffer. Large enough for a standard frame plus generous headroom.
pub const POOL_BUFFER_SIZE: usize = 2048;

/// Extra space added by a reallocating push or put, so that repeated small growths do not reallocate every time.
pub const GROWTH_SLACK: usize = 128;

/// Number of free entries of each kind a worker keeps before handing a batch to the global pool.
pub const LOCAL_POOL_CAPACITY: usize = 1000;

/// Number of batches the global overflow pool retains. Further batches evict the oldest one.
pub const GLOBAL_POOL_BATCHES: usize = 16;

/// Largest packet buffer we are willing to allocate.
pub const BUFFER_LENGTH_MAX: usize = u32::MAX as usize;

/// Number of expensive push/put diagnostics emitted before going quiet.
pub const EXPENSIVE_CHATTER_MAX: usize = 5;
