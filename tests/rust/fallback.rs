// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::anyhow::Result;
use ::pktcore::{
    pool,
    runtime::logging,
    Packet,
    PoolConfig,
    PoolStats,
    WritablePacket,
};
use ::std::thread;

//==============================================================================
// test_unit_pool_and_fallback_agree()
//==============================================================================

/// Packets behave the same whether their memory was recycled or freshly allocated.
///
/// Runs with the global pool disabled, so that a fresh worker has nothing to recycle until it releases a packet.
#[test]
fn test_unit_pool_and_fallback_agree() -> Result<()> {
    logging::initialize();
    pool::initialize(PoolConfig {
        global_batches: 0,
        ..PoolConfig::default()
    })?;

    let worker = thread::spawn(|| -> Result<()> {
        let before: PoolStats = pool::stats();
        let fresh: WritablePacket = Packet::make(0, Some(b"AB"), 2, 0)?;
        pktcore::ensure_eq!(pool::stats().fallback_allocations, before.fallback_allocations + 2);
        pktcore::ensure_eq!(pool::stats().pool_hits, before.pool_hits);
        pktcore::ensure_eq!(fresh.data()[0], b'A');
        pktcore::ensure_eq!(fresh.data()[1], b'B');

        // Release a packet of the same shape, then allocate from what it left behind.
        Packet::make(0, Some(b"zz"), 2, 0)?.kill();
        let before: PoolStats = pool::stats();
        let pooled: WritablePacket = Packet::make(0, Some(b"AB"), 2, 0)?;
        pktcore::ensure_eq!(pool::stats().pool_hits, before.pool_hits + 2);
        pktcore::ensure_eq!(pooled.data()[0], b'A');
        pktcore::ensure_eq!(pooled.data()[1], b'B');

        pktcore::ensure_eq!(pooled.data(), fresh.data());
        pktcore::ensure_eq!(pooled.headroom(), fresh.headroom());
        pktcore::ensure_eq!(pooled.length(), fresh.length());
        pktcore::ensure_eq!(pooled.tailroom(), fresh.tailroom());
        pktcore::ensure_eq!(pooled.annotations(), fresh.annotations());
        Ok(())
    });
    match worker.join() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("worker panicked"),
    }
}
