// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::anyhow::Result;
use ::crossbeam_channel::{
    Receiver,
    Sender,
};
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
// Constants
//==============================================================================

/// Number of packets handed between workers.
const NUM_PACKETS: usize = 5_000;

//==============================================================================
// Helpers
//==============================================================================

/// Runs `f` on a fresh worker thread, so that it starts with empty private lists.
fn on_worker<F>(f: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    match thread::spawn(f).join() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("worker panicked"),
    }
}

//==============================================================================
// test_unit_pool_bounds()
//==============================================================================

/// Releasing far more packets than a worker keeps never grows the pools past their caps.
#[test]
fn test_unit_pool_bounds() -> Result<()> {
    logging::initialize();
    on_worker(|| -> Result<()> {
        let config: &PoolConfig = pool::config();
        let count: usize = config.local_capacity * 3 + 1;

        for _ in 0..4 {
            let packets: Vec<WritablePacket> = (0..count)
                .map(|i| Packet::make(0, Some(&[i as u8]), 1, 0))
                .collect::<Result<_, _>>()?;
            drop(packets);

            let stats: PoolStats = pool::stats();
            anyhow::ensure!(stats.local_headers <= config.local_capacity);
            anyhow::ensure!(stats.local_buffers <= config.local_capacity);
            anyhow::ensure!(stats.global_header_batches <= config.global_batches);
            anyhow::ensure!(stats.global_buffer_batches <= config.global_batches);
        }
        anyhow::ensure!(pool::stats().batches_released > 0);

        pool::clear_local();
        pktcore::ensure_eq!(pool::stats().local_headers, 0);
        Ok(())
    })
}

//==============================================================================
// test_unit_cross_worker_release()
//==============================================================================

/// Clones released on another worker leave the original intact and exclusive.
#[test]
fn test_unit_cross_worker_release() -> Result<()> {
    let (tx, rx): (Sender<Packet>, Receiver<Packet>) = crossbeam_channel::bounded(64);

    let consumer: thread::JoinHandle<Result<usize>> = thread::spawn(move || -> Result<usize> {
        let mut received: usize = 0;
        for packet in rx.iter() {
            let mut writable: WritablePacket = packet.uniqueify()?;
            writable.data_mut().fill(0xff);
            received += 1;
        }
        Ok(received)
    });

    let mut originals: Vec<Packet> = Vec::with_capacity(NUM_PACKETS);
    for i in 0..NUM_PACKETS {
        let mut packet: Packet = Packet::from_slice(&(i as u32).to_be_bytes())?.into_packet();
        let clone: Packet = packet.try_clone()?;
        if tx.send(clone).is_err() {
            anyhow::bail!("consumer hung up");
        }
        originals.push(packet);
    }
    drop(tx);

    let received: usize = match consumer.join() {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("consumer panicked"),
    };
    pktcore::ensure_eq!(received, NUM_PACKETS);

    for (i, packet) in originals.into_iter().enumerate() {
        pktcore::ensure_eq!(packet.data(), &(i as u32).to_be_bytes());
        pktcore::ensure_eq!(packet.shared(), false);
    }
    Ok(())
}

//==============================================================================
// test_unit_initialize_after_use()
//==============================================================================

/// The pool cannot be reconfigured once it is in use.
#[test]
fn test_unit_initialize_after_use() -> Result<()> {
    let active: PoolConfig = *pool::config();
    match pool::initialize(PoolConfig::default()) {
        Ok(()) => anyhow::bail!("reconfiguring a pool in use should fail"),
        Err(e) => pktcore::ensure_eq!(e.errno, libc::EBUSY),
    }
    pktcore::ensure_eq!(*pool::config(), active);
    Ok(())
}
