// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Copy-on-write: cloning handles, making bytes exclusive, and the reallocating growth paths.
//!
//! Every reallocation goes through [Packet::expensive_uniqueify], which is the only place that moves bytes to a new
//! buffer and therefore the only place (together with [Packet::shift_data], which moves them within one) that shifts
//! header markers.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    limits,
    memory::{
        buffer::DataBuffer,
        packet::{
            exclusive_bytes,
            Packet,
            PacketHeader,
            WritablePacket,
        },
        pool::{
            self,
            Allocation,
            PoolConfig,
        },
    },
};
use ::libc::EINVAL;
use ::std::{
    mem,
    sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
};

//======================================================================================================================
// Static Variables
//======================================================================================================================

/// Number of slow-path growth diagnostics emitted so far.
static EXPENSIVE_CHATTER: AtomicUsize = AtomicUsize::new(0);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Packet {
    /// Creates another handle on the same bytes. The new handle gets a copy of the annotations and header markers, and
    /// no chained packet. Afterwards both handles are shared.
    ///
    /// Takes `&mut self` because a [WritablePacket] must never gain a sibling: convert it with
    /// [WritablePacket::into_packet] first.
    pub fn try_clone(&mut self) -> Result<Packet, Fail> {
        let Allocation { header, .. } = pool::allocate(false)?;
        let this: &PacketHeader = &self.header;
        Ok(Packet::assemble(
            header,
            PacketHeader {
                storage: this.storage.clone(),
                buffer_len: this.buffer_len,
                data_off: this.data_off,
                tail_off: this.tail_off,
                markers: this.markers,
                anno: this.anno,
                next: None,
            },
        ))
    }

    /// Grants write access to the bytes. Free if no other handle references them; otherwise the buffer is copied,
    /// layout included, and this handle lets go of the shared one. On failure the packet is released.
    pub fn uniqueify(mut self) -> Result<WritablePacket, Fail> {
        if !self.is_exclusive() {
            self.expensive_uniqueify(0, 0)?;
        }
        Ok(WritablePacket { packet: self })
    }

    /// Moves the data window by `offset` bytes (towards the tail if positive), keeping header markers on the same
    /// bytes. Header bytes left in the headroom by a pull move along with the data, starting from the lowest marker
    /// that precedes it. Done in place when the bytes are exclusive and there is enough room on that side. Otherwise
    /// the buffer is copied first, with the missing room added on the side being shifted to, so a shift larger than
    /// that room leaves the moved bytes flush against that end of the buffer.
    ///
    /// On failure the packet is left as it was.
    pub fn shift_data(&mut self, offset: isize) -> Result<(), Fail> {
        if offset == 0 {
            return Ok(());
        }
        let magnitude: usize = offset.unsigned_abs();
        let room: usize = if offset < 0 {
            self.shift_start()
        } else {
            self.tailroom()
        };
        let missing: usize = magnitude.saturating_sub(room);
        if missing > 0 || !self.is_exclusive() {
            if offset < 0 {
                self.expensive_uniqueify(missing, 0)?;
            } else {
                self.expensive_uniqueify(0, missing)?;
            }
        }

        let start: usize = self.shift_start();
        let moved = |position: usize| -> usize {
            if offset < 0 {
                position - magnitude
            } else {
                position + magnitude
            }
        };
        let header: &mut PacketHeader = &mut self.header;
        let end: usize = header.tail_off;
        exclusive_bytes(&mut header.storage)?.copy_within(start..end, moved(start));
        header.data_off = moved(header.data_off);
        header.tail_off = moved(end);
        header.markers.shift(offset, header.buffer_len);
        Ok(())
    }

    /// First byte moved by [Packet::shift_data]: the lowest header marker before the data, or the data itself.
    fn shift_start(&self) -> usize {
        let data_off: usize = self.header.data_off;
        self.header
            .markers
            .lowest()
            .filter(|position| *position < data_off)
            .unwrap_or(data_off)
    }

    /// Copies the buffer into a new, exclusive one with `extra_headroom` more bytes in front and `extra_tailroom` more
    /// bytes at the back. Header markers move with the bytes. On failure the packet is left as it was.
    pub(crate) fn expensive_uniqueify(&mut self, extra_headroom: usize, extra_tailroom: usize) -> Result<(), Fail> {
        let delta: isize = to_isize(extra_headroom)?;
        let header: &mut PacketHeader = &mut self.header;
        let kept: usize = header.buffer_len;
        let buffer_len: usize = kept
            .checked_add(extra_headroom)
            .and_then(|n| n.checked_add(extra_tailroom))
            .filter(|n| *n <= limits::BUFFER_LENGTH_MAX)
            .ok_or_else(|| Fail::new(EINVAL, "packet buffer too large"))?;

        let config: &PoolConfig = pool::config();
        let mut storage: Arc<DataBuffer> = pool::allocate_buffer(buffer_len.max(config.min_buffer_length))?;
        exclusive_bytes(&mut storage)?[extra_headroom..extra_headroom + kept]
            .copy_from_slice(&header.storage.as_slice()[..kept]);
        trace!(
            "expensive_uniqueify(): extra_headroom={:?} extra_tailroom={:?} buffer_length={:?}",
            extra_headroom,
            extra_tailroom,
            buffer_len
        );

        let previous: Arc<DataBuffer> = mem::replace(&mut header.storage, storage);
        header.buffer_len = buffer_len;
        header.data_off += extra_headroom;
        header.tail_off += extra_headroom;
        header.markers.shift(delta, buffer_len);
        pool::recycle_buffer(previous);
        Ok(())
    }

    /// Slow path of [Packet::push]: reallocates with `n` bytes plus some slack of extra headroom, then pushes.
    pub(crate) fn expensive_push(mut self, n: usize) -> Result<WritablePacket, Fail> {
        chatter("push", n, self.headroom());
        let extra: usize = growth(n)?;
        self.expensive_uniqueify(extra, 0)?;
        self.header.data_off -= n;
        Ok(WritablePacket { packet: self })
    }

    /// Slow path of [Packet::put]: reallocates with `n` bytes plus some slack of extra tailroom, then puts.
    pub(crate) fn expensive_put(mut self, n: usize) -> Result<WritablePacket, Fail> {
        chatter("put", n, self.tailroom());
        let extra: usize = growth(n)?;
        self.expensive_uniqueify(0, extra)?;
        self.header.tail_off += n;
        Ok(WritablePacket { packet: self })
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Room added by a reallocating push or put of `n` bytes: `n` plus slack, rounded up to a multiple of four.
fn growth(n: usize) -> Result<usize, Fail> {
    n.checked_add(pool::config().growth_slack)
        .and_then(|extra| extra.checked_add(3))
        .map(|extra| extra & !3)
        .ok_or_else(|| Fail::new(EINVAL, "growth too large"))
}

fn to_isize(n: usize) -> Result<isize, Fail> {
    isize::try_from(n).map_err(|_| Fail::new(EINVAL, "offset too large"))
}

/// Reports the first few slow-path growths, which usually mean a producer reserves too little room.
fn chatter(op: &str, wanted: usize, room: usize) {
    if wanted > room && EXPENSIVE_CHATTER.fetch_add(1, Ordering::Relaxed) < limits::EXPENSIVE_CHATTER_MAX {
        debug!("expensive {}: have {:?} bytes of room, wanted {:?}", op, room, wanted);
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
