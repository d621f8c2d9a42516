// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    limits,
    memory::{
        annotation::Annotations,
        buffer::{
            BufferDestructor,
            DataBuffer,
        },
        headers::{
            Ethernet2Header,
            HeaderMarkers,
            Ipv4Header,
            Ipv6Header,
            TransportPorts,
            IPV6_HEADER_SIZE,
        },
        pool::{
            self,
            Allocation,
            HeaderSlot,
            PoolConfig,
        },
    },
};
use ::libc::{
    EBUSY,
    EINVAL,
    ENOENT,
};
use ::std::{
    fmt,
    mem::{
        ManuallyDrop,
        MaybeUninit,
    },
    ops::Deref,
    ptr::{
        self,
        NonNull,
    },
    sync::Arc,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Everything a packet handle owns besides the bytes themselves. Lives in pooled storage.
///
/// The data window is `data_off..tail_off` within the first `buffer_len` bytes of `storage`. The storage may be larger
/// than `buffer_len` when the buffer came from the pool; the surplus is never exposed.
pub(crate) struct PacketHeader {
    pub(super) storage: Arc<DataBuffer>,
    pub(super) buffer_len: usize,
    pub(super) data_off: usize,
    pub(super) tail_off: usize,
    pub(super) markers: HeaderMarkers,
    pub(super) anno: Annotations,
    pub(super) next: Option<Packet>,
}

/// Packet
///
/// A handle on a window of bytes plus per-handle metadata (bounds, header markers, annotations, chain link). Several
/// handles may share the same bytes, so a `Packet` only grants read access to them. To write, turn the handle into a
/// [WritablePacket] with [Packet::uniqueify], which copies the bytes only if they are shared.
///
/// Dropping a handle (or calling [Packet::kill]) releases it: its storage goes back to the pool, and the bytes are
/// released once the last handle on them is gone.
pub struct Packet {
    pub(super) header: ManuallyDrop<Box<PacketHeader>>,
}

/// Packet whose bytes are referenced by no other handle.
///
/// Reads go through [Deref] to [Packet]. There is deliberately no way to borrow the inner [Packet] mutably, since that
/// would allow sharing the bytes behind this handle's back.
pub struct WritablePacket {
    pub(super) packet: Packet,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

/// Constructors.
impl Packet {
    /// Creates a packet with `headroom` bytes of headroom, `length` bytes of data and `tailroom` bytes of tailroom. If
    /// `data` is given, its first `length` bytes are copied into the packet; otherwise the data bytes are unspecified.
    /// Annotations start out cleared.
    pub fn make(headroom: usize, data: Option<&[u8]>, length: usize, tailroom: usize) -> Result<WritablePacket, Fail> {
        let buffer_len: usize = headroom
            .checked_add(length)
            .and_then(|n| n.checked_add(tailroom))
            .filter(|n| *n <= limits::BUFFER_LENGTH_MAX)
            .ok_or_else(|| Fail::new(EINVAL, "packet buffer too large"))?;
        if let Some(data) = data {
            if data.len() < length {
                return Err(Fail::new(EINVAL, "source data is shorter than the requested length"));
            }
        }

        let config: &PoolConfig = pool::config();
        let capacity: usize = buffer_len.max(config.min_buffer_length);
        let Allocation { header, data: storage } = pool::allocate(capacity <= config.buffer_size)?;
        let mut storage: Arc<DataBuffer> = match storage {
            Some(storage) => storage,
            None => pool::allocate_buffer(capacity)?,
        };
        if let Some(data) = data {
            exclusive_bytes(&mut storage)?[headroom..headroom + length].copy_from_slice(&data[..length]);
        }
        trace!(
            "make(): headroom={:?} length={:?} tailroom={:?} capacity={:?}",
            headroom,
            length,
            tailroom,
            storage.capacity()
        );

        let packet: Packet = Self::assemble(
            header,
            PacketHeader {
                storage,
                buffer_len,
                data_off: headroom,
                tail_off: headroom + length,
                markers: HeaderMarkers::new(),
                anno: Annotations::new(),
                next: None,
            },
        );
        Ok(WritablePacket { packet })
    }

    /// Creates a packet of `length` unspecified bytes with the default headroom and no tailroom.
    pub fn make_with_len(length: usize) -> Result<WritablePacket, Fail> {
        Self::make(limits::DEFAULT_HEADROOM, None, length, 0)
    }

    /// Creates a packet holding a copy of `data`, with the default headroom and no tailroom.
    pub fn from_slice(data: &[u8]) -> Result<WritablePacket, Fail> {
        Self::make(limits::DEFAULT_HEADROOM, Some(data), data.len(), 0)
    }

    /// Creates a packet over `len` bytes of externally supplied memory, without copying. The whole region is data: the
    /// packet has no headroom and no tailroom. `destructor` runs exactly once, when the last handle on the bytes is
    /// released, including when this function fails.
    ///
    /// # Safety
    ///
    /// `data` must be valid for reads and writes of `len` initialized bytes until `destructor` is invoked, and nothing
    /// else may access that memory in the meantime.
    pub unsafe fn make_external(
        data: NonNull<u8>,
        len: usize,
        destructor: BufferDestructor,
    ) -> Result<WritablePacket, Fail> {
        // Take ownership first, so that every failure below hands the memory back through the destructor.
        let storage: Arc<DataBuffer> = Arc::new(DataBuffer::from_external(data, len, destructor));
        if len > limits::BUFFER_LENGTH_MAX {
            return Err(Fail::new(EINVAL, "external buffer too large"));
        }
        let Allocation { header, .. } = pool::allocate(false)?;
        trace!("make_external(): len={:?}", len);

        let packet: Packet = Self::assemble(
            header,
            PacketHeader {
                storage,
                buffer_len: len,
                data_off: 0,
                tail_off: len,
                markers: HeaderMarkers::new(),
                anno: Annotations::new(),
                next: None,
            },
        );
        Ok(WritablePacket { packet })
    }

    /// Creates a packet that takes over `data` without copying it.
    pub fn from_boxed_slice(data: Box<[u8]>) -> Result<WritablePacket, Fail> {
        let len: usize = data.len();
        let region: NonNull<u8> = NonNull::from(Box::leak(data)).cast::<u8>();
        let destructor: BufferDestructor = Box::new(|ptr: NonNull<u8>, len: usize| {
            // Safety: `ptr` and `len` are exactly the region leaked above, handed back once by the data buffer.
            drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(ptr.as_ptr(), len)) });
        });
        // Safety: the region is a live, initialized allocation that nothing else can reach after the leak.
        unsafe { Self::make_external(region, len, destructor) }
    }

    /// Moves `header` into pooled storage and wraps it in a handle.
    pub(super) fn assemble(mut slot: HeaderSlot, header: PacketHeader) -> Packet {
        slot.write(header);
        // Safety: the slot was just initialized, and MaybeUninit<T> has the same layout as T.
        let header: Box<PacketHeader> = unsafe { Box::from_raw(Box::into_raw(slot).cast::<PacketHeader>()) };
        Packet {
            header: ManuallyDrop::new(header),
        }
    }
}

/// Bounds.
impl Packet {
    /// Current data.
    pub fn data(&self) -> &[u8] {
        &self.header.storage.as_slice()[self.header.data_off..self.header.tail_off]
    }

    /// Address one past the last data byte.
    pub fn end_data(&self) -> *const u8 {
        self.data().as_ptr_range().end
    }

    pub fn length(&self) -> usize {
        self.header.tail_off - self.header.data_off
    }

    pub fn headroom(&self) -> usize {
        self.header.data_off
    }

    pub fn tailroom(&self) -> usize {
        self.header.buffer_len - self.header.tail_off
    }

    /// Whole buffer: headroom, data and tailroom.
    pub fn buffer_data(&self) -> &[u8] {
        &self.header.storage.as_slice()[..self.header.buffer_len]
    }

    pub fn buffer_length(&self) -> usize {
        self.header.buffer_len
    }

    /// Removes up to `n` bytes from the front of the data. Asking for more than [Packet::length] removes everything.
    pub fn pull(&mut self, n: usize) {
        let n: usize = self.clamp_trim("pull", n);
        self.header.data_off += n;
    }

    /// Removes up to `n` bytes from the back of the data. Asking for more than [Packet::length] removes everything.
    pub fn take(&mut self, n: usize) {
        let n: usize = self.clamp_trim("take", n);
        self.header.tail_off -= n;
    }

    /// Prepends `n` bytes of unspecified content. Moves the data window when the bytes are ours and there is enough
    /// headroom, and reallocates otherwise. On failure the packet is released.
    pub fn push(mut self, n: usize) -> Result<WritablePacket, Fail> {
        if n <= self.headroom() && self.is_exclusive() {
            self.header.data_off -= n;
            Ok(WritablePacket { packet: self })
        } else {
            self.expensive_push(n)
        }
    }

    /// Appends `n` bytes of unspecified content. Moves the data window when the bytes are ours and there is enough
    /// tailroom, and reallocates otherwise. On failure the packet is released.
    pub fn put(mut self, n: usize) -> Result<WritablePacket, Fail> {
        if n <= self.tailroom() && self.is_exclusive() {
            self.header.tail_off += n;
            Ok(WritablePacket { packet: self })
        } else {
            self.expensive_put(n)
        }
    }

    /// Like [Packet::push], but keeps sharing the bytes when there is enough headroom. The new front bytes are whatever
    /// the buffer holds there, which other handles may be using.
    pub fn nonunique_push(mut self, n: usize) -> Result<Packet, Fail> {
        if n <= self.headroom() {
            self.header.data_off -= n;
            Ok(self)
        } else {
            Ok(self.expensive_push(n)?.into_packet())
        }
    }

    /// Like [Packet::put], but keeps sharing the bytes when there is enough tailroom.
    pub fn nonunique_put(mut self, n: usize) -> Result<Packet, Fail> {
        if n <= self.tailroom() {
            self.header.tail_off += n;
            Ok(self)
        } else {
            Ok(self.expensive_put(n)?.into_packet())
        }
    }

    /// Repositions the data window to start `headroom` bytes into the buffer and span `length` bytes. Fails, leaving
    /// the packet untouched, if that does not fit in the buffer.
    pub fn change_headroom_and_length(&mut self, headroom: usize, length: usize) -> Result<(), Fail> {
        match headroom.checked_add(length) {
            Some(end) if end <= self.header.buffer_len => {
                self.header.data_off = headroom;
                self.header.tail_off = end;
                Ok(())
            },
            _ => {
                let cause: String = format!(
                    "data window does not fit in buffer (headroom={:?}, length={:?}, buffer_length={:?})",
                    headroom, length, self.header.buffer_len
                );
                warn!("change_headroom_and_length(): {}", cause);
                Err(Fail::new(EINVAL, &cause))
            },
        }
    }

    fn clamp_trim(&self, op: &str, n: usize) -> usize {
        let length: usize = self.length();
        if n > length {
            warn!("{}(): clamping request to the data length (requested={:?}, length={:?})", op, n, length);
            return length;
        }
        n
    }
}

/// Sharing.
impl Packet {
    /// Returns `true` if other handles may be looking at this packet's bytes.
    pub fn shared(&self) -> bool {
        Arc::strong_count(&self.header.storage) > 1
    }

    /// Number of handles on this packet's bytes, this one included.
    pub fn use_count(&self) -> usize {
        Arc::strong_count(&self.header.storage)
    }

    /// Returns `true` if the bytes are externally supplied memory.
    pub fn is_external(&self) -> bool {
        self.header.storage.is_external()
    }

    /// Checks that no other handle references the bytes, synchronizing with the release of any handle that did.
    pub(super) fn is_exclusive(&mut self) -> bool {
        Arc::get_mut(&mut self.header.storage).is_some()
    }

    /// Releases this handle.
    pub fn kill(self) {}
}

/// Header markers.
///
/// Markers are given and reported as signed offsets from the start of the data, since they may sit in the headroom.
impl Packet {
    pub fn mac_header_offset(&self) -> Option<isize> {
        self.header.markers.mac().map(|position| self.relative(position))
    }

    pub fn network_header_offset(&self) -> Option<isize> {
        self.header.markers.network().map(|position| self.relative(position))
    }

    pub fn transport_header_offset(&self) -> Option<isize> {
        self.header.markers.transport().map(|position| self.relative(position))
    }

    /// Distance between the network and transport markers, if both are set and in order.
    pub fn network_header_length(&self) -> Option<usize> {
        let network: usize = self.header.markers.network()?;
        self.header.markers.transport()?.checked_sub(network)
    }

    /// Same as [Packet::network_header_offset], for IPv4 packets.
    pub fn ip_header_offset(&self) -> Option<isize> {
        self.network_header_offset()
    }

    /// Same as [Packet::network_header_length], for IPv4 packets.
    pub fn ip_header_length(&self) -> Option<usize> {
        self.network_header_length()
    }

    /// Same as [Packet::network_header_offset], for IPv6 packets.
    pub fn ip6_header_offset(&self) -> Option<isize> {
        self.network_header_offset()
    }

    /// Same as [Packet::network_header_length], for IPv6 packets.
    pub fn ip6_header_length(&self) -> Option<usize> {
        self.network_header_length()
    }

    /// Bytes from the link-layer marker to the end of the data.
    pub fn mac_header(&self) -> Option<&[u8]> {
        self.header.markers.mac().map(|position| self.bytes_from(position))
    }

    /// Bytes from the network marker to the end of the data.
    pub fn network_header(&self) -> Option<&[u8]> {
        self.header.markers.network().map(|position| self.bytes_from(position))
    }

    /// Bytes from the transport marker to the end of the data.
    pub fn transport_header(&self) -> Option<&[u8]> {
        self.header.markers.transport().map(|position| self.bytes_from(position))
    }

    /// Sets the link-layer marker `offset` bytes from the start of the data. If `len` is given, the network marker is
    /// set right after the link-layer header.
    pub fn set_mac_header(&mut self, offset: isize, len: Option<usize>) -> Result<(), Fail> {
        let position: usize = self.absolute(offset)?;
        let next: Option<usize> = len.map(|len| self.following(position, len)).transpose()?;
        self.header.markers.set_mac(Some(position));
        if next.is_some() {
            self.header.markers.set_network(next);
        }
        Ok(())
    }

    /// Sets the network marker `offset` bytes from the start of the data. If `len` is given, the transport marker is
    /// set right after the network header.
    pub fn set_network_header(&mut self, offset: isize, len: Option<usize>) -> Result<(), Fail> {
        let position: usize = self.absolute(offset)?;
        let next: Option<usize> = len.map(|len| self.following(position, len)).transpose()?;
        self.header.markers.set_network(Some(position));
        if next.is_some() {
            self.header.markers.set_transport(next);
        }
        Ok(())
    }

    /// Sets the network marker on an IPv6 header, whose fixed part is always 40 bytes long.
    pub fn set_ip6_header(&mut self, offset: isize) -> Result<(), Fail> {
        self.set_network_header(offset, Some(IPV6_HEADER_SIZE))
    }

    pub fn set_transport_header(&mut self, offset: isize) -> Result<(), Fail> {
        let position: usize = self.absolute(offset)?;
        self.header.markers.set_transport(Some(position));
        Ok(())
    }

    /// Parses the Ethernet header at the link-layer marker.
    pub fn ether_header(&self) -> Result<Ethernet2Header, Fail> {
        Ethernet2Header::parse(self.mac_header().ok_or_else(|| Fail::new(ENOENT, "link-layer header not set"))?)
    }

    /// Parses the IPv4 header at the network marker.
    pub fn ip_header(&self) -> Result<Ipv4Header, Fail> {
        Ipv4Header::parse(self.network_header().ok_or_else(|| Fail::new(ENOENT, "network header not set"))?)
    }

    /// Parses the IPv6 header at the network marker.
    pub fn ip6_header(&self) -> Result<Ipv6Header, Fail> {
        Ipv6Header::parse(self.network_header().ok_or_else(|| Fail::new(ENOENT, "network header not set"))?)
    }

    /// Parses the port pair at the transport marker.
    pub fn transport_ports(&self) -> Result<TransportPorts, Fail> {
        TransportPorts::parse(self.transport_header().ok_or_else(|| Fail::new(ENOENT, "transport header not set"))?)
    }

    /// Raw marker positions, relative to the start of the buffer.
    pub fn header_markers(&self) -> &HeaderMarkers {
        &self.header.markers
    }

    /// Converts a buffer position into an offset from the start of the data.
    fn relative(&self, position: usize) -> isize {
        position as isize - self.header.data_off as isize
    }

    /// Converts an offset from the start of the data into a buffer position.
    fn absolute(&self, offset: isize) -> Result<usize, Fail> {
        self.header
            .data_off
            .checked_add_signed(offset)
            .filter(|position| *position <= self.header.buffer_len)
            .ok_or_else(|| {
                let cause: String = format!("header offset outside of the buffer (offset={:?})", offset);
                warn!("absolute(): {}", cause);
                Fail::new(EINVAL, &cause)
            })
    }

    fn following(&self, position: usize, len: usize) -> Result<usize, Fail> {
        position
            .checked_add(len)
            .filter(|next| *next <= self.header.buffer_len)
            .ok_or_else(|| Fail::new(EINVAL, "header length runs past the buffer"))
    }

    fn bytes_from(&self, position: usize) -> &[u8] {
        let start: usize = position.min(self.header.tail_off);
        &self.header.storage.as_slice()[start..self.header.tail_off]
    }
}

/// Annotations and chaining.
impl Packet {
    pub fn annotations(&self) -> &Annotations {
        &self.header.anno
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.header.anno
    }

    /// Resets the annotations and the header markers, and releases the chained packets.
    pub fn clear_annotations(&mut self) {
        self.header.anno.clear();
        self.header.markers.clear();
        drop(self.header.next.take());
    }

    /// Copies every annotation of `other` into this packet. Header markers and chaining are left alone.
    pub fn copy_annotations(&mut self, other: &Packet) {
        self.header.anno.copy_from(&other.header.anno);
    }

    /// Packet chained after this one.
    pub fn next(&self) -> Option<&Packet> {
        self.header.next.as_ref()
    }

    pub fn next_mut(&mut self) -> Option<&mut Packet> {
        self.header.next.as_mut()
    }

    /// Chains `next` after this packet, returning what was chained before.
    pub fn set_next(&mut self, next: Option<Packet>) -> Option<Packet> {
        std::mem::replace(&mut self.header.next, next)
    }

    /// Unchains the packet after this one.
    pub fn take_next(&mut self) -> Option<Packet> {
        self.header.next.take()
    }
}

impl WritablePacket {
    /// Current data, for writing.
    pub fn data_mut(&mut self) -> &mut [u8] {
        let (start, end): (usize, usize) = (self.packet.header.data_off, self.packet.header.tail_off);
        &mut self.bytes_mut()[start..end]
    }

    /// Whole buffer, for writing.
    pub fn buffer_data_mut(&mut self) -> &mut [u8] {
        let end: usize = self.packet.header.buffer_len;
        &mut self.bytes_mut()[..end]
    }

    pub fn mac_header_mut(&mut self) -> Option<&mut [u8]> {
        let position: usize = self.packet.header.markers.mac()?;
        Some(self.bytes_from_mut(position))
    }

    pub fn network_header_mut(&mut self) -> Option<&mut [u8]> {
        let position: usize = self.packet.header.markers.network()?;
        Some(self.bytes_from_mut(position))
    }

    pub fn transport_header_mut(&mut self) -> Option<&mut [u8]> {
        let position: usize = self.packet.header.markers.transport()?;
        Some(self.bytes_from_mut(position))
    }

    /// Prepends `n` bytes of unspecified content, reallocating only if there is not enough headroom.
    pub fn push(mut self, n: usize) -> Result<WritablePacket, Fail> {
        if n <= self.packet.headroom() {
            self.packet.header.data_off -= n;
            Ok(self)
        } else {
            self.packet.expensive_push(n)
        }
    }

    /// Appends `n` bytes of unspecified content, reallocating only if there is not enough tailroom.
    pub fn put(mut self, n: usize) -> Result<WritablePacket, Fail> {
        if n <= self.packet.tailroom() {
            self.packet.header.tail_off += n;
            Ok(self)
        } else {
            self.packet.expensive_put(n)
        }
    }

    pub fn pull(&mut self, n: usize) {
        self.packet.pull(n)
    }

    pub fn take(&mut self, n: usize) {
        self.packet.take(n)
    }

    pub fn change_headroom_and_length(&mut self, headroom: usize, length: usize) -> Result<(), Fail> {
        self.packet.change_headroom_and_length(headroom, length)
    }

    /// See [Packet::shift_data]. The bytes stay exclusive either way.
    pub fn shift_data(&mut self, offset: isize) -> Result<(), Fail> {
        self.packet.shift_data(offset)
    }

    pub fn set_mac_header(&mut self, offset: isize, len: Option<usize>) -> Result<(), Fail> {
        self.packet.set_mac_header(offset, len)
    }

    pub fn set_network_header(&mut self, offset: isize, len: Option<usize>) -> Result<(), Fail> {
        self.packet.set_network_header(offset, len)
    }

    pub fn set_ip6_header(&mut self, offset: isize) -> Result<(), Fail> {
        self.packet.set_ip6_header(offset)
    }

    pub fn set_transport_header(&mut self, offset: isize) -> Result<(), Fail> {
        self.packet.set_transport_header(offset)
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        self.packet.annotations_mut()
    }

    pub fn clear_annotations(&mut self) {
        self.packet.clear_annotations()
    }

    pub fn copy_annotations(&mut self, other: &Packet) {
        self.packet.copy_annotations(other)
    }

    pub fn set_next(&mut self, next: Option<Packet>) -> Option<Packet> {
        self.packet.set_next(next)
    }

    pub fn take_next(&mut self) -> Option<Packet> {
        self.packet.take_next()
    }

    pub fn next_mut(&mut self) -> Option<&mut Packet> {
        self.packet.next_mut()
    }

    /// Gives up write access.
    pub fn into_packet(self) -> Packet {
        self.packet
    }

    pub fn kill(self) {}

    fn bytes_mut(&mut self) -> &mut [u8] {
        let storage: &DataBuffer = &self.packet.header.storage;
        debug_assert_eq!(Arc::strong_count(&self.packet.header.storage), 1);
        // Safety: a WritablePacket is the only handle on its bytes, and `&mut self` rules out any other live view
        // through this handle. The region is `capacity` initialized bytes.
        unsafe { std::slice::from_raw_parts_mut(storage.as_mut_ptr(), storage.capacity()) }
    }

    fn bytes_from_mut(&mut self, position: usize) -> &mut [u8] {
        let end: usize = self.packet.header.tail_off;
        let start: usize = position.min(end);
        &mut self.bytes_mut()[start..end]
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Borrows the bytes of a buffer that no other handle references.
pub(super) fn exclusive_bytes(storage: &mut Arc<DataBuffer>) -> Result<&mut [u8], Fail> {
    match Arc::get_mut(storage) {
        Some(buffer) => Ok(buffer.as_mut_slice()),
        None => Err(Fail::new(EBUSY, "data buffer is shared")),
    }
}

/// Returns a header and its data buffer to the pool, then releases the chained packets one at a time.
fn release(header: Box<PacketHeader>) {
    let raw: *mut PacketHeader = Box::into_raw(header);
    // Safety: `raw` points to an initialized header that nobody else can reach. We move every field out of it and,
    // from here on, treat the storage as uninitialized.
    let PacketHeader { storage, next, .. } = unsafe { raw.read() };
    // Safety: the allocation is still live and MaybeUninit<T> has the same layout as T.
    let slot: HeaderSlot = unsafe { Box::from_raw(raw.cast::<MaybeUninit<PacketHeader>>()) };
    pool::recycle(slot, Some(storage));

    // Unlink before dropping so that long chains do not recurse.
    let mut next: Option<Packet> = next;
    while let Some(mut packet) = next {
        next = packet.take_next();
        drop(packet);
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Drop for Packet {
    fn drop(&mut self) {
        // Safety: `header` is never touched again after this.
        let header: Box<PacketHeader> = unsafe { ManuallyDrop::take(&mut self.header) };
        release(header);
    }
}

impl Deref for WritablePacket {
    type Target = Packet;

    fn deref(&self) -> &Packet {
        &self.packet
    }
}

impl From<WritablePacket> for Packet {
    fn from(packet: WritablePacket) -> Self {
        packet.into_packet()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("headroom", &self.headroom())
            .field("length", &self.length())
            .field("tailroom", &self.tailroom())
            .field("use_count", &self.use_count())
            .field("markers", &self.header.markers)
            .field("annotations", &self.header.anno)
            .field("chained", &self.header.next.is_some())
            .finish()
    }
}

impl fmt::Debug for WritablePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WritablePacket").field(&self.packet).finish()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
