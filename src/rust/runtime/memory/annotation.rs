// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::std::{
    mem,
    net::{
        Ipv4Addr,
        Ipv6Addr,
    },
    time::Duration,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// The annotation block is addressed by byte offset by independently written processing stages, so the offsets below
// are a fixed contract. The block must fit the 48-byte control area of a host network buffer.

/// Size of the annotation block (in bytes).
pub const ANNOTATION_BLOCK_SIZE: usize = 48;

/// Offset of the address annotation (e.g. a destination address) within the annotation block.
pub const ADDRESS_ANNO_OFFSET: usize = 0;
/// Size of the address annotation (in bytes). Large enough for an IPv6 address.
pub const ADDRESS_ANNO_SIZE: usize = 16;

/// Offset of the general-purpose user annotation within the annotation block.
pub const USER_ANNO_OFFSET: usize = ADDRESS_ANNO_OFFSET + ADDRESS_ANNO_SIZE;
/// Size of the user annotation (in bytes).
pub const USER_ANNO_SIZE: usize = 24;
/// Number of 32-bit unsigned words in the user annotation.
pub const USER_ANNO_U_SIZE: usize = USER_ANNO_SIZE / mem::size_of::<u32>();
/// Number of 32-bit signed words in the user annotation.
pub const USER_ANNO_I_SIZE: usize = USER_ANNO_SIZE / mem::size_of::<i32>();

/// Offset of the performance counter annotation, which follows the user annotation.
pub const PERFCTR_ANNO_OFFSET: usize = USER_ANNO_OFFSET + USER_ANNO_SIZE;
/// Size of the performance counter annotation (in bytes).
pub const PERFCTR_ANNO_SIZE: usize = mem::size_of::<u64>();

//======================================================================================================================
// Structures
//======================================================================================================================

/// Raw, position-addressed annotation bytes.
#[repr(C, align(8))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnnotationBlock {
    bytes: [u8; ANNOTATION_BLOCK_SIZE],
}

// The address, user, and performance counter annotations must fit in the block.
const _: () = assert!(mem::size_of::<AnnotationBlock>() == ANNOTATION_BLOCK_SIZE);
const _: () = assert!(PERFCTR_ANNO_OFFSET + PERFCTR_ANNO_SIZE <= ANNOTATION_BLOCK_SIZE);

/// How a packet was addressed at the link layer. Values match the host's packet type codes.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// To us.
    #[default]
    Host = 0,
    /// To all.
    Broadcast = 1,
    /// To a group.
    Multicast = 2,
    /// To someone else.
    OtherHost = 3,
    /// Sent by us.
    Outgoing = 4,
    /// Looped back to us.
    Loopback = 5,
    /// Handled by a fast forwarding path.
    FastRoute = 6,
}

/// Opaque reference to the device a packet arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

/// Per-packet metadata stored beside, never inside, the packet data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Annotations {
    /// Position-addressed annotation bytes.
    block: AnnotationBlock,
    /// Arrival time, as time since the Unix epoch.
    timestamp: Duration,
    /// Device the packet arrived on.
    device: Option<DeviceId>,
    /// Link-layer packet class.
    packet_type: PacketType,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl AnnotationBlock {
    pub const fn zeroed() -> Self {
        Self {
            bytes: [0; ANNOTATION_BLOCK_SIZE],
        }
    }

    pub fn as_bytes(&self) -> &[u8; ANNOTATION_BLOCK_SIZE] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; ANNOTATION_BLOCK_SIZE] {
        &mut self.bytes
    }
}

impl Annotations {
    /// Creates a cleared set of annotations: all bytes zero, packet type [PacketType::Host], no device.
    pub const fn new() -> Self {
        Self {
            block: AnnotationBlock::zeroed(),
            timestamp: Duration::ZERO,
            device: None,
            packet_type: PacketType::Host,
        }
    }

    /// Resets every annotation to its initial value.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Copies every annotation from `other`.
    pub fn copy_from(&mut self, other: &Annotations) {
        *self = *other;
    }

    /// Raw annotation block.
    pub fn block(&self) -> &AnnotationBlock {
        &self.block
    }

    /// Raw annotation block, for stages that address it by offset.
    pub fn block_mut(&mut self) -> &mut AnnotationBlock {
        &mut self.block
    }

    /// The 16-byte address annotation.
    pub fn address_anno(&self) -> &[u8] {
        &self.block.bytes[ADDRESS_ANNO_OFFSET..ADDRESS_ANNO_OFFSET + ADDRESS_ANNO_SIZE]
    }

    pub fn address_anno_mut(&mut self) -> &mut [u8] {
        &mut self.block.bytes[ADDRESS_ANNO_OFFSET..ADDRESS_ANNO_OFFSET + ADDRESS_ANNO_SIZE]
    }

    /// Destination IPv4 address, stored in the first four bytes of the address annotation.
    pub fn dst_ip_anno(&self) -> Ipv4Addr {
        let anno: &[u8] = self.address_anno();
        Ipv4Addr::new(anno[0], anno[1], anno[2], anno[3])
    }

    pub fn set_dst_ip_anno(&mut self, addr: Ipv4Addr) {
        self.address_anno_mut()[..4].copy_from_slice(&addr.octets());
    }

    /// Destination IPv6 address, which takes up the whole address annotation.
    pub fn dst_ip6_anno(&self) -> Ipv6Addr {
        let mut octets: [u8; ADDRESS_ANNO_SIZE] = [0; ADDRESS_ANNO_SIZE];
        octets.copy_from_slice(self.address_anno());
        Ipv6Addr::from(octets)
    }

    pub fn set_dst_ip6_anno(&mut self, addr: Ipv6Addr) {
        self.address_anno_mut().copy_from_slice(&addr.octets());
    }

    /// The 24-byte user annotation.
    pub fn user_anno(&self) -> &[u8] {
        &self.block.bytes[USER_ANNO_OFFSET..USER_ANNO_OFFSET + USER_ANNO_SIZE]
    }

    pub fn user_anno_mut(&mut self) -> &mut [u8] {
        &mut self.block.bytes[USER_ANNO_OFFSET..USER_ANNO_OFFSET + USER_ANNO_SIZE]
    }

    /// Byte `i` of the user annotation.
    ///
    /// # Panics
    ///
    /// Panics if `i >= USER_ANNO_SIZE`.
    pub fn user_anno_c(&self, i: usize) -> u8 {
        self.user_anno()[i]
    }

    pub fn set_user_anno_c(&mut self, i: usize, value: u8) {
        self.user_anno_mut()[i] = value;
    }

    /// Unsigned 32-bit word `i` of the user annotation, in host byte order.
    ///
    /// # Panics
    ///
    /// Panics if `i >= USER_ANNO_U_SIZE`.
    pub fn user_anno_u(&self, i: usize) -> u32 {
        u32::from_ne_bytes(self.user_word(i))
    }

    pub fn set_user_anno_u(&mut self, i: usize, value: u32) {
        self.set_user_word(i, value.to_ne_bytes());
    }

    /// Signed 32-bit word `i` of the user annotation, in host byte order.
    ///
    /// # Panics
    ///
    /// Panics if `i >= USER_ANNO_I_SIZE`.
    pub fn user_anno_i(&self, i: usize) -> i32 {
        i32::from_ne_bytes(self.user_word(i))
    }

    pub fn set_user_anno_i(&mut self, i: usize, value: i32) {
        self.set_user_word(i, value.to_ne_bytes());
    }

    /// Performance counter reading taken when the packet entered the system, in host byte order.
    pub fn perfctr_anno(&self) -> u64 {
        let mut word: [u8; PERFCTR_ANNO_SIZE] = [0; PERFCTR_ANNO_SIZE];
        word.copy_from_slice(&self.block.bytes[PERFCTR_ANNO_OFFSET..PERFCTR_ANNO_OFFSET + PERFCTR_ANNO_SIZE]);
        u64::from_ne_bytes(word)
    }

    pub fn set_perfctr_anno(&mut self, value: u64) {
        self.block.bytes[PERFCTR_ANNO_OFFSET..PERFCTR_ANNO_OFFSET + PERFCTR_ANNO_SIZE]
            .copy_from_slice(&value.to_ne_bytes());
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: Duration) {
        self.timestamp = timestamp;
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    pub fn set_device(&mut self, device: Option<DeviceId>) {
        self.device = device;
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn set_packet_type(&mut self, packet_type: PacketType) {
        self.packet_type = packet_type;
    }

    fn user_word(&self, i: usize) -> [u8; 4] {
        let start: usize = i * 4;
        let mut word: [u8; 4] = [0; 4];
        word.copy_from_slice(&self.user_anno()[start..start + 4]);
        word
    }

    fn set_user_word(&mut self, i: usize, word: [u8; 4]) {
        let start: usize = i * 4;
        self.user_anno_mut()[start..start + 4].copy_from_slice(&word);
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for AnnotationBlock {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl TryFrom<u8> for PacketType {
    type Error = Fail;

    fn try_from(value: u8) -> Result<Self, Fail> {
        match value {
            0 => Ok(PacketType::Host),
            1 => Ok(PacketType::Broadcast),
            2 => Ok(PacketType::Multicast),
            3 => Ok(PacketType::OtherHost),
            4 => Ok(PacketType::Outgoing),
            5 => Ok(PacketType::Loopback),
            6 => Ok(PacketType::FastRoute),
            _ => Err(Fail::new(libc::EINVAL, "unknown packet type")),
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ::anyhow::Result;

    #[test]
    fn new_annotations_are_cleared() -> Result<()> {
        let anno: Annotations = Annotations::new();
        anyhow::ensure!(anno.block().as_bytes().iter().all(|b| *b == 0));
        crate::ensure_eq!(anno.packet_type(), PacketType::Host);
        crate::ensure_eq!(anno.device(), None);
        crate::ensure_eq!(anno.timestamp(), Duration::ZERO);
        crate::ensure_eq!(anno, Annotations::default());
        Ok(())
    }

    #[test]
    fn layout_is_position_addressed() -> Result<()> {
        let mut anno: Annotations = Annotations::new();
        anno.set_dst_ip_anno(Ipv4Addr::new(10, 0, 0, 1));
        anno.set_user_anno_c(0, 0xab);
        anno.set_user_anno_u(USER_ANNO_U_SIZE - 1, 0xdead_beef);

        let bytes: &[u8; ANNOTATION_BLOCK_SIZE] = anno.block().as_bytes();
        crate::ensure_eq!(&bytes[ADDRESS_ANNO_OFFSET..ADDRESS_ANNO_OFFSET + 4], &[10, 0, 0, 1]);
        crate::ensure_eq!(bytes[USER_ANNO_OFFSET], 0xab);
        crate::ensure_eq!(
            &bytes[USER_ANNO_OFFSET + USER_ANNO_SIZE - 4..USER_ANNO_OFFSET + USER_ANNO_SIZE],
            &0xdead_beef_u32.to_ne_bytes()
        );
        Ok(())
    }

    #[test]
    fn user_words_alias_user_bytes() -> Result<()> {
        let mut anno: Annotations = Annotations::new();
        anno.set_user_anno_i(1, -2);
        crate::ensure_eq!(anno.user_anno_u(1), (-2i32) as u32);
        crate::ensure_eq!(&anno.user_anno()[4..8], &(-2i32).to_ne_bytes());
        crate::ensure_eq!(anno.user_anno_i(0), 0);
        Ok(())
    }

    #[test]
    fn ipv6_anno_overlaps_ipv4_anno() -> Result<()> {
        let mut anno: Annotations = Annotations::new();
        let addr: Ipv6Addr = "fe80::1".parse()?;
        anno.set_dst_ip6_anno(addr);
        crate::ensure_eq!(anno.dst_ip6_anno(), addr);
        crate::ensure_eq!(anno.dst_ip_anno(), Ipv4Addr::new(0xfe, 0x80, 0, 0));
        Ok(())
    }

    #[test]
    fn perfctr_anno_follows_user_anno() -> Result<()> {
        let mut anno: Annotations = Annotations::new();
        anno.set_user_anno_u(USER_ANNO_U_SIZE - 1, u32::MAX);
        anno.set_perfctr_anno(0x0102_0304_0506_0708);
        crate::ensure_eq!(anno.perfctr_anno(), 0x0102_0304_0506_0708);
        crate::ensure_eq!(anno.user_anno_u(USER_ANNO_U_SIZE - 1), u32::MAX);
        crate::ensure_eq!(
            &anno.block().as_bytes()[PERFCTR_ANNO_OFFSET..],
            &0x0102_0304_0506_0708_u64.to_ne_bytes()
        );

        anno.clear();
        crate::ensure_eq!(anno.perfctr_anno(), 0);
        Ok(())
    }

    #[test]
    fn copy_and_clear() -> Result<()> {
        let mut source: Annotations = Annotations::new();
        source.set_timestamp(Duration::from_micros(1_500_000));
        source.set_device(Some(DeviceId(3)));
        source.set_packet_type(PacketType::Broadcast);
        source.set_user_anno_c(5, 9);

        let mut target: Annotations = Annotations::new();
        target.copy_from(&source);
        crate::ensure_eq!(target, source);

        target.clear();
        crate::ensure_eq!(target, Annotations::new());
        crate::ensure_neq!(source, Annotations::new());
        Ok(())
    }

    #[test]
    fn packet_type_codes() -> Result<()> {
        crate::ensure_eq!(PacketType::try_from(6)?, PacketType::FastRoute);
        crate::ensure_eq!(PacketType::Loopback as u8, 5);
        anyhow::ensure!(PacketType::try_from(7).is_err());
        Ok(())
    }
}
