// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::eui48::MacAddress;
use ::libc::EBADMSG;
use ::std::net::{
    Ipv4Addr,
    Ipv6Addr,
};

//======================================================================================================================
// Constants
//======================================================================================================================

pub const ETHERNET2_HEADER_SIZE: usize = 14;
pub const IPV4_HEADER_MIN_SIZE: usize = 20;
pub const IPV6_HEADER_SIZE: usize = 40;
/// Both TCP and UDP start with a source and a destination port.
pub const TRANSPORT_PORTS_SIZE: usize = 4;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Where the link, network, and transport headers of a packet start.
///
/// Positions are byte offsets from the start of the packet's buffer, so they stay valid when the buffer is copied
/// with its layout intact. Only a reallocation that changes the headroom moves them, and it does so through
/// [HeaderMarkers::shift]. A marker may point outside the current data window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeaderMarkers {
    mac: Option<usize>,
    network: Option<usize>,
    transport: Option<usize>,
}

/// Ethernet II header view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ethernet2Header {
    // Bytes 0..6
    dst_addr: MacAddress,
    // Bytes 6..12
    src_addr: MacAddress,
    // Bytes 12..14
    ether_type: u16,
}

/// IPv4 header view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Internet Header Length, in 32-bit words (4 bits).
    ihl: u8,
    /// Total length of the datagram, header included.
    total_length: u16,
    /// Time to live.
    ttl: u8,
    /// Protocol carried in the payload.
    protocol: u8,
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
}

/// IPv6 fixed header view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv6Header {
    payload_length: u16,
    next_header: u8,
    hop_limit: u8,
    src_addr: Ipv6Addr,
    dst_addr: Ipv6Addr,
}

/// View of the port pair that leads TCP and UDP headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportPorts {
    src_port: u16,
    dst_port: u16,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl HeaderMarkers {
    pub const fn new() -> Self {
        Self {
            mac: None,
            network: None,
            transport: None,
        }
    }

    /// Unsets every marker.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn mac(&self) -> Option<usize> {
        self.mac
    }

    pub fn network(&self) -> Option<usize> {
        self.network
    }

    pub fn transport(&self) -> Option<usize> {
        self.transport
    }

    /// Lowest set marker.
    pub(crate) fn lowest(&self) -> Option<usize> {
        [self.mac, self.network, self.transport].into_iter().flatten().min()
    }

    pub(crate) fn set_mac(&mut self, position: Option<usize>) {
        self.mac = position;
    }

    pub(crate) fn set_network(&mut self, position: Option<usize>) {
        self.network = position;
    }

    pub(crate) fn set_transport(&mut self, position: Option<usize>) {
        self.transport = position;
    }

    /// Moves every set marker by `delta` bytes, after the buffer contents were moved by the same amount into a buffer
    /// of `buffer_len` bytes. Unset markers stay unset. A marker whose bytes did not survive the move is unset.
    pub(crate) fn shift(&mut self, delta: isize, buffer_len: usize) {
        for marker in [&mut self.mac, &mut self.network, &mut self.transport] {
            if let Some(position) = *marker {
                *marker = position
                    .checked_add_signed(delta)
                    .filter(|shifted| *shifted <= buffer_len);
                if marker.is_none() {
                    trace!("shift(): dropping header marker (position={:?}, delta={:?})", position, delta);
                }
            }
        }
    }
}

impl Ethernet2Header {
    pub fn parse(buf: &[u8]) -> Result<Self, Fail> {
        if buf.len() < ETHERNET2_HEADER_SIZE {
            return Err(Fail::new(EBADMSG, "frame too small"));
        }
        Ok(Self {
            dst_addr: MacAddress::from_bytes(&buf[0..6]).map_err(|_| Fail::new(EBADMSG, "bad destination address"))?,
            src_addr: MacAddress::from_bytes(&buf[6..12]).map_err(|_| Fail::new(EBADMSG, "bad source address"))?,
            ether_type: u16::from_be_bytes([buf[12], buf[13]]),
        })
    }

    pub fn dst_addr(&self) -> MacAddress {
        self.dst_addr
    }

    pub fn src_addr(&self) -> MacAddress {
        self.src_addr
    }

    pub fn ether_type(&self) -> u16 {
        self.ether_type
    }
}

impl Ipv4Header {
    pub fn parse(buf: &[u8]) -> Result<Self, Fail> {
        if buf.len() < IPV4_HEADER_MIN_SIZE {
            return Err(Fail::new(EBADMSG, "datagram too small"));
        }
        let version: u8 = buf[0] >> 4;
        if version != 4 {
            return Err(Fail::new(EBADMSG, "not an IPv4 datagram"));
        }
        let ihl: u8 = buf[0] & 0xf;
        if (ihl as usize) * 4 < IPV4_HEADER_MIN_SIZE {
            return Err(Fail::new(EBADMSG, "IPv4 header length too small"));
        }
        Ok(Self {
            ihl,
            total_length: u16::from_be_bytes([buf[2], buf[3]]),
            ttl: buf[8],
            protocol: buf[9],
            src_addr: Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]),
            dst_addr: Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]),
        })
    }

    /// Computes the size of the header (in bytes), options included.
    pub fn header_length(&self) -> usize {
        (self.ihl as usize) * 4
    }

    pub fn total_length(&self) -> u16 {
        self.total_length
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        self.src_addr
    }

    pub fn dst_addr(&self) -> Ipv4Addr {
        self.dst_addr
    }
}

impl Ipv6Header {
    pub fn parse(buf: &[u8]) -> Result<Self, Fail> {
        if buf.len() < IPV6_HEADER_SIZE {
            return Err(Fail::new(EBADMSG, "datagram too small"));
        }
        if buf[0] >> 4 != 6 {
            return Err(Fail::new(EBADMSG, "not an IPv6 datagram"));
        }
        let mut src: [u8; 16] = [0; 16];
        src.copy_from_slice(&buf[8..24]);
        let mut dst: [u8; 16] = [0; 16];
        dst.copy_from_slice(&buf[24..40]);
        Ok(Self {
            payload_length: u16::from_be_bytes([buf[4], buf[5]]),
            next_header: buf[6],
            hop_limit: buf[7],
            src_addr: Ipv6Addr::from(src),
            dst_addr: Ipv6Addr::from(dst),
        })
    }

    pub fn payload_length(&self) -> u16 {
        self.payload_length
    }

    pub fn next_header(&self) -> u8 {
        self.next_header
    }

    pub fn hop_limit(&self) -> u8 {
        self.hop_limit
    }

    pub fn src_addr(&self) -> Ipv6Addr {
        self.src_addr
    }

    pub fn dst_addr(&self) -> Ipv6Addr {
        self.dst_addr
    }
}

impl TransportPorts {
    pub fn parse(buf: &[u8]) -> Result<Self, Fail> {
        if buf.len() < TRANSPORT_PORTS_SIZE {
            return Err(Fail::new(EBADMSG, "segment too small"));
        }
        Ok(Self {
            src_port: u16::from_be_bytes([buf[0], buf[1]]),
            dst_port: u16::from_be_bytes([buf[2], buf[3]]),
        })
    }

    pub fn src_port(&self) -> u16 {
        self.src_port
    }

    pub fn dst_port(&self) -> u16 {
        self.dst_port
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
