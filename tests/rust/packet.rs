// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::anyhow::Result;
use ::pktcore::{
    headers::Ipv4Header,
    runtime::logging,
    Packet,
    PacketType,
    WritablePacket,
};
use ::rand::{
    rngs::SmallRng,
    Rng,
    SeedableRng,
};
use ::std::net::Ipv4Addr;

//==============================================================================
// Constants
//==============================================================================

/// Seed for randomized tests, so that failures reproduce.
const SEED: u64 = 0x5eed_1234;

/// Number of random operations applied per packet.
const ITERATIONS: usize = 2_000;

//==============================================================================
// Helpers
//==============================================================================

fn check_bounds(packet: &Packet) -> Result<()> {
    pktcore::ensure_eq!(
        packet.headroom() + packet.length() + packet.tailroom(),
        packet.buffer_length()
    );
    pktcore::ensure_eq!(packet.data().len(), packet.length());
    Ok(())
}

//==============================================================================
// test_unit_bounds_invariant()
//==============================================================================

/// Applies random growth and shrink operations and checks that the bounds always add up.
#[test]
fn test_unit_bounds_invariant() -> Result<()> {
    logging::initialize();
    let mut rng: SmallRng = SmallRng::seed_from_u64(SEED);
    let mut packet: WritablePacket = Packet::make(8, None, 16, 8)?;
    let mut sibling: Option<Packet> = None;

    for _ in 0..ITERATIONS {
        let n: usize = rng.gen_range(0..64);
        packet = match rng.gen_range(0..7) {
            0 => packet.push(n)?,
            1 => packet.put(n)?,
            2 => {
                packet.pull(n);
                packet
            },
            3 => {
                packet.take(n);
                packet
            },
            4 => {
                let offset: isize = rng.gen_range(-64..64);
                packet.shift_data(offset)?;
                packet
            },
            5 => {
                // Share the bytes, then take them back.
                let mut shared: Packet = packet.into_packet();
                sibling = Some(shared.try_clone()?);
                shared.uniqueify()?
            },
            _ => {
                sibling = None;
                packet
            },
        };
        check_bounds(&packet)?;
        if let Some(sibling) = sibling.as_ref() {
            check_bounds(sibling)?;
        }
    }
    Ok(())
}

//==============================================================================
// test_unit_push_pull_round_trip()
//==============================================================================

/// Pushing then pulling the same amount restores the data without copying it.
#[test]
fn test_unit_push_pull_round_trip() -> Result<()> {
    let packet: WritablePacket = Packet::make(32, Some(b"round trip"), 10, 0)?;
    let data: *const u8 = packet.data().as_ptr();

    for n in [0, 1, 17, 32] {
        let mut pushed: WritablePacket = Packet::make(32, Some(b"round trip"), 10, 0)?.push(n)?;
        pushed.pull(n);
        pktcore::ensure_eq!(pushed.data(), b"round trip");
        pktcore::ensure_eq!(pushed.length(), 10);
        pktcore::ensure_eq!(pushed.headroom(), 32);
    }

    let mut packet: WritablePacket = packet.push(20)?;
    packet.pull(20);
    pktcore::ensure_eq!(packet.data().as_ptr(), data);
    Ok(())
}

//==============================================================================
// test_unit_cow_isolation()
//==============================================================================

/// Writes through a uniqueified clone are not visible through the original.
#[test]
fn test_unit_cow_isolation() -> Result<()> {
    let mut original: Packet = Packet::from_slice(b"original bytes")?.into_packet();
    let clone: Packet = original.try_clone()?;
    pktcore::ensure_eq!(original.shared(), true);

    let mut writable: WritablePacket = clone.uniqueify()?;
    writable.data_mut().copy_from_slice(b"modified bytes");
    pktcore::ensure_eq!(writable.data(), b"modified bytes");
    pktcore::ensure_eq!(original.data(), b"original bytes");
    pktcore::ensure_eq!(original.shared(), false);
    Ok(())
}

//==============================================================================
// test_unit_uniqueify_passthrough()
//==============================================================================

/// Uniqueifying a packet that is not shared keeps the same bytes.
#[test]
fn test_unit_uniqueify_passthrough() -> Result<()> {
    let packet: Packet = Packet::make_with_len(100)?.into_packet();
    pktcore::ensure_eq!(packet.shared(), false);
    let address: *const u8 = packet.buffer_data().as_ptr();

    let writable: WritablePacket = packet.uniqueify()?;
    pktcore::ensure_eq!(writable.buffer_data().as_ptr(), address);

    // Once the sibling is gone, the survivor is exclusive again.
    let mut packet: Packet = writable.into_packet();
    let sibling: Packet = packet.try_clone()?;
    sibling.kill();
    let writable: WritablePacket = packet.uniqueify()?;
    pktcore::ensure_eq!(writable.buffer_data().as_ptr(), address);
    Ok(())
}

//==============================================================================
// test_unit_header_shift_on_reallocation()
//==============================================================================

/// Header markers follow their bytes when a push has to reallocate.
#[test]
fn test_unit_header_shift_on_reallocation() -> Result<()> {
    let mut datagram: [u8; 28] = [0; 28];
    datagram[0] = 0x45;
    datagram[2..4].copy_from_slice(&28u16.to_be_bytes());
    datagram[8] = 64;
    datagram[9] = 17;
    datagram[12..16].copy_from_slice(&[10, 0, 0, 1]);
    datagram[16..20].copy_from_slice(&[10, 0, 0, 2]);
    datagram[20..24].copy_from_slice(&[0x13, 0x88, 0x13, 0x89]);

    let mut packet: WritablePacket = Packet::make(4, Some(&datagram), datagram.len(), 0)?;
    packet.set_mac_header(-4, None)?;
    packet.set_network_header(0, Some(20))?;
    let markers_before: [Option<usize>; 3] = [
        packet.header_markers().mac(),
        packet.header_markers().network(),
        packet.header_markers().transport(),
    ];
    let headroom_before: usize = packet.headroom();

    let n: usize = 14;
    let packet: WritablePacket = packet.push(n)?;
    // The bytes moved by however much headroom was added.
    let delta: usize = packet.headroom() + n - headroom_before;
    pktcore::ensure_eq!(packet.header_markers().mac(), markers_before[0].map(|m| m + delta));
    pktcore::ensure_eq!(packet.header_markers().network(), markers_before[1].map(|m| m + delta));
    pktcore::ensure_eq!(packet.header_markers().transport(), markers_before[2].map(|m| m + delta));

    // Relative to the data, everything moved back by the pushed amount.
    pktcore::ensure_eq!(packet.mac_header_offset(), Some(n as isize - 4));
    pktcore::ensure_eq!(packet.network_header_offset(), Some(n as isize));
    pktcore::ensure_eq!(packet.transport_header_offset(), Some(n as isize + 20));

    let ip: Ipv4Header = packet.ip_header()?;
    pktcore::ensure_eq!(ip.src_addr(), Ipv4Addr::new(10, 0, 0, 1));
    pktcore::ensure_eq!(ip.dst_addr(), Ipv4Addr::new(10, 0, 0, 2));
    pktcore::ensure_eq!(packet.transport_ports()?.dst_port(), 5001);
    Ok(())
}

//==============================================================================
// test_unit_clamped_trim()
//==============================================================================

/// Trimming more than the data leaves an empty packet instead of failing.
#[test]
fn test_unit_clamped_trim() -> Result<()> {
    let mut packet: WritablePacket = Packet::make(0, None, 10, 0)?;
    packet.take(packet.length() + 100);
    pktcore::ensure_eq!(packet.length(), 0);
    check_bounds(&packet)?;

    let mut packet: WritablePacket = Packet::make(0, None, 10, 0)?;
    packet.pull(packet.length() + 100);
    pktcore::ensure_eq!(packet.length(), 0);
    check_bounds(&packet)?;
    Ok(())
}

//==============================================================================
// test_unit_concrete_scenario()
//==============================================================================

#[test]
fn test_unit_concrete_scenario() -> Result<()> {
    let packet: WritablePacket = Packet::make(16, Some(b"hello"), 5, 8)?;
    pktcore::ensure_eq!(packet.headroom(), 16);
    pktcore::ensure_eq!(packet.length(), 5);
    pktcore::ensure_eq!(packet.tailroom(), 8);

    let mut packet: WritablePacket = packet.push(4)?;
    pktcore::ensure_eq!(packet.headroom(), 12);
    pktcore::ensure_eq!(packet.length(), 9);

    packet.pull(4);
    pktcore::ensure_eq!(packet.headroom(), 16);
    pktcore::ensure_eq!(packet.length(), 5);
    pktcore::ensure_eq!(packet.data(), b"hello");
    Ok(())
}

//==============================================================================
// test_unit_annotations_follow_clones()
//==============================================================================

/// Clones start with a copy of the annotations and then evolve independently.
#[test]
fn test_unit_annotations_follow_clones() -> Result<()> {
    let mut packet: Packet = Packet::make_with_len(64)?.into_packet();
    packet.annotations_mut().set_dst_ip_anno(Ipv4Addr::new(192, 0, 2, 1));
    packet.annotations_mut().set_packet_type(PacketType::Multicast);

    let mut clone: Packet = packet.try_clone()?;
    pktcore::ensure_eq!(clone.annotations(), packet.annotations());

    clone.annotations_mut().set_packet_type(PacketType::Outgoing);
    pktcore::ensure_eq!(packet.annotations().packet_type(), PacketType::Multicast);
    pktcore::ensure_eq!(clone.annotations().dst_ip_anno(), Ipv4Addr::new(192, 0, 2, 1));

    clone.clear_annotations();
    pktcore::ensure_eq!(clone.annotations().packet_type(), PacketType::Host);
    pktcore::ensure_eq!(clone.annotations().dst_ip_anno(), Ipv4Addr::UNSPECIFIED);
    Ok(())
}
