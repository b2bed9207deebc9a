//! Unit tests for the frame codec: packing, decoding, and CRC verification
//! of InterLink frames.

use interlink_rs::{compute_crc, decode_packet, pack_packet, verify_packet, Packet, PacketFlags};

/// Tests that an empty-body frame packs to the canonical 10-byte wire image.
#[test]
fn test_pack_empty_frame() {
    let packet = Packet::new(0x0001, PacketFlags::empty(), 0, &[]);
    let wire = pack_packet(&packet);
    assert_eq!(
        &wire[..],
        &[0xAA, 0x55, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2D]
    );
}

/// Tests that a body-carrying frame is correctly packed.
#[test]
fn test_pack_frame_with_body() {
    let packet = Packet::new(0x0003, PacketFlags::empty(), 1, b"hi");
    let wire = pack_packet(&packet);
    assert_eq!(
        &wire[..],
        &[0xAA, 0x55, 0x01, 0x00, 0x03, 0x00, 0x01, 0x02, 0x68, 0x69, 0x8E, 0x2D]
    );
}

/// Tests that a packed frame decodes back to the same packet.
#[test]
fn test_decode_roundtrip() {
    let packet = Packet::new(0x000A, PacketFlags::ACK_REQ, 42, &[1, 2, 3, 4]);
    let wire = pack_packet(&packet);

    let (remaining, decoded) = decode_packet(&wire).unwrap();
    assert!(remaining.is_empty());
    assert_eq!(decoded, packet);
    assert!(verify_packet(&decoded).is_ok());
}

/// Tests that decoding leaves trailing bytes untouched.
#[test]
fn test_decode_leaves_remainder() {
    let mut wire = pack_packet(&Packet::new(0x0001, PacketFlags::empty(), 0, &[])).to_vec();
    wire.extend_from_slice(&[0xDE, 0xAD]);

    let (remaining, _) = decode_packet(&wire).unwrap();
    assert_eq!(remaining, &[0xDE, 0xAD]);
}

/// Tests that decoding fails without the sync word.
#[test]
fn test_decode_requires_sync_word() {
    let mut wire = pack_packet(&Packet::new(0x0001, PacketFlags::empty(), 0, &[])).to_vec();
    wire[0] = 0x00;
    assert!(decode_packet(&wire).is_err());
}

/// Tests that verification rejects a frame whose CRC field was corrupted.
#[test]
fn test_verify_rejects_bad_crc() {
    let mut packet = Packet::new(0x0002, PacketFlags::IS_RESP, 7, &[0xAB]);
    packet.crc = packet.crc.wrapping_add(1);
    assert!(verify_packet(&packet).is_err());
}

/// Tests that the flags byte on the wire always has a zero upper nibble.
#[test]
fn test_flags_upper_nibble_is_zero() {
    for raw in 0u8..=255 {
        let flags = PacketFlags::from_bits_truncate(raw);
        let packet = Packet::new(0x0001, flags, 0, &[]);
        assert_eq!(packet.header_bytes()[3] & 0xF0, 0);
    }
}

/// Tests that the stored CRC matches an independent recomputation.
#[test]
fn test_constructor_computes_crc() {
    let packet = Packet::new(0x0006, PacketFlags::empty(), 0, &[50, b'b', b'o', b'o', b't']);
    assert_eq!(packet.crc, compute_crc(&packet));
    assert_eq!(packet.crc, 0xBF14);
}

/// Tests the IsAck-over-IsResp classification helper.
#[test]
fn test_reply_flag_helper() {
    assert!(PacketFlags::IS_ACK.is_reply());
    assert!(PacketFlags::IS_RESP.is_reply());
    assert!((PacketFlags::IS_ACK | PacketFlags::IS_ERR).is_reply());
    assert!(!PacketFlags::ACK_REQ.is_reply());
    assert!(!PacketFlags::empty().is_reply());
}
