//! Extended-ID field packing tests.
use super::*;

#[test]
fn extended_id_field_extraction() {
    let id = ExtendedId::new(0x03, 2, 6);
    assert_eq!(id.msg_type(), 0x03);
    assert_eq!(id.frame_seq(), 2);
    assert_eq!(id.total_frames(), 6);
    assert_eq!(id.raw(), (0x03 << 21) | (2 << 13) | 6);
}

#[test]
fn extended_id_raw_round_trip() {
    for (msg_type, seq, total) in [(0x01, 0, 1), (0xFF, 255, 16), (0x0A, 7, 0x1FFF)] {
        let id = ExtendedId::new(msg_type, seq, total);
        let back = ExtendedId::from_raw(id.raw());
        assert_eq!(back.msg_type(), msg_type);
        assert_eq!(back.frame_seq(), seq);
        assert_eq!(back.total_frames(), total);
    }
}

#[test]
fn spare_total_frame_bits_are_masked() {
    // Bits above the 13 defined ones must not leak into the count.
    let id = ExtendedId::new(0x03, 0, 0xFFFF);
    assert_eq!(id.total_frames(), 0x1FFF);
    assert_eq!(id.msg_type(), 0x03);

    let noisy = ExtendedId::from_raw(0xFFFF_FFFF);
    assert_eq!(noisy.raw() >> 29, 0);
}

#[test]
fn frame_constructors_truncate_at_eight_bytes() {
    let frame = CanFrame::standard(0x03, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    assert_eq!(frame.len, 8);
    assert_eq!(frame.payload(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(frame.id, CanId::Standard(0x03));
    assert!(!frame.id.is_extended());

    let frame = CanFrame::extended(ExtendedId::new(0x03, 0, 2), &[1, 2]);
    assert_eq!(frame.payload(), &[1, 2]);
    assert!(frame.id.is_extended());
}
