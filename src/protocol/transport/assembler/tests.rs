//! Reassembly tests covering sequencing, timeouts, truncation, and
//! type mismatches.
use super::*;
use crate::protocol::transport::can_frame::ExtendedId;

fn ext_frame(msg_type: u8, seq: u8, total: u16, data: &[u8]) -> CanFrame {
    CanFrame::extended(ExtendedId::new(msg_type, seq, total), data)
}

#[test]
fn full_reassembly_strips_the_sender_byte() {
    let mut assembler = ExtendedAssembler::new();

    // Logical body: [sender=0x07][1..=13]
    let result = assembler.process_frame(&ext_frame(0x03, 0, 2, &[0x07, 1, 2, 3, 4, 5, 6, 7]), 0);
    assert_eq!(result, AssemblyResult::FragmentConsumed);

    let result = assembler.process_frame(&ext_frame(0x03, 1, 2, &[8, 9, 10, 11, 12, 13]), 10);
    let AssemblyResult::Complete(message) = result else {
        panic!("expected completed message");
    };
    assert_eq!(message.msg_type, 0x03);
    assert_eq!(message.sender_id, 0x07);
    assert_eq!(
        message.payload.as_slice(),
        &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13]
    );
}

#[test]
fn single_frame_transfer_completes_immediately() {
    let mut assembler = ExtendedAssembler::new();
    let result = assembler.process_frame(&ext_frame(0x05, 0, 1, &[0x07, b'h', b'i']), 0);
    let AssemblyResult::Complete(message) = result else {
        panic!("expected completed message");
    };
    assert_eq!(message.sender_id, 0x07);
    assert_eq!(message.payload.as_slice(), b"hi");
}

#[test]
fn continuation_without_start_is_ignored() {
    let mut assembler = ExtendedAssembler::new();
    let result = assembler.process_frame(&ext_frame(0x03, 1, 3, &[1, 2, 3]), 0);
    assert_eq!(result, AssemblyResult::Ignored);
}

#[test]
fn type_mismatch_drops_the_frame_but_keeps_the_buffer() {
    let mut assembler = ExtendedAssembler::new();
    assembler.process_frame(&ext_frame(0x03, 0, 2, &[0x07, 1, 2]), 0);

    // A stray continuation of another message type is dropped.
    let result = assembler.process_frame(&ext_frame(0x05, 1, 2, &[9, 9]), 1);
    assert_eq!(result, AssemblyResult::Ignored);

    // The original transfer still completes.
    let result = assembler.process_frame(&ext_frame(0x03, 1, 2, &[3, 4]), 2);
    assert!(matches!(result, AssemblyResult::Complete(_)));
}

#[test]
fn new_start_replaces_a_stale_transfer() {
    let mut assembler = ExtendedAssembler::new();
    assembler.process_frame(&ext_frame(0x03, 0, 3, &[0x07, 1, 2]), 0);

    // Frame zero always resets the buffer, whatever was in flight.
    let result = assembler.process_frame(&ext_frame(0x05, 0, 1, &[0x08, 5]), 1);
    let AssemblyResult::Complete(message) = result else {
        panic!("expected completed message");
    };
    assert_eq!(message.msg_type, 0x05);
    assert_eq!(message.sender_id, 0x08);
}

#[test]
fn idle_buffer_times_out_silently() {
    let mut assembler = ExtendedAssembler::new();
    assembler.process_frame(&ext_frame(0x03, 0, 3, &[0x07, 1, 2]), 0);

    // 1001 ms later the partial transfer is gone, so a continuation
    // of it no longer matches anything.
    let result = assembler.process_frame(&ext_frame(0x03, 1, 3, &[3, 4]), 1001);
    assert_eq!(result, AssemblyResult::Ignored);
}

#[test]
fn just_inside_the_timeout_still_assembles() {
    let mut assembler = ExtendedAssembler::new();
    assembler.process_frame(&ext_frame(0x03, 0, 2, &[0x07, 1]), 0);
    let result = assembler.process_frame(&ext_frame(0x03, 1, 2, &[2]), 1000);
    assert!(matches!(result, AssemblyResult::Complete(_)));
}

#[test]
fn oversized_message_is_delivered_truncated() {
    let mut assembler = ExtendedAssembler::new();
    // 20 frames × 8 bytes = 160 logical bytes, past the 128 cap.
    let total = 20u16;
    let mut result = assembler.process_frame(&ext_frame(0x03, 0, total, &[0x07; 8]), 0);
    for seq in 1..total {
        result = assembler.process_frame(&ext_frame(0x03, seq as u8, total, &[0xAB; 8]), 1);
    }
    let AssemblyResult::Complete(message) = result else {
        panic!("expected completed message");
    };
    assert_eq!(message.payload.len(), MAX_EXTENDED_PAYLOAD);
}

#[test]
fn empty_first_frame_is_ignored() {
    let mut assembler = ExtendedAssembler::new();
    let result = assembler.process_frame(&ext_frame(0x03, 0, 2, &[]), 0);
    assert_eq!(result, AssemblyResult::Ignored);
}

#[test]
fn standard_frames_pass_through_untouched() {
    let mut assembler = ExtendedAssembler::new();
    let frame = CanFrame::standard(0x03, &[0x07, 1, 2]);
    assert_eq!(assembler.process_frame(&frame, 0), AssemblyResult::Ignored);
}
