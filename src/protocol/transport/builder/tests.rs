//! Frame generator tests: chunking, header fields, and the
//! build-then-assemble round trip.
use super::*;
use crate::protocol::transport::assembler::{AssemblyResult, ExtendedAssembler};
use crate::protocol::transport::can_frame::CanId;

#[test]
fn forty_three_byte_body_yields_six_frames() {
    // A 40-byte publish payload plus its 3-byte header.
    let mut body = [0u8; 43];
    for (index, byte) in body.iter_mut().enumerate() {
        *byte = index as u8;
    }
    let mut frames = [CanFrame::standard(0, &[]); 6];
    let mut count = 0;
    for frame in ExtendedFrameBuilder::new(0x03, &body).frames() {
        frames[count] = frame;
        count += 1;
    }

    assert_eq!(count, 6);
    for (index, frame) in frames.iter().enumerate() {
        let CanId::Extended(id) = frame.id else {
            panic!("expected extended id");
        };
        assert_eq!(id.msg_type(), 0x03);
        assert_eq!(id.frame_seq() as usize, index);
        assert_eq!(id.total_frames(), 6);
    }
    // Five full frames, then the 3-byte remainder.
    assert_eq!(frames[4].len, 8);
    assert_eq!(frames[5].len, 3);
    assert_eq!(frames[5].payload(), &[40, 41, 42]);
}

#[test]
fn exact_multiple_has_no_short_tail() {
    let body = [0u8; 16];
    let mut last = None;
    let mut count = 0;
    for frame in ExtendedFrameBuilder::new(0x04, &body).frames() {
        last = Some(frame);
        count += 1;
    }
    assert_eq!(count, 2);
    assert_eq!(last.unwrap().len, 8);
}

#[test]
fn build_then_assemble_is_identity_on_the_body() {
    // Body layout on the wire: [sender][payload…]; the assembler
    // peels the sender off again.
    let mut body: heapless::Vec<u8, 128> = heapless::Vec::new();
    body.push(0x2A).unwrap();
    for byte in 0..90u8 {
        body.push(byte).unwrap();
    }

    let mut assembler = ExtendedAssembler::new();
    let mut completed = None;
    for frame in ExtendedFrameBuilder::new(0x09, &body).frames() {
        match assembler.process_frame(&frame, 0) {
            AssemblyResult::Complete(message) => completed = Some(message),
            AssemblyResult::FragmentConsumed => {}
            AssemblyResult::Ignored => panic!("frame unexpectedly ignored"),
        }
    }

    let message = completed.expect("transfer should complete");
    assert_eq!(message.msg_type, 0x09);
    assert_eq!(message.sender_id, 0x2A);
    assert_eq!(message.payload.as_slice(), &body[1..]);
}
