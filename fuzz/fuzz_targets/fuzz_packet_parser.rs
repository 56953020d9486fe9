//! Fuzz target: `parse` and `PacketDecoder::feed`
//!
//! Drives arbitrary bytes through the one-shot parser and the streaming
//! decoder, asserting that neither panics and that every frame the
//! decoder emits is a complete header plus its declared payload.
//!
//! cargo fuzz run fuzz_packet_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use lumos::rpc::codec::{HEADER_SIZE, MAX_FRAME_SIZE, PacketDecoder, parse};

fuzz_target!(|data: &[u8]| {
    if let Ok(packet) = parse(data) {
        assert_eq!(packet.payload.len() + HEADER_SIZE, data.len());
    }

    let mut decoder = PacketDecoder::new();
    decoder.feed(data, |frame| {
        assert!(frame.len() >= HEADER_SIZE && frame.len() <= MAX_FRAME_SIZE);
        assert_eq!(frame.len(), HEADER_SIZE + usize::from(frame[HEADER_SIZE - 1]));
        let _ = parse(frame);
    });

    // After a reset the decoder must accept bytes cleanly again.
    decoder.reset();
    decoder.feed(data, |_| {});
});
