#![no_main]

use gquic_codec::protocol::dispatcher::{parse_packet, Perspective};
use gquic_codec::protocol::tag::QuicTag;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Both perspectives: panics, crashes, runaway allocation
    let _ = parse_packet(data, Perspective::Client);
    let _ = parse_packet(data, Perspective::Server);
    let _ = QuicTag::from_bytes(data);
});
