//! Fuzz target: `parse_frame`
//!
//! Drives arbitrary byte sequences through the inbound frame parser and
//! asserts that it never panics, never yields a payload larger than the
//! frame length allows, and keeps making progress on the stream.
//!
//! cargo fuzz run fuzz_frame_parser

#![no_main]

use flowguard::radio::frame::{FRAME_HEADER_LEN, MAX_INBOUND_PAYLOAD, parse_frame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut it = data.iter().copied();

    // Parse back-to-back frames until the stream runs dry or errors.
    for _ in 0..data.len() + 1 {
        match parse_frame(|| it.next()) {
            Ok(Some(frame)) => {
                assert!(frame.payload.len() <= MAX_INBOUND_PAYLOAD);
                assert_eq!(
                    usize::from(frame.length),
                    usize::from(FRAME_HEADER_LEN) + frame.payload.len()
                );
            }
            Ok(None) | Err(_) => break,
        }
    }
});
