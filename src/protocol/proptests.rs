//! Property-based tests for the frame decoder
//!
//! Chunking must never change what is decoded.

use super::*;
use proptest::prelude::*;

fn arb_text() -> impl Strategy<Value = String> {
    // Mix ASCII with two-, three- and four-byte characters
    "[a-zA-Z0-9 \u{e9}\u{4e2d}\u{1f600}\"\\\\]{0,24}"
}

fn arb_stream_event() -> impl Strategy<Value = StreamEvent> {
    (
        proptest::option::of(arb_text()),
        proptest::option::of(arb_text()),
        proptest::option::of(any::<bool>()),
        proptest::option::of(any::<bool>()),
        proptest::option::of(0u32..4),
        proptest::option::of("session_[a-z0-9]{4}"),
    )
        .prop_map(
            |(content, sources, done, require_email, skip_count, session_id)| StreamEvent {
                content,
                sources,
                done,
                require_email,
                skip_count,
                session_id,
                ..StreamEvent::default()
            },
        )
}

/// Lines the decoder must ignore
fn arb_noise_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just(": keep-alive".to_string()),
        Just("data: [DONE]".to_string()),
        Just("data: {broken".to_string()),
        "event: [a-z]{1,8}",
    ]
}

fn arb_body() -> impl Strategy<Value = (Vec<StreamEvent>, Vec<u8>)> {
    proptest::collection::vec((arb_stream_event(), proptest::option::of(arb_noise_line())), 0..8)
        .prop_map(|items| {
            let mut body = String::new();
            let mut events = Vec::new();
            for (event, noise) in items {
                if let Some(noise) = noise {
                    body.push_str(&noise);
                    body.push('\n');
                }
                body.push_str(&event.to_line());
                events.push(event);
            }
            (events, body.into_bytes())
        })
}

/// Split `bytes` at the given (unsorted, possibly duplicate) cut points
fn split_at_points(bytes: &[u8], mut cuts: Vec<usize>) -> Vec<Vec<u8>> {
    cuts.iter_mut().for_each(|c| *c %= bytes.len() + 1);
    cuts.sort_unstable();
    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(bytes[start..cut].to_vec());
        start = cut;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

proptest! {
    #[test]
    fn prop_chunking_is_transparent(
        (expected, body) in arb_body(),
        cuts in proptest::collection::vec(any::<usize>(), 0..16),
    ) {
        let mut decoder = FrameDecoder::new();
        let mut decoded = Vec::new();
        for chunk in split_at_points(&body, cuts) {
            decoded.extend(decoder.feed(&chunk));
        }
        prop_assert_eq!(decoded, expected);
        prop_assert!(!decoder.has_residual());
    }

    #[test]
    fn prop_byte_at_a_time_matches_one_shot((expected, body) in arb_body()) {
        let mut decoder = FrameDecoder::new();
        let mut decoded = Vec::new();
        for byte in &body {
            decoded.extend(decoder.feed(std::slice::from_ref(byte)));
        }
        prop_assert_eq!(&decoded, &expected);
        prop_assert_eq!(FrameDecoder::decode_all(&body), expected);
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..32), 0..8)
    ) {
        let mut decoder = FrameDecoder::new();
        for chunk in &chunks {
            let _ = decoder.feed(chunk);
        }
        let total: usize = chunks.iter().map(Vec::len).sum();
        prop_assert!(decoder.finish() <= total);
    }
}
