//! Block framing and escaping
//!
//! A framed block is `START`, the escaped payload, `END`. Any payload byte
//! equal to one of the three reserved values is replaced by `ESCAPE`
//! followed by a substitute code, so `START` and `END` never occur inside a
//! frame and blocks can be located scanning in either direction.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

/// Marks the start of a block
pub const START_BYTE: u8 = 0x01;
/// Marks the end of a block
pub const END_BYTE: u8 = 0x00;
/// Introduces an escaped byte
pub const ESCAPE_BYTE: u8 = 0xFF;
/// Substitute for a literal `START_BYTE`
pub const ESCAPED_START_BYTE: u8 = 0x02;
/// Substitute for a literal `END_BYTE`
pub const ESCAPED_END_BYTE: u8 = 0x03;
/// Substitute for a literal `ESCAPE_BYTE`
pub const ESCAPED_ESCAPE_BYTE: u8 = 0x04;

/// Whether `b` must be escaped inside a frame
pub fn is_reserved(b: u8) -> bool {
    matches!(b, START_BYTE | END_BYTE | ESCAPE_BYTE)
}

/// Append the escaped form of `payload` to `out`
pub fn escape_into(payload: &[u8], out: &mut BytesMut) {
    for &b in payload {
        match b {
            START_BYTE => out.put_slice(&[ESCAPE_BYTE, ESCAPED_START_BYTE]),
            END_BYTE => out.put_slice(&[ESCAPE_BYTE, ESCAPED_END_BYTE]),
            ESCAPE_BYTE => out.put_slice(&[ESCAPE_BYTE, ESCAPED_ESCAPE_BYTE]),
            _ => out.put_u8(b),
        }
    }
}

/// Frame a payload for embedding in a block stream
pub fn frame_block(payload: &[u8]) -> Bytes {
    let escapes = payload.iter().filter(|&&b| is_reserved(b)).count();
    let mut out = BytesMut::with_capacity(payload.len() + escapes + 2);
    out.put_u8(START_BYTE);
    escape_into(payload, &mut out);
    out.put_u8(END_BYTE);
    out.freeze()
}

/// Recover the payload from the raw bytes between `START` and `END`
///
/// An escape followed by an unknown code is corruption: the code byte is
/// passed through unchanged so the rest of the log stays readable. A
/// trailing escape with no successor is dropped.
pub fn unescape_block(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut escaped = false;
    for (i, &b) in raw.iter().enumerate() {
        if escaped {
            escaped = false;
            match b {
                ESCAPED_START_BYTE => out.push(START_BYTE),
                ESCAPED_END_BYTE => out.push(END_BYTE),
                ESCAPED_ESCAPE_BYTE => out.push(ESCAPE_BYTE),
                other => {
                    warn!(
                        offset = i,
                        byte = %format!("0x{:02X}", other),
                        "Invalid escaped byte in block"
                    );
                    out.push(other);
                }
            }
        } else if b == ESCAPE_BYTE {
            escaped = true;
        } else {
            out.push(b);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(payload: &[u8]) -> Vec<u8> {
        let framed = frame_block(payload);
        assert_eq!(framed[0], START_BYTE);
        assert_eq!(framed[framed.len() - 1], END_BYTE);
        unescape_block(&framed[1..framed.len() - 1])
    }

    #[test]
    fn test_empty_block() {
        assert_eq!(&frame_block(&[])[..], &[START_BYTE, END_BYTE]);
        assert!(roundtrip(&[]).is_empty());
    }

    #[test]
    fn test_plain_bytes_are_untouched() {
        let framed = frame_block(b"hello");
        assert_eq!(&framed[..], b"\x01hello\x00");
    }

    #[test]
    fn test_reserved_bytes_are_escaped() {
        let framed = frame_block(&[START_BYTE, END_BYTE, ESCAPE_BYTE]);
        assert_eq!(
            &framed[..],
            &[
                START_BYTE,
                ESCAPE_BYTE,
                ESCAPED_START_BYTE,
                ESCAPE_BYTE,
                ESCAPED_END_BYTE,
                ESCAPE_BYTE,
                ESCAPED_ESCAPE_BYTE,
                END_BYTE,
            ]
        );
        // No unescaped markers inside the frame
        let inner = &framed[1..framed.len() - 1];
        assert!(!inner.contains(&START_BYTE));
        assert!(!inner.contains(&END_BYTE));
    }

    #[test]
    fn test_roundtrip_seeds() {
        let seeds: &[&[u8]] = &[
            &[],
            &[0, 0, 0, 0xFF, 0, 0],
            &[9],
            &[0x0A],
            &[0xFF],
            &[1, 2, 3, 4],
            &[0xFF, 0x02, 0xFF, 0x03, 0xFF, 0x04],
        ];
        for seed in seeds {
            assert_eq!(roundtrip(seed), seed.to_vec(), "seed {:?}", seed);
        }
    }

    #[test]
    fn test_roundtrip_every_byte_value() {
        let all: Vec<u8> = (0..=255u8).collect();
        assert_eq!(roundtrip(&all), all);

        let reversed: Vec<u8> = (0..=255u8).rev().collect();
        assert_eq!(roundtrip(&reversed), reversed);
    }

    #[test]
    fn test_invalid_escape_passes_through() {
        let raw = [b'a', ESCAPE_BYTE, 0x07, b'b'];
        assert_eq!(unescape_block(&raw), vec![b'a', 0x07, b'b']);
    }

    #[test]
    fn test_trailing_escape_is_dropped() {
        let raw = [b'a', ESCAPE_BYTE];
        assert_eq!(unescape_block(&raw), vec![b'a']);
    }
}
