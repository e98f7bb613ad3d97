//! Delimiter-based message framing.
//!
//! Every message is a UTF-8 JSON object followed by a single `^` byte:
//!
//! ```text
//! +-----------------+---+-----------------+---+
//! |  JSON message   | ^ |  JSON message   | ^ |  ...
//! +-----------------+---+-----------------+---+
//! ```
//!
//! There is no length prefix. The transport may split or coalesce frames
//! arbitrarily, so the receiving side keeps a [`FrameDecoder`] per
//! connection that carries incomplete bytes over to the next read.

use serde::Serialize;

use crate::MAX_FRAME_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Byte terminating every frame.
pub const DELIMITER: u8 = b'^';

/// JSON escape written in place of a literal `^` inside string values.
const ESCAPED_DELIMITER: &[u8] = b"\\u005e";

/// Encodes a message as one delimiter-terminated frame.
///
/// A `^` can only occur inside JSON string values, where it is replaced by
/// the `\u005e` escape, so the frame contains exactly one delimiter.
///
/// # Example
///
/// ```rust
/// use stagelink_protocol::{encode_frame, Envelope, DELIMITER};
///
/// let frame = encode_frame(&Envelope::info("caret ^ inside")).unwrap();
/// assert_eq!(frame.iter().filter(|&&b| b == DELIMITER).count(), 1);
/// assert_eq!(frame.last(), Some(&DELIMITER));
/// ```
pub fn encode_frame<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;

    let mut frame = Vec::with_capacity(json.len() + 1);
    for &byte in &json {
        if byte == DELIMITER {
            frame.extend_from_slice(ESCAPED_DELIMITER);
        } else {
            frame.push(byte);
        }
    }
    frame.push(DELIMITER);
    Ok(frame)
}

/// Splits a buffer into complete frames and the trailing remainder.
///
/// Every piece followed by a delimiter is complete; empty pieces are
/// dropped. The returned remainder has no delimiter and is empty when the
/// buffer ends with one.
///
/// ```rust
/// use stagelink_protocol::split_frames;
///
/// let (frames, rest) = split_frames(b"^{\"a\":1}^^{\"b\"");
/// assert_eq!(frames, vec![&b"{\"a\":1}"[..]]);
/// assert_eq!(rest, b"{\"b\"");
/// ```
pub fn split_frames(buffer: &[u8]) -> (Vec<&[u8]>, &[u8]) {
    let mut frames = Vec::new();
    let mut start = 0;

    for (index, &byte) in buffer.iter().enumerate() {
        if byte == DELIMITER {
            if index > start {
                frames.push(&buffer[start..index]);
            }
            start = index + 1;
        }
    }

    (frames, &buffer[start..])
}

/// Stateful per-connection frame decoder.
///
/// Feed it whatever the socket returned; it yields the frames completed by
/// those bytes, in order. Errors are frame-local: a frame that is too large
/// or not UTF-8 is reported in its position and decoding carries on.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_frame_size: usize,
    /// Dropping bytes of an oversized frame until its delimiter shows up.
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates a decoder with the default frame size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Creates a decoder with a custom frame size limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_size,
            discarding: false,
        }
    }

    /// Number of buffered bytes that do not form a complete frame yet.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feeds newly received bytes and returns every frame they complete.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<ProtocolResult<String>> {
        let mut decoded = Vec::new();
        let mut bytes = bytes;

        if self.discarding {
            match bytes.iter().position(|&b| b == DELIMITER) {
                Some(end) => {
                    self.discarding = false;
                    bytes = &bytes[end + 1..];
                }
                None => return decoded,
            }
        }

        self.buffer.extend_from_slice(bytes);

        let consumed = {
            let (frames, remainder) = split_frames(&self.buffer);
            for frame in frames {
                if frame.len() > self.max_frame_size {
                    decoded.push(Err(ProtocolError::FrameTooLarge {
                        max: self.max_frame_size,
                    }));
                } else {
                    decoded.push(String::from_utf8(frame.to_vec()).map_err(ProtocolError::from));
                }
            }
            self.buffer.len() - remainder.len()
        };
        self.buffer.drain(..consumed);

        if self.buffer.len() > self.max_frame_size {
            self.buffer.clear();
            self.discarding = true;
            decoded.push(Err(ProtocolError::FrameTooLarge {
                max: self.max_frame_size,
            }));
        }

        decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Envelope;

    fn frames(results: Vec<ProtocolResult<String>>) -> Vec<String> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn encode_appends_single_delimiter() {
        let frame = encode_frame(&Envelope::error("Unknown request type")).unwrap();

        assert_eq!(frame.last(), Some(&DELIMITER));
        assert_eq!(frame.iter().filter(|&&b| b == DELIMITER).count(), 1);

        let json: serde_json::Value = serde_json::from_slice(&frame[..frame.len() - 1]).unwrap();
        assert_eq!(json["type"], "error");
    }

    #[test]
    fn encode_escapes_delimiter_inside_strings() {
        let envelope = Envelope::info("a^b\\^c");
        let frame = encode_frame(&envelope).unwrap();

        let mut decoder = FrameDecoder::new();
        let decoded = frames(decoder.decode(&frame));
        assert_eq!(decoded.len(), 1);

        let parsed: Envelope = serde_json::from_str(&decoded[0]).unwrap();
        assert_eq!(parsed.message.as_deref(), Some("a^b\\^c"));
    }

    #[test]
    fn split_frames_keeps_incomplete_tail() {
        let (complete, rest) = split_frames(b"{\"a\":1}^{\"b\":2}^{\"c\"");
        assert_eq!(complete, vec![&b"{\"a\":1}"[..], &b"{\"b\":2}"[..]]);
        assert_eq!(rest, b"{\"c\"");
    }

    #[test]
    fn split_frames_without_tail() {
        let (complete, rest) = split_frames(b"{}^");
        assert_eq!(complete, vec![&b"{}"[..]]);
        assert!(rest.is_empty());
    }

    #[test]
    fn empty_frames_are_discarded() {
        let mut decoder = FrameDecoder::new();
        let decoded = frames(decoder.decode(b"^^{\"a\":1}^^^{\"b\":2}^"));
        assert_eq!(decoded, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn multiple_frames_in_one_read() {
        let mut decoder = FrameDecoder::new();
        let decoded = frames(decoder.decode(b"{\"n\":1}^{\"n\":2}^{\"n\":3}^{\"n\""));
        assert_eq!(decoded, vec!["{\"n\":1}", "{\"n\":2}", "{\"n\":3}"]);
        assert_eq!(decoder.pending(), 5);

        let decoded = frames(decoder.decode(b":4}^"));
        assert_eq!(decoded, vec!["{\"n\":4}"]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn decodes_identically_at_every_split_point() {
        let envelopes = vec![
            Envelope::error("Invalid request payload"),
            Envelope::info("stage ^ left"),
            Envelope::info("Bühne ✓"),
            Envelope::error("EntityId is null"),
        ];
        let mut stream = Vec::new();
        for envelope in &envelopes {
            stream.extend(encode_frame(envelope).unwrap());
        }

        for first in 0..=stream.len() {
            for second in first..=stream.len() {
                let mut decoder = FrameDecoder::new();
                let mut decoded = frames(decoder.decode(&stream[..first]));
                decoded.extend(frames(decoder.decode(&stream[first..second])));
                decoded.extend(frames(decoder.decode(&stream[second..])));

                let parsed: Vec<Envelope> = decoded
                    .iter()
                    .map(|f| serde_json::from_str(f).unwrap())
                    .collect();
                assert_eq!(parsed, envelopes, "split at {first}/{second}");
                assert_eq!(decoder.pending(), 0);
            }
        }
    }

    #[test]
    fn byte_at_a_time() {
        let frame = encode_frame(&Envelope::info("one byte per read")).unwrap();
        let mut decoder = FrameDecoder::new();

        let mut decoded = Vec::new();
        for byte in &frame {
            decoded.extend(frames(decoder.decode(std::slice::from_ref(byte))));
        }
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn oversized_frame_is_dropped_and_decoding_resumes() {
        let mut decoder = FrameDecoder::with_max_frame_size(8);

        let results = decoder.decode(b"0123456789");
        assert!(matches!(
            results.as_slice(),
            [Err(ProtocolError::FrameTooLarge { max: 8 })]
        ));
        assert_eq!(decoder.pending(), 0);

        // Rest of the oversized frame is skipped up to its delimiter.
        assert!(decoder.decode(b"abcdef").is_empty());
        let decoded = frames(decoder.decode(b"xyz^{}^"));
        assert_eq!(decoded, vec!["{}"]);
    }

    #[test]
    fn oversized_complete_frame_keeps_neighbours() {
        let mut decoder = FrameDecoder::with_max_frame_size(4);
        let results = decoder.decode(b"{}^0123456789^{}^");

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_deref().ok(), Some("{}"));
        assert!(matches!(results[1], Err(ProtocolError::FrameTooLarge { .. })));
        assert_eq!(results[2].as_deref().ok(), Some("{}"));
    }

    #[test]
    fn invalid_utf8_is_frame_local() {
        let mut decoder = FrameDecoder::new();
        let results = decoder.decode(b"\xff\xfe^{}^");

        assert!(matches!(results[0], Err(ProtocolError::InvalidUtf8(_))));
        assert_eq!(results[1].as_deref().ok(), Some("{}"));
    }

    #[test]
    fn decoders_do_not_share_state() {
        let mut first = FrameDecoder::new();
        let mut second = FrameDecoder::new();

        assert!(first.decode(b"{\"from\":\"first\"").is_empty());
        let decoded = frames(second.decode(b"{\"from\":\"second\"}^"));
        assert_eq!(decoded, vec!["{\"from\":\"second\"}"]);

        let decoded = frames(first.decode(b"}^"));
        assert_eq!(decoded, vec!["{\"from\":\"first\"}"]);
    }
}
