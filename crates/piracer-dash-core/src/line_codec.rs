//! Newline framing for text streams
//!
//! Both the Arduino serial link and the telemetry bridge speak
//! newline-terminated text. [`LossyLinesCodec`] buffers partial input across
//! reads, splits strictly on `\n`, trims each line, skips blank lines, and
//! never fails on invalid UTF-8 (the Arduino prints garbage while it resets).
//!
//! Readers wrap it in [`tokio_util::codec::FramedRead`]; awaiting the next
//! frame is cancel-safe, so it can sit in a `select!` branch.

use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::Decoder;
use tracing::warn;

/// Lines longer than this are discarded
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Line decoder that tolerates invalid UTF-8 and runaway lines
#[derive(Debug, Clone)]
pub struct LossyLinesCodec {
    max_length: usize,
    /// Bytes already scanned for `\n` in the pending buffer
    next_index: usize,
    /// Dropping input until the next newline
    discarding: bool,
}

impl Default for LossyLinesCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl LossyLinesCodec {
    /// Codec that discards lines longer than `max_length` bytes
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }
}

impl Decoder for LossyLinesCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let newline = buf[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            let Some(pos) = newline else {
                if buf.len() > self.max_length {
                    if !self.discarding {
                        warn!(
                            limit = self.max_length,
                            "Line exceeds maximum length; discarding"
                        );
                    }
                    buf.clear();
                    self.discarding = true;
                }
                self.next_index = buf.len();
                return Ok(None);
            };

            let line = buf.split_to(pos + 1);
            self.next_index = 0;

            if self.discarding {
                self.discarding = false;
                continue;
            }

            let text = String::from_utf8_lossy(&line[..pos]);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(trimmed.to_string()));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        // An unterminated tail is not a complete line
        match self.decode(buf)? {
            Some(line) => Ok(Some(line)),
            None => {
                buf.advance(buf.len());
                self.next_index = 0;
                self.discarding = false;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio::io::AsyncReadExt;
    use tokio_util::codec::FramedRead;

    fn drain(codec: &mut LossyLinesCodec, buf: &mut BytesMut) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(line) = codec.decode(buf).unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn test_partial_line_is_buffered() {
        let mut codec = LossyLinesCodec::default();
        let mut buf = BytesMut::from("Speed: 1");
        assert!(drain(&mut codec, &mut buf).is_empty());

        buf.extend_from_slice(b"2.50 pulse/s\r\nnext");
        assert_eq!(drain(&mut codec, &mut buf), vec!["Speed: 12.50 pulse/s"]);
        assert_eq!(&buf[..], b"next");
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut codec = LossyLinesCodec::default();
        let mut buf = BytesMut::from("\n   \r\na\n\nb\n");
        assert_eq!(drain(&mut codec, &mut buf), vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut codec = LossyLinesCodec::default();
        let mut buf = BytesMut::from(&b"\xff\xfeok\n"[..]);
        let lines = drain(&mut codec, &mut buf);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("ok"));
    }

    #[test]
    fn test_overlong_line_discarded() {
        let mut codec = LossyLinesCodec::new(8);
        let mut buf = BytesMut::from("0123456789abcdef");
        assert!(drain(&mut codec, &mut buf).is_empty());
        buf.extend_from_slice(b"tail\nkeep\n");
        assert_eq!(drain(&mut codec, &mut buf), vec!["keep"]);
    }

    #[test]
    fn test_eof_drops_unterminated_tail() {
        let mut codec = LossyLinesCodec::default();
        let mut buf = BytesMut::from("done\npartial");
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some("done".to_string()));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_framed_read_across_chunks() {
        let head: &[u8] = b"Speed: 1.5 pulse/s\nSpe";
        let tail: &[u8] = b"ed: 2.0 pulse/s\npartial";
        let input = AsyncReadExt::chain(head, tail);
        let mut lines = FramedRead::new(input, LossyLinesCodec::default());
        assert_eq!(lines.next().await.unwrap().unwrap(), "Speed: 1.5 pulse/s");
        assert_eq!(lines.next().await.unwrap().unwrap(), "Speed: 2.0 pulse/s");
        assert!(lines.next().await.is_none());
    }
}
