//! Event framing for upstream byte streams
//!
//! Upstream bytes arrive in chunks whose boundaries have nothing to do with
//! record boundaries: a JSON line, or even a multi-byte UTF-8 character, may
//! be split across two chunks. [`Framer`] buffers the unterminated tail of
//! each chunk and only emits complete records.
//!
//! Lines are split on the `\n` byte before decoding. `\n` never occurs inside
//! a multi-byte UTF-8 sequence, so a character split across chunks is always
//! reassembled before it is decoded.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Prefix of a Server-Sent-Events data line
pub const SSE_DATA_PREFIX: &str = "data: ";

/// How records are delimited in the upstream stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// One record per line (NDJSON, or plain progress text)
    Lines,
    /// Only `data: ` lines are records, with the prefix removed.
    /// Any other line is dropped.
    ServerSentEvents,
}

/// Stateful splitter turning byte chunks into text records
#[derive(Debug)]
pub struct Framer {
    mode: FrameMode,
    pending: Vec<u8>,
}

impl Framer {
    pub fn new(mode: FrameMode) -> Self {
        Self {
            mode,
            pending: Vec::new(),
        }
    }

    pub fn lines() -> Self {
        Self::new(FrameMode::Lines)
    }

    pub fn server_sent_events() -> Self {
        Self::new(FrameMode::ServerSentEvents)
    }

    pub fn mode(&self) -> FrameMode {
        self.mode
    }

    /// Bytes held back waiting for a line terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed one chunk and return every record it completes, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split(|b| *b == b'\n')
            .filter_map(|line| self.accept(line))
            .collect()
    }

    /// Flush the unterminated tail once the upstream has closed
    pub fn finish(&mut self) -> Vec<String> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let tail = std::mem::take(&mut self.pending);
        self.accept(&tail).into_iter().collect()
    }

    fn accept(&self, raw: &[u8]) -> Option<String> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);
        if line.trim().is_empty() {
            return None;
        }

        match self.mode {
            FrameMode::Lines => Some(line.into_owned()),
            FrameMode::ServerSentEvents => line
                .strip_prefix(SSE_DATA_PREFIX)
                .map(|payload| payload.to_string()),
        }
    }
}

/// Frame a stream of byte chunks into a stream of records
///
/// An upstream error is forwarded once and ends the stream. When the upstream
/// ends normally, any unterminated trailing record is emitted.
pub fn frame_stream<S, B, E>(
    upstream: S,
    mode: FrameMode,
) -> Pin<Box<dyn Stream<Item = Result<String, E>> + Send>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
{
    let records = async_stream::stream! {
        let mut framer = Framer::new(mode);
        futures::pin_mut!(upstream);

        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) => {
                    for record in framer.push(bytes.as_ref()) {
                        yield Ok(record);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        for record in framer.finish() {
            yield Ok(record);
        }
    };
    Box::pin(records)
}

/// Decode one JSON record, logging and discarding it when malformed
pub fn decode_json<T: DeserializeOwned>(record: &str) -> Option<T> {
    match serde_json::from_str::<T>(record) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, record = %truncate(record, 200), "Skipping malformed JSON record");
            None
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn frame_all(mode: FrameMode, chunks: &[&[u8]]) -> Vec<String> {
        let mut framer = Framer::new(mode);
        let mut records = Vec::new();
        for chunk in chunks {
            records.extend(framer.push(chunk));
        }
        records.extend(framer.finish());
        records
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let records = frame_all(
            FrameMode::Lines,
            &[b"{\"a\":", b"1}\n{\"b\"", b":2}\n"],
        );
        assert_eq!(records, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn test_partial_line_is_held_back() {
        let mut framer = Framer::lines();
        assert!(framer.push(b"pulling man").is_empty());
        assert_eq!(framer.pending_len(), 11);
        assert_eq!(framer.push(b"ifest\n"), vec!["pulling manifest"]);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn test_multibyte_character_split() {
        let text = "héllo wörld\n".as_bytes();
        // 'é' is two bytes starting at offset 1
        let records = frame_all(FrameMode::Lines, &[&text[..2], &text[2..]]);
        assert_eq!(records, vec!["héllo wörld"]);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let records = frame_all(FrameMode::Lines, &[b"one\r\n\r\n\ntwo\r\n   \n"]);
        assert_eq!(records, vec!["one", "two"]);
    }

    #[test]
    fn test_finish_flushes_tail() {
        let records = frame_all(FrameMode::Lines, &[b"first\nsecond"]);
        assert_eq!(records, vec!["first", "second"]);
    }

    #[test]
    fn test_sse_mode_filters_prefix() {
        let records = frame_all(
            FrameMode::ServerSentEvents,
            &[b"event: ping\ndata: {\"type\":\"progress\"}\n\n: comment\nda", b"ta: {}\n\n"],
        );
        assert_eq!(records, vec!["{\"type\":\"progress\"}", "{}"]);
    }

    #[test]
    fn test_decode_json_skips_malformed() {
        assert!(decode_json::<Value>("{not json").is_none());
        let value: Value = decode_json("{\"ok\":true}").unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_split_invariance_every_offset() {
        let input = "{\"message\":{\"content\":\"Grüße\"}}\n\
                     {\"message\":{\"content\":\"日本\"}}\r\n\
                     \n\
                     tail without newline"
            .as_bytes();
        let expected = frame_all(FrameMode::Lines, &[input]);
        assert_eq!(expected.len(), 3);

        for offset in 0..=input.len() {
            let (a, b) = input.split_at(offset);
            assert_eq!(frame_all(FrameMode::Lines, &[a, b]), expected, "split at {}", offset);
        }
    }

    #[tokio::test]
    async fn test_frame_stream_forwards_error_and_stops() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"a\nb".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"\nc\n".to_vec()),
        ];
        let records: Vec<Result<String, String>> =
            frame_stream(futures::stream::iter(chunks), FrameMode::Lines)
                .collect()
                .await;

        assert_eq!(
            records,
            vec![Ok("a".to_string()), Err("connection reset".to_string())]
        );
    }

    #[tokio::test]
    async fn test_frame_stream_flushes_on_close() {
        let chunks: Vec<Result<&'static [u8], String>> = vec![Ok(b"x\ny"), Ok(b"z")];
        let records: Vec<Result<String, String>> =
            frame_stream(futures::stream::iter(chunks), FrameMode::Lines)
                .collect()
                .await;

        assert_eq!(records, vec![Ok("x".to_string()), Ok("yz".to_string())]);
    }
}
