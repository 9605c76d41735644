//! Incremental `text/event-stream` decoder
//!
//! Upstream LLM APIs and the sidecar both speak SSE. Network reads arrive in
//! arbitrary chunks, so the decoder keeps raw bytes until a full line exists
//! and only then decodes it. A chunk boundary may split a line, a CRLF pair,
//! or a multi-byte UTF-8 sequence.

use serde::{Deserialize, Serialize};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Payload sentinel OpenAI-style streams send as the last frame
pub const DONE_SENTINEL: &str = "[DONE]";

/// One dispatched server-sent event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseFrame {
    /// `event:` field, if the server named the event
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
    /// `id:` field seen within this event
    pub id: Option<String>,
    /// `retry:` reconnection hint in milliseconds
    pub retry: Option<u64>,
}

impl SseFrame {
    /// True for the `data: [DONE]` terminator
    pub fn is_done(&self) -> bool {
        self.data == DONE_SENTINEL
    }

    /// Event name, defaulting to `message` like browsers do
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Stateful SSE decoder; feed it chunks as they arrive
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    bom_checked: bool,
    /// Previous chunk ended on CR; a leading LF belongs to that terminator
    skip_lf: bool,
    event: Option<String>,
    data: String,
    has_data: bool,
    id: Option<String>,
    retry: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk, returning every frame it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        self.buf.extend_from_slice(chunk);

        if !self.bom_checked {
            if self.buf.len() < BOM.len() && BOM.starts_with(&self.buf) {
                // Could still be a split BOM
                return frames;
            }
            if self.buf.starts_with(BOM) {
                self.buf.drain(..BOM.len());
            }
            self.bom_checked = true;
        }

        let mut start = 0;
        let mut i = 0;
        while i < self.buf.len() {
            let b = self.buf[i];
            if self.skip_lf {
                self.skip_lf = false;
                if b == b'\n' {
                    start = i + 1;
                    i += 1;
                    continue;
                }
            }
            if b == b'\n' || b == b'\r' {
                let line = String::from_utf8_lossy(&self.buf[start..i]).into_owned();
                self.process_line(&line, &mut frames);
                self.skip_lf = b == b'\r';
                start = i + 1;
            }
            i += 1;
        }
        self.buf.drain(..start);

        frames
    }

    /// Flush at end of stream
    ///
    /// An unterminated trailing line is processed, and a pending event with
    /// data is dispatched even without the closing blank line.
    pub fn finish(mut self) -> Option<SseFrame> {
        if !self.buf.is_empty() {
            let line = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();
            let mut frames = Vec::new();
            self.process_line(&line, &mut frames);
            if let Some(frame) = frames.pop() {
                return Some(frame);
            }
        }
        if self.has_data {
            self.dispatch()
        } else {
            None
        }
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            if let Some(frame) = self.dispatch() {
                frames.push(frame);
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.find(':') {
            Some(pos) => {
                let raw = &line[pos + 1..];
                (&line[..pos], raw.strip_prefix(' ').unwrap_or(raw))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(ms);
                    }
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let has_content = self.has_data || self.event.is_some();
        let frame = SseFrame {
            event: self.event.take(),
            data: std::mem::take(&mut self.data),
            id: self.id.take(),
            retry: self.retry.take(),
        };
        self.has_data = false;

        has_content.then_some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<SseFrame> {
        let mut decoder = SseDecoder::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            frames.extend(decoder.feed(chunk));
        }
        frames.extend(decoder.finish());
        frames
    }

    #[test]
    fn test_single_event() {
        let frames = decode_all(&[b"data: hello\n\n"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "hello");
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].event_name(), "message");
    }

    #[test]
    fn test_named_event_and_multiline_data() {
        let frames = decode_all(&[b"event: content_block_delta\ndata: line one\ndata: line two\n\n"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("content_block_delta"));
        assert_eq!(frames[0].data, "line one\nline two");
    }

    #[test]
    fn test_every_split_point_yields_same_frames() {
        let stream = "event: a\r\ndata: {\"t\":\"h\u{e9}llo \u{1F600}\"}\r\n\r\n: ping\n\ndata: second\rdata: more\r\r";
        let whole = decode_all(&[stream.as_bytes()]);
        assert_eq!(whole.len(), 2);
        assert_eq!(whole[0].data, "{\"t\":\"h\u{e9}llo \u{1F600}\"}");
        assert_eq!(whole[1].data, "second\nmore");

        let bytes = stream.as_bytes();
        for split in 1..bytes.len() {
            let parts = decode_all(&[&bytes[..split], &bytes[split..]]);
            assert_eq!(parts, whole, "split at byte {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let stream = b"data: a\n\ndata: b\n\n";
        let chunks: Vec<&[u8]> = stream.chunks(1).collect();
        let frames = decode_all(&chunks);
        let data: Vec<&str> = frames.iter().map(|f| f.data.as_str()).collect();
        assert_eq!(data, vec!["a", "b"]);
    }

    #[test]
    fn test_comments_are_ignored() {
        let frames = decode_all(&[b": heartbeat\n\n: another\ndata: x\n\n"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn test_only_one_leading_space_is_stripped() {
        let frames = decode_all(&[b"data:no-space\n\ndata:  two-spaces\n\n"]);
        assert_eq!(frames[0].data, "no-space");
        assert_eq!(frames[1].data, " two-spaces");
    }

    #[test]
    fn test_field_without_colon() {
        let frames = decode_all(&[b"data\n\n"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "");
    }

    #[test]
    fn test_id_and_retry() {
        let frames = decode_all(&[b"id: 42\nretry: 3000\ndata: x\n\nretry: soon\nid: a\0b\ndata: y\n\n"]);
        assert_eq!(frames[0].id.as_deref(), Some("42"));
        assert_eq!(frames[0].retry, Some(3000));
        assert_eq!(frames[1].id, None);
        assert_eq!(frames[1].retry, None);
    }

    #[test]
    fn test_blank_lines_without_fields_dispatch_nothing() {
        let frames = decode_all(&[b"\n\n\n\nretry: 10\n\n"]);
        assert!(frames.is_empty());
    }

    #[test]
    fn test_bom_is_stripped_even_when_split() {
        let frames = decode_all(&[b"\xEF", b"\xBB\xBFdata: x\n\n"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "x");
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: tail").is_empty());
        let frame = decoder.finish().expect("pending frame");
        assert_eq!(frame.data, "tail");
    }

    #[test]
    fn test_finish_without_data_returns_none() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b"event: orphan\n");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_done_sentinel() {
        let frames = decode_all(&[b"data: [DONE]\n\n"]);
        assert!(frames[0].is_done());
    }
}
