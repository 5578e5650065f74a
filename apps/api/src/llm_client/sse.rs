//! Incremental Server-Sent Events decoder for the streaming response body.
//!
//! Only `data:` fields matter to us; `event:`, `id:` and `retry:` are ignored.
//! Lines may end in `\r\n`, `\n` or a bare `\r`.

use bytes::BytesMut;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data_lines: Vec<String>,
}

impl SseDecoder {
    /// Feeds one network chunk, returning the payloads of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some((end, next)) = self.next_line_break() {
            let line = self.buffer.split_to(next);
            let line = String::from_utf8_lossy(&line[..end]);
            if let Some(payload) = self.process_line(&line) {
                events.push(payload);
            }
        }
        events
    }

    /// Locates the first complete line as (end of its text, start of the next line).
    /// A trailing `\r` waits for the next chunk in case a `\n` follows it.
    fn next_line_break(&self) -> Option<(usize, usize)> {
        let pos = self.buffer.iter().position(|&b| b == b'\n' || b == b'\r')?;
        if self.buffer[pos] == b'\n' {
            return Some((pos, pos + 1));
        }
        match self.buffer.get(pos + 1) {
            Some(b'\n') => Some((pos, pos + 2)),
            Some(_) => Some((pos, pos + 1)),
            None => None,
        }
    }

    /// Flushes a trailing event the server did not terminate with a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let rest = String::from_utf8_lossy(&rest);
            let line = rest.trim_end_matches('\r');
            if let Some(payload) = self.process_line(line) {
                return Some(payload);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data_lines.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        let payload = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::default();
        assert_eq!(decoder.push(b"data: {\"a\":1}\n\n"), vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = SseDecoder::default();
        assert_eq!(
            decoder.push(b"data: one\r\n\r\ndata: two\r\n\r\n"),
            vec!["one", "two"]
        );
    }

    #[test]
    fn test_bare_cr_line_endings() {
        let mut decoder = SseDecoder::default();
        assert_eq!(decoder.push(b"data: one\r\rdata: two\r"), vec!["one"]);
        // the final \r is held until the next byte shows it is not half of \r\n
        assert!(decoder.push(b"\r").is_empty());
        assert_eq!(decoder.push(b"data: three\r\r"), vec!["two"]);
    }

    #[test]
    fn test_crlf_split_between_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: a\r").is_empty());
        assert!(decoder.push(b"\n\r").is_empty());
        assert_eq!(decoder.push(b"\ndata: b\n\n"), vec!["a", "b"]);
    }

    #[test]
    fn test_trailing_cr_is_flushed_on_finish() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: last\r").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("last"));
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"da").is_empty());
        assert!(decoder.push(b"ta: hel").is_empty());
        assert!(decoder.push(b"lo\n").is_empty());
        assert_eq!(decoder.push(b"\n"), vec!["hello"]);
    }

    #[test]
    fn test_multi_byte_char_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let bytes = "data: résumé\n\n".as_bytes();
        let (head, tail) = bytes.split_at(8);
        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec!["résumé"]);
    }

    #[test]
    fn test_multi_line_data_is_joined() {
        let mut decoder = SseDecoder::default();
        assert_eq!(decoder.push(b"data: a\ndata: b\n\n"), vec!["a\nb"]);
    }

    #[test]
    fn test_comments_and_other_fields_ignored() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keep-alive\nevent: message\nid: 7\ndata: x\n\n");
        assert_eq!(events, vec!["x"]);
    }

    #[test]
    fn test_blank_lines_without_data_dispatch_nothing() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"\n\n\n").is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("tail"));
        assert!(decoder.finish().is_none());
    }
}
