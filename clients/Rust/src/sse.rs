//! Event-stream frame parsing.
//!
//! A frame is an `event: <name>` line followed by a `data: <json>` line and
//! terminated by a blank line. The parser is fed raw body chunks as they
//! arrive; bytes are buffered until a full line is available so multi-byte
//! characters split across chunks survive decoding.

use serde_json::Value;

/// One decoded frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Log(Value),
    Metric(Value),
    Status(Value),
    Result(Value),
    /// An event name this client does not interpret
    Other { event: String, data: Value },
}

impl Frame {
    fn new(event: &str, data: Value) -> Self {
        match event {
            "log" => Frame::Log(data),
            "metric" => Frame::Metric(data),
            "status" => Frame::Status(data),
            "result" => Frame::Result(data),
            other => Frame::Other {
                event: other.to_string(),
                data,
            },
        }
    }
}

/// Line-buffering state machine over an event-stream body
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    current_event: Option<String>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a body chunk, returning every frame completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            if let Some(frame) = self.process_line(line.trim_end_matches('\r')) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing line that was not terminated by a newline
    pub fn finish(&mut self) -> Vec<Frame> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest).into_owned();
        self.process_line(line.trim_end_matches('\r'))
            .into_iter()
            .collect()
    }

    fn process_line(&mut self, line: &str) -> Option<Frame> {
        if line.trim().is_empty() {
            self.current_event = None;
            return None;
        }

        if let Some(name) = line.strip_prefix("event:") {
            self.current_event = Some(name.trim().to_string());
            return None;
        }

        let data = line.strip_prefix("data:")?.trim();
        // data before any event line has no type to dispatch on
        let event = self.current_event.as_deref()?;
        match serde_json::from_str::<Value>(data) {
            Ok(value) => Some(Frame::new(event, value)),
            Err(e) => {
                log::warn!("[remip] skipping malformed {event} frame {data:?}: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_typed_frames() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(
            b"event: log\ndata: {\"message\": \"hello\"}\n\nevent: metric\ndata: {\"gap\": 0.5}\n\n",
        );
        assert_eq!(
            frames,
            vec![
                Frame::Log(json!({"message": "hello"})),
                Frame::Metric(json!({"gap": 0.5})),
            ]
        );
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(b"event: res").is_empty());
        assert!(parser.feed(b"ult\ndata: {\"objective_").is_empty());
        let frames = parser.feed(b"value\": 10}\n\n");
        assert_eq!(frames, vec![Frame::Result(json!({"objective_value": 10}))]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let mut parser = FrameParser::new();
        let payload = "event: log\ndata: {\"message\": \"é\"}\n".as_bytes();
        let split = payload.iter().position(|&b| b == 0xC3).unwrap() + 1;
        assert!(parser.feed(&payload[..split]).is_empty());
        let frames = parser.feed(&payload[split..]);
        assert_eq!(frames, vec![Frame::Log(json!({"message": "é"}))]);
    }

    #[test]
    fn test_data_without_event_is_ignored() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(b"data: {\"x\": 1}\n\n").is_empty());
    }

    #[test]
    fn test_blank_line_resets_event() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(b"event: log\n\ndata: {\"x\": 1}\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn test_malformed_json_is_skipped() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(
            b"event: log\ndata: {not json}\n\nevent: log\ndata: {\"ok\": true}\n\n",
        );
        assert_eq!(frames, vec![Frame::Log(json!({"ok": true}))]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(b"event: status\r\ndata: {\"status\": \"running\"}\r\n\r\n");
        assert_eq!(frames, vec![Frame::Status(json!({"status": "running"}))]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(b"event: result\ndata: {\"status\": \"optimal\"}").is_empty());
        assert_eq!(
            parser.finish(),
            vec![Frame::Result(json!({"status": "optimal"}))]
        );
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn test_unknown_event_is_preserved() {
        let mut parser = FrameParser::new();
        let frames = parser.feed(b"event: progress\ndata: 3\n");
        assert_eq!(
            frames,
            vec![Frame::Other {
                event: "progress".to_string(),
                data: json!(3)
            }]
        );
    }
}
