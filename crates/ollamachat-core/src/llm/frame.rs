use serde::Deserialize;

use crate::constants::limits::MAX_FRAME_BYTES;
use crate::error::ProviderError;

/// One decoded unit of a line-delimited JSON response stream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl Frame {
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}

/// Incremental decoder for newline-delimited JSON frames.
///
/// Only the incomplete trailing line is buffered, so memory stays bounded
/// regardless of how long the response is.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every frame completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Frame>, ProviderError> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let line_end = consumed + offset;
            if let Some(frame) = parse_line(&self.buffer[consumed..line_end])? {
                frames.push(frame);
            }
            consumed = line_end + 1;
        }
        self.buffer.drain(..consumed);

        if self.buffer.len() > MAX_FRAME_BYTES {
            return Err(ProviderError::Protocol(format!(
                "frame exceeds {MAX_FRAME_BYTES} bytes without a line break"
            )));
        }
        Ok(frames)
    }

    /// Decode whatever is left once the input has ended.
    pub fn finish(&mut self) -> Result<Option<Frame>, ProviderError> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Result<Option<Frame>, ProviderError> {
    let line = trim_ascii(line);
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(line)
        .map(Some)
        .map_err(|e| ProviderError::Protocol(format!("failed to decode frame: {e}")))
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if first.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = bytes {
        if last.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(br#"{"response":"Hi","do"#).unwrap().is_empty());

        let frames = decoder
            .push(b"ne\":false}\n{\"response\":\" there\",\"done\":false}\n{\"resp")
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].response, "Hi");
        assert_eq!(frames[1].response, " there");

        let frames = decoder.push(b"onse\":\"\",\"done\":true}\n").unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].done);
        assert!(decoder.finish().unwrap().is_none());
    }

    #[test]
    fn test_blank_lines_and_crlf_skipped() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder
            .push(b"\r\n{\"response\":\"a\"}\r\n\n{\"done\":true}\r\n")
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].response, "a");
        assert!(!frames[0].done);
        assert!(frames[1].done);
    }

    #[test]
    fn test_unterminated_tail_decoded_on_finish() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(br#"{"response":"x","done":true}"#).unwrap().is_empty());
        let frame = decoder.finish().unwrap().unwrap();
        assert!(frame.done);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder
            .push(b"{\"model\":\"m\",\"created_at\":\"t\",\"response\":\"ok\",\"done\":false,\"context\":[1,2]}\n")
            .unwrap();
        assert_eq!(frames[0].response, "ok");
    }

    #[test]
    fn test_error_field() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder
            .push(b"{\"error\":\"model not found\"}\n{\"error\":\"\"}\n")
            .unwrap();
        assert_eq!(frames[0].error_message(), Some("model not found"));
        assert_eq!(frames[1].error_message(), None);
    }

    #[test]
    fn test_malformed_frame_is_protocol_error() {
        let mut decoder = FrameDecoder::new();
        let err = decoder.push(b"not json\n").unwrap_err();
        assert!(matches!(err, ProviderError::Protocol(_)));
    }

    #[test]
    fn test_oversize_frame_rejected() {
        let mut decoder = FrameDecoder::new();
        let big = vec![b'a'; MAX_FRAME_BYTES + 1];
        assert!(matches!(
            decoder.push(&big),
            Err(ProviderError::Protocol(_))
        ));
    }
}
