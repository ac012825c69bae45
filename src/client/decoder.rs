//! Chunk-safe stream decoder.
//!
//! Bytes arrive split at arbitrary offsets, including inside a multi-byte
//! character or a JSON line. The decoder keeps an incomplete UTF-8 tail and
//! an incomplete line between calls, so the folded result does not depend on
//! how the stream was chunked.

use super::fold::{FoldEffect, FoldState};
use crate::core::{Message, WireFrame};
use crate::error::DecodeError;

/// Reconstructs one assistant message from a frame stream.
#[derive(Debug)]
pub struct StreamDecoder {
    state: FoldState,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a newline.
    buffer: String,
    /// Set once an `error` frame has been folded.
    failure: Option<String>,
}

impl StreamDecoder {
    /// Creates a decoder for the assistant message `message_id`.
    #[must_use]
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            state: FoldState::new(message_id),
            pending: Vec::new(),
            buffer: String::new(),
            failure: None,
        }
    }

    /// Id of the message being reconstructed.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.state.message.id
    }

    /// The message as folded so far.
    #[must_use]
    pub const fn snapshot(&self) -> &Message {
        &self.state.message
    }

    /// Current status indicator text.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.state.status.as_deref()
    }

    /// Feeds one chunk and folds every frame it completes.
    ///
    /// Unparseable frames are logged and skipped. An `error` frame ends the
    /// batch: it comes back as a final [`FoldEffect::Failed`] after the
    /// effects of the frames before it, and nothing after it is folded.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Remote`] when called again after an `error`
    /// frame was folded.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<FoldEffect>, DecodeError> {
        self.ensure_live()?;
        self.decode_utf8(chunk);

        let mut effects = Vec::new();
        while let Some(end) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=end).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(effect) = self.process_line(line) {
                let failed = matches!(effect, FoldEffect::Failed(_));
                effects.push(effect);
                if failed {
                    break;
                }
            }
        }
        Ok(effects)
    }

    /// Text of the folded `error` frame, if one arrived.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Fails with the folded `error` frame, if one arrived.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Remote`] carrying the error frame's text.
    pub fn ensure_live(&self) -> Result<(), DecodeError> {
        match &self.failure {
            Some(message) => Err(DecodeError::Remote {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Ends the stream: flushes the buffers and parses any residual line.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Remote`] if the stream carried an `error`
    /// frame, including one in the residual line.
    pub fn finish(mut self) -> Result<Message, DecodeError> {
        self.ensure_live()?;
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.buffer.push_str(&tail);
            self.pending.clear();
        }

        let residual = std::mem::take(&mut self.buffer);
        let residual = residual.trim();
        if !residual.is_empty() {
            self.process_line(residual);
            self.ensure_live()?;
        }
        Ok(self.state.message)
    }

    /// Appends `chunk` to the text buffer, holding back an incomplete tail.
    ///
    /// Invalid sequences become U+FFFD.
    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        let mut consumed = 0;
        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.buffer
                        .push_str(std::str::from_utf8(&rest[..valid]).unwrap_or_default());
                    consumed += valid;
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed += len;
                        }
                        None => break,
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }

    fn process_line(&mut self, line: &str) -> Option<FoldEffect> {
        let frame = match WireFrame::parse_line(line)? {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, len = line.len(), "skipping unparseable frame");
                return None;
            }
        };

        let (state, effect) = std::mem::take(&mut self.state).fold(&frame);
        self.state = state;

        if let FoldEffect::Failed(message) = &effect {
            self.failure = Some(message.clone());
        }
        Some(effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProgressEvent;

    fn frame(event: &ProgressEvent) -> String {
        WireFrame::from_event("m", event)
            .encode()
            .unwrap_or_default()
    }

    fn delta(text: &str) -> ProgressEvent {
        ProgressEvent::Response {
            text_delta: text.to_string(),
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn test_frame_split_inside_json() {
        let wire = frame(&delta("Hello"));
        let (a, b) = wire.split_at(wire.len() / 2);

        let mut decoder = StreamDecoder::new("m");
        assert!(decoder.feed(a.as_bytes()).unwrap_or_default().is_empty());
        let effects = decoder.feed(b.as_bytes()).unwrap_or_default();
        assert_eq!(effects, vec![FoldEffect::Delta("Hello".to_string())]);
    }

    #[test]
    fn test_multibyte_split() {
        let wire = frame(&delta("zażółć 👍"));
        let bytes = wire.as_bytes();
        let emoji = wire.find('👍').unwrap_or_default();

        let mut decoder = StreamDecoder::new("m");
        let _ = decoder.feed(&bytes[..emoji + 2]);
        let _ = decoder.feed(&bytes[emoji + 2..]);
        let message = decoder.finish().unwrap_or_else(|_| unreachable!());
        assert_eq!(message.content, "zażółć 👍");
    }

    #[test]
    fn test_garbage_lines_are_skipped() {
        let wire = format!(
            ": keep-alive\n\ndata: {{not json\n\nevent: ping\n{}",
            frame(&delta("ok"))
        );
        let mut decoder = StreamDecoder::new("m");
        let effects = decoder.feed(wire.as_bytes()).unwrap_or_default();
        assert_eq!(effects.len(), 1);
        assert_eq!(decoder.snapshot().content, "ok");
    }

    #[test]
    fn test_crlf_lines() {
        let wire = frame(&delta("a")).replace('\n', "\r\n");
        let mut decoder = StreamDecoder::new("m");
        let _ = decoder.feed(wire.as_bytes());
        assert_eq!(decoder.snapshot().content, "a");
    }

    #[test]
    fn test_residual_line_parsed_on_finish() {
        let wire = frame(&delta("tail"));
        let unterminated = wire.trim_end();

        let mut decoder = StreamDecoder::new("m");
        assert!(decoder.feed(unterminated.as_bytes()).unwrap_or_default().is_empty());
        let message = decoder.finish().unwrap_or_else(|_| unreachable!());
        assert_eq!(message.content, "tail");
    }

    #[test]
    fn test_content_is_not_trimmed() {
        let wire = format!("{}{}", frame(&delta("  spaced ")), frame(&delta("\n")));
        let mut decoder = StreamDecoder::new("m");
        let _ = decoder.feed(wire.as_bytes());
        let message = decoder.finish().unwrap_or_else(|_| unreachable!());
        assert_eq!(message.content, "  spaced \n");
    }

    #[test]
    fn test_error_frame_terminates() {
        let wire = format!(
            "{}{}{}",
            frame(&delta("partial")),
            frame(&ProgressEvent::error("boom")),
            frame(&delta("never"))
        );
        let mut decoder = StreamDecoder::new("m");
        let effects = decoder.feed(wire.as_bytes()).unwrap_or_default();
        assert_eq!(
            effects,
            vec![
                FoldEffect::Delta("partial".to_string()),
                FoldEffect::Failed("boom".to_string()),
            ]
        );
        assert_eq!(decoder.failure(), Some("boom"));
        assert_eq!(decoder.snapshot().content, "partial");
        assert!(matches!(
            decoder.feed(b""),
            Err(DecodeError::Remote { message }) if message == "boom"
        ));
        assert!(decoder.finish().is_err());
    }

    #[test]
    fn test_delta_sharing_chunk_with_error_is_reported() {
        let wire = format!("{}{}", frame(&delta("tail")), frame(&ProgressEvent::error("boom")));
        let mut decoder = StreamDecoder::new("m");
        let effects = decoder.feed(wire.as_bytes()).unwrap_or_default();
        assert_eq!(effects.first(), Some(&FoldEffect::Delta("tail".to_string())));
        assert!(matches!(effects.last(), Some(FoldEffect::Failed(_))));
        assert!(decoder.ensure_live().is_err());
    }

    #[test]
    fn test_error_in_residual_line_fails_finish() {
        let wire = frame(&ProgressEvent::error("late"));
        let mut decoder = StreamDecoder::new("m");
        assert!(decoder.feed(wire.trim_end().as_bytes()).unwrap_or_default().is_empty());
        assert!(matches!(
            decoder.finish(),
            Err(DecodeError::Remote { message }) if message == "late"
        ));
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let mut decoder = StreamDecoder::new("m");
        let _ = decoder.feed(b"\xE2");
        let _ = decoder.feed(b"\x28\n");
        assert!(decoder.finish().is_ok());
    }
}
