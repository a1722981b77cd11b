//! Incremental framing for streamed event responses.
//!
//! The watch endpoint delivers its final result over a long-lived response
//! body: text frames separated by a blank line (`\n\n`), where a frame
//! starting with `data: ` carries JSON payload. Network chunks split frames
//! at arbitrary byte positions, so [`FrameDecoder`] buffers across pushes
//! and only ever treats `\n\n`-terminated text as a frame. The trailing
//! fragment after the last delimiter stays in the buffer until a later
//! chunk completes it; releasing it early would silently truncate the final
//! frame under unlucky chunk boundaries.
//!
//! The stream may repeat a logical event or interleave keep-alive frames.
//! Only the last data frame matters; the decoder keeps a single slot and
//! overwrites it, never a list.

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Prefix marking a frame as a data frame. Text after it is the payload.
pub const DATA_PREFIX: &str = "data: ";

/// Frame delimiter: a blank line between frames.
const FRAME_DELIMITER: &str = "\n\n";

/// The `status` value a well-formed final frame must carry.
const SUCCESS_SENTINEL: &str = "success";

#[derive(Debug, Error)]
pub enum StreamError {
    /// The stream request itself failed; a protocol violation, not retried.
    #[error("stream request failed with status code {0}")]
    HttpStatus(u16),

    #[error("stream body unreadable: {0}")]
    Body(String),

    /// The stream closed without ever delivering a data frame.
    #[error("stream ended without a data frame")]
    EmptyResult,

    #[error("malformed stream payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The final frame parsed, but its status was not the success sentinel.
    /// Carries the full parsed record for diagnostics.
    #[error("stream did not end in success: {payload}")]
    Unsuccessful { payload: serde_json::Value },
}

/// Reassembles frames from an unbounded sequence of partial text chunks
/// and remembers the last data frame seen.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    last_data: Option<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded chunk. Drains every complete frame from the buffer;
    /// the fragment after the final delimiter is held back as possibly
    /// incomplete.
    pub fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);

        while let Some(end) = self.buffer.find(FRAME_DELIMITER) {
            let frame: String = self.buffer.drain(..end + FRAME_DELIMITER.len()).collect();
            let frame = &frame[..end];
            debug!(frame, "stream frame");
            if frame.starts_with(DATA_PREFIX) {
                self.last_data = Some(frame.to_string());
            }
        }
    }

    /// Whether a data frame has been observed so far.
    pub fn saw_data(&self) -> bool {
        self.last_data.is_some()
    }

    /// Consume the decoder after the stream closed and extract the final
    /// result. An unterminated trailing fragment is discarded, not parsed.
    pub fn finish<T: DeserializeOwned>(self) -> Result<T, StreamError> {
        let frame = self.last_data.ok_or(StreamError::EmptyResult)?;
        let payload = frame[DATA_PREFIX.len()..].trim();

        let record: serde_json::Value = serde_json::from_str(payload)?;
        let status = record.get("status").and_then(|s| s.as_str());
        if status != Some(SUCCESS_SENTINEL) {
            return Err(StreamError::Unsuccessful { payload: record });
        }

        let result = record
            .get("result")
            .cloned()
            .ok_or_else(|| StreamError::Unsuccessful {
                payload: record.clone(),
            })?;
        Ok(serde_json::from_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn decode_chunks<T: DeserializeOwned>(chunks: &[&str]) -> Result<T, StreamError> {
        let mut decoder = FrameDecoder::new();
        for chunk in chunks {
            decoder.push(chunk);
        }
        decoder.finish()
    }

    #[test]
    fn single_frame_in_one_chunk() {
        let result: Value =
            decode_chunks(&["data: {\"status\":\"success\",\"result\":{\"a\":1}}\n\n"]).unwrap();
        assert_eq!(result, json!({"a": 1}));
    }

    #[test]
    fn frame_reassembles_regardless_of_chunk_split_point() {
        let stream = "data: {\"status\":\"success\",\"result\":{\"a\":1}}\n\n";
        for split in 0..=stream.len() {
            let (left, right) = stream.split_at(split);
            let result: Value = decode_chunks(&[left, right])
                .unwrap_or_else(|e| panic!("split at {split} failed: {e}"));
            assert_eq!(result, json!({"a": 1}), "split at {split}");
        }
    }

    #[test]
    fn last_data_frame_wins() {
        let result: Value = decode_chunks(&[
            "data: {\"status\":\"success\",\"result\":1}\n\n",
            "keepalive\n\n",
            "data: {\"status\":\"success\",\"result\":2}\n\n",
        ])
        .unwrap();
        assert_eq!(result, json!(2));
    }

    #[test]
    fn non_data_frames_are_ignored() {
        let mut decoder = FrameDecoder::new();
        decoder.push(": ping\n\nevent: progress\n\n");
        assert!(!decoder.saw_data());
        let err = decoder.finish::<Value>().unwrap_err();
        assert!(matches!(err, StreamError::EmptyResult));
    }

    #[test]
    fn prefix_must_start_the_frame() {
        // A frame merely containing the prefix mid-text is not a data frame.
        let mut decoder = FrameDecoder::new();
        decoder.push("odata: {\"status\":\"success\",\"result\":1}\n\n");
        assert!(!decoder.saw_data());
    }

    #[test]
    fn empty_stream_fails_with_empty_result() {
        let err = decode_chunks::<Value>(&[]).unwrap_err();
        assert!(matches!(err, StreamError::EmptyResult));
    }

    #[test]
    fn trailing_unterminated_fragment_is_not_a_frame() {
        // The final fragment never got its delimiter; it must not be parsed.
        let mut decoder = FrameDecoder::new();
        decoder.push("data: {\"status\":\"success\",\"result\":1}");
        assert!(!decoder.saw_data());
        let err = decoder.finish::<Value>().unwrap_err();
        assert!(matches!(err, StreamError::EmptyResult));
    }

    #[test]
    fn multiple_frames_in_a_single_chunk() {
        let result: Value = decode_chunks(&[
            "data: {\"status\":\"success\",\"result\":\"first\"}\n\ndata: {\"status\":\"success\",\"result\":\"second\"}\n\n",
        ])
        .unwrap();
        assert_eq!(result, json!("second"));
    }

    #[test]
    fn payload_whitespace_is_trimmed_before_parsing() {
        let result: Value =
            decode_chunks(&["data:   {\"status\":\"success\",\"result\":42}  \n\n\n\n"]).unwrap();
        assert_eq!(result, json!(42));
    }

    #[test]
    fn non_success_status_carries_the_parsed_record() {
        let err = decode_chunks::<Value>(&[
            "data: {\"status\":\"error\",\"result\":null,\"message\":\"generation failed\"}\n\n",
        ])
        .unwrap_err();
        match err {
            StreamError::Unsuccessful { payload } => {
                assert_eq!(payload["status"], "error");
                assert_eq!(payload["message"], "generation failed");
            }
            other => panic!("expected Unsuccessful, got {other:?}"),
        }
    }

    #[test]
    fn missing_result_field_is_unsuccessful() {
        let err = decode_chunks::<Value>(&["data: {\"status\":\"success\"}\n\n"]).unwrap_err();
        assert!(matches!(err, StreamError::Unsuccessful { .. }));
    }

    #[test]
    fn unparseable_payload_is_malformed() {
        let err = decode_chunks::<Value>(&["data: not json at all\n\n"]).unwrap_err();
        assert!(matches!(err, StreamError::Malformed(_)));
    }

    #[test]
    fn typed_result_deserialization() {
        #[derive(serde::Deserialize)]
        struct Outcome {
            passed: u32,
        }
        let outcome: Outcome = decode_chunks(&[
            "data: {\"status\":\"success\",\"result\":{\"passed\":7}}\n\n",
        ])
        .unwrap();
        assert_eq!(outcome.passed, 7);
    }
}
