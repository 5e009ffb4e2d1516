//! Recognition stream message types
//!
//! Wire format of the Deepgram live transcription WebSocket: binary PCM16
//! frames upstream, JSON events downstream carrying
//! `channel.alternatives[0].transcript`.

use serde::{Deserialize, Serialize};

/// Control messages sent to the recognition stream
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub(crate) enum ClientMessage {
    /// Keep the connection alive during silence
    KeepAlive,
    /// Finalize and close the stream
    CloseStream,
}

/// Events received from the recognition stream
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ServerMessage {
    /// Transcription results for a segment of audio
    Results {
        #[serde(default)]
        is_final: bool,
        channel: Option<ResultsChannel>,
    },
    /// Stream metadata, sent on open and close
    Metadata {
        #[allow(dead_code)]
        request_id: Option<String>,
    },
    /// End of a detected utterance
    UtteranceEnd,
    /// Speech onset detected
    SpeechStarted,
    /// Error reported by the service
    Error { description: Option<String> },
    /// Catch-all for other message types
    #[serde(other)]
    Other,
}

/// Channel block within a Results event
#[derive(Debug, Deserialize)]
pub(crate) struct ResultsChannel {
    pub alternatives: Vec<Alternative>,
}

/// One recognition alternative
#[derive(Debug, Deserialize)]
pub(crate) struct Alternative {
    pub transcript: Option<String>,
    #[allow(dead_code)]
    pub confidence: Option<f32>,
}

impl ServerMessage {
    /// Extract the transcript text if this is a non-empty result.
    /// Returns `(is_final, text)`; empty transcripts are discarded here.
    pub fn transcript(&self) -> Option<(bool, String)> {
        match self {
            ServerMessage::Results { is_final, channel } => channel
                .as_ref()
                .and_then(|c| c.alternatives.first())
                .and_then(|a| a.transcript.as_ref())
                .filter(|t| !t.trim().is_empty())
                .map(|t| (*is_final, t.clone())),
            _ => None,
        }
    }

    /// Check if this is an error message
    pub fn error_message(&self) -> Option<String> {
        match self {
            ServerMessage::Error { description } => description.clone(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_stream_serialization() {
        let json = serde_json::to_string(&ClientMessage::CloseStream).unwrap();
        assert_eq!(json, r#"{"type":"CloseStream"}"#);
    }

    #[test]
    fn test_keep_alive_serialization() {
        let json = serde_json::to_string(&ClientMessage::KeepAlive).unwrap();
        assert_eq!(json, r#"{"type":"KeepAlive"}"#);
    }

    #[test]
    fn test_results_deserialization() {
        let json = r#"{
            "type": "Results",
            "is_final": true,
            "channel": {
                "alternatives": [{"transcript": "Hello world", "confidence": 0.98}]
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.transcript(), Some((true, "Hello world".to_string())));
    }

    #[test]
    fn test_empty_transcript_discarded() {
        let json = r#"{
            "type": "Results",
            "is_final": true,
            "channel": {"alternatives": [{"transcript": ""}]}
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert!(msg.transcript().is_none());
    }

    #[test]
    fn test_interim_result_not_final() {
        let json = r#"{
            "type": "Results",
            "channel": {"alternatives": [{"transcript": "Hel"}]}
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.transcript(), Some((false, "Hel".to_string())));
    }

    #[test]
    fn test_unknown_message_type_tolerated() {
        let json = r#"{"type": "SomethingNew", "payload": 1}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ServerMessage::Other));
        assert!(msg.transcript().is_none());
    }

    #[test]
    fn test_error_message() {
        let json = r#"{"type": "Error", "description": "bad audio"}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.error_message(), Some("bad audio".to_string()));
    }
}
