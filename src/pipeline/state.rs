//! Pipeline state: the ordered transcript, translation, and note sequences

use crate::annotate::ContextNote;

/// Accumulated pipeline output for the running session
///
/// All three sequences are append-only. Transcripts and translations are
/// kept positionally aligned by the sequential worker; notes are appended
/// only when annotation yields one and carry no positional guarantee.
#[derive(Debug, Default, Clone)]
pub(crate) struct PipelineState {
    /// Committed transcript fragments, in arrival order
    pub transcripts: Vec<String>,
    /// Translated fragments, one per successfully translated transcript
    pub translations: Vec<String>,
    /// Context notes, in arrival order
    pub notes: Vec<ContextNote>,
}

impl PipelineState {
    /// Full transcript text, fragments joined by spaces
    pub fn transcript_text(&self) -> String {
        self.transcripts.join(" ")
    }

    /// Full translation text, fragments joined by spaces
    pub fn translation_text(&self) -> String {
        self.translations.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joined_text() {
        let state = PipelineState {
            transcripts: vec!["Hello".to_string(), "world".to_string()],
            translations: vec!["你好".to_string(), "世界".to_string()],
            notes: vec![],
        };
        assert_eq!(state.transcript_text(), "Hello world");
        assert_eq!(state.translation_text(), "你好 世界");
    }

    #[test]
    fn test_empty_state() {
        let state = PipelineState::default();
        assert_eq!(state.transcript_text(), "");
        assert_eq!(state.translation_text(), "");
        assert!(state.notes.is_empty());
    }
}
