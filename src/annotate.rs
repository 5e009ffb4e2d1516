//! Context annotation client
//!
//! Asks the language model for a short factual note about any named entity
//! in a translated fragment. The model answers with the note or the literal
//! sentinel when nothing is worth annotating.

use crate::languages::language_name;
use crate::llm::{LlmClient, LlmError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Literal the model returns when no annotation applies
pub(crate) const NO_CONTEXT_SENTINEL: &str = "NO CONTEXT";

/// A cultural-context note for a translated fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ContextNote {
    pub text: String,
    /// Optional illustration URL. The language-model backend never fills
    /// this in; observers must treat it as absent.
    pub image_url: Option<String>,
}

/// Annotation contract: translated text in, optional note out. `Ok(None)`
/// means the service answered with the sentinel or nothing usable.
#[async_trait]
pub(crate) trait Annotate: Send + Sync {
    async fn annotate(&self, text: &str, language: &str)
        -> Result<Option<ContextNote>, LlmError>;
}

/// Prompt template for context annotation
const ANNOTATE_PROMPT_TEMPLATE: &str = r#"The following is a sentence in {language}:

{text}

If the sentence mentions a named entity (a place, person, organization, event, or cultural reference), write a terse factual note about it, 1-2 sentences at most. If there is no named entity worth explaining, reply with exactly:

NO CONTEXT

Reply with only the note or the literal NO CONTEXT, nothing else.
"#;

/// Build the annotation prompt for a translated fragment
fn build_prompt(language_display_name: &str, text: &str) -> String {
    ANNOTATE_PROMPT_TEMPLATE
        .replace("{language}", language_display_name)
        .replace("{text}", text)
}

/// Language-model-backed annotator
pub(crate) struct LlmAnnotator {
    llm: Arc<LlmClient>,
}

impl LlmAnnotator {
    pub(crate) fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Annotate for LlmAnnotator {
    async fn annotate(
        &self,
        text: &str,
        language: &str,
    ) -> Result<Option<ContextNote>, LlmError> {
        let prompt = build_prompt(language_name(language), text);
        let raw = self.llm.complete(&prompt).await?;
        Ok(parse_annotation(&raw))
    }
}

/// Interpret the model's answer: sentinel or empty means no note
fn parse_annotation(raw: &str) -> Option<ContextNote> {
    let answer = raw.trim();
    if answer.is_empty() || answer.eq_ignore_ascii_case(NO_CONTEXT_SENTINEL) {
        debug!("No context annotation for fragment");
        return None;
    }
    Some(ContextNote {
        text: answer.to_string(),
        image_url: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_substitutes() {
        let prompt = build_prompt("Chinese", "你好世界");
        assert!(prompt.contains("a sentence in Chinese"));
        assert!(prompt.contains("你好世界"));
        assert!(prompt.contains(NO_CONTEXT_SENTINEL));
    }

    #[test]
    fn test_parse_annotation_sentinel() {
        assert_eq!(parse_annotation("NO CONTEXT"), None);
        assert_eq!(parse_annotation("  no context  "), None);
    }

    #[test]
    fn test_parse_annotation_empty() {
        assert_eq!(parse_annotation(""), None);
        assert_eq!(parse_annotation("   \n "), None);
    }

    #[test]
    fn test_parse_annotation_note() {
        let note = parse_annotation("The Great Wall is a fortification in northern China.")
            .expect("note expected");
        assert!(note.text.starts_with("The Great Wall"));
        assert!(note.image_url.is_none());
    }
}
