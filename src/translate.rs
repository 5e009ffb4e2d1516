//! Translation client
//!
//! Translates transcript fragments by prompting the language model with a
//! fixed instruction template; the answer is returned inside triple backticks
//! and extracted before use.

use crate::languages::language_name;
use crate::llm::{extract_backtick_block, LlmClient, LlmError};
use async_trait::async_trait;
use std::sync::Arc;

/// Text-to-text translation contract: text in, translated text out, best
/// effort. Implementations make a single attempt; failures are the caller's
/// signal to skip downstream processing for the fragment.
#[async_trait]
pub(crate) trait Translate: Send + Sync {
    async fn translate(&self, source: &str, target: &str, text: &str)
        -> Result<String, LlmError>;
}

/// Prompt template for translation. The few-shot example pins the expected
/// backtick answer format.
const TRANSLATE_PROMPT_TEMPLATE: &str = r#"Translate the following text from {source} to {target}:

{text}

Return the translation inside triple backticks. If you have any notes, include them but outside the triple backticks.

Example
Text: I am a boy
Translation:
```
我是男孩
```

Text: {text}
Translation:
"#;

/// Build the translation prompt for a fragment
fn build_prompt(source_name: &str, target_name: &str, text: &str) -> String {
    TRANSLATE_PROMPT_TEMPLATE
        .replace("{source}", source_name)
        .replace("{target}", target_name)
        .replace("{text}", text)
}

/// Language-model-backed translator
pub(crate) struct LlmTranslator {
    llm: Arc<LlmClient>,
}

impl LlmTranslator {
    pub(crate) fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Translate for LlmTranslator {
    async fn translate(
        &self,
        source: &str,
        target: &str,
        text: &str,
    ) -> Result<String, LlmError> {
        let prompt = build_prompt(language_name(source), language_name(target), text);
        let raw = self.llm.complete(&prompt).await?;
        extract_backtick_block(&raw).ok_or_else(|| {
            LlmError::InvalidResponse("No backtick block in translation response".to_string())
        })
    }
}
