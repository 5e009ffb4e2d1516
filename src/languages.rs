//! Supported-language set and code-to-name mapping
//!
//! Both language selectors are constrained to this fixed set. Display names
//! are used when building translation and annotation prompts.

use thiserror::Error;

/// A supported language: recognition/translation code plus display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

/// Languages accepted by both the recognition service (base model) and the
/// translation prompts.
pub(crate) const SUPPORTED_LANGUAGES: &[Language] = &[
    Language { code: "en-US", name: "English" },
    Language { code: "es", name: "Spanish" },
    Language { code: "fr", name: "French" },
    Language { code: "de", name: "German" },
    Language { code: "hi", name: "Hindi" },
    Language { code: "ja", name: "Japanese" },
    Language { code: "ko", name: "Korean" },
    Language { code: "pt", name: "Portuguese" },
    Language { code: "ru", name: "Russian" },
    Language { code: "zh", name: "Chinese" },
];

/// Check whether a language code belongs to the supported set
pub(crate) fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|l| l.code == code)
}

/// Convert a language code to its full name for use in prompts
pub(crate) fn language_name(code: &str) -> &str {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|l| l.code == code)
        .map(|l| l.name)
        .unwrap_or(code) // Return code itself for unknown languages
}

/// A validated source/target language pair
///
/// Construction fails for codes outside the supported set, so holders of a
/// `LanguagePair` never need to re-validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    /// Build a validated pair from source and target codes
    pub(crate) fn new(source: &str, target: &str) -> Result<Self, LanguageError> {
        for code in [source, target] {
            if !is_supported(code) {
                return Err(LanguageError::Unsupported {
                    code: code.to_string(),
                    supported: supported_codes().join(", "),
                });
            }
        }
        Ok(Self {
            source: source.to_string(),
            target: target.to_string(),
        })
    }

    /// Display name of the source language
    pub(crate) fn source_name(&self) -> &str {
        language_name(&self.source)
    }

    /// Display name of the target language
    pub(crate) fn target_name(&self) -> &str {
        language_name(&self.target)
    }
}

/// All supported language codes, for error messages and `--list-languages`
pub(crate) fn supported_codes() -> Vec<&'static str> {
    SUPPORTED_LANGUAGES.iter().map(|l| l.code).collect()
}

/// Language validation errors
#[derive(Debug, Error)]
pub(crate) enum LanguageError {
    #[error("Unsupported language code '{code}' (supported: {supported})")]
    Unsupported { code: String, supported: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_name() {
        assert_eq!(language_name("en-US"), "English");
        assert_eq!(language_name("zh"), "Chinese");
        assert_eq!(language_name("de"), "German");
        assert_eq!(language_name("unknown"), "unknown");
    }

    #[test]
    fn test_is_supported() {
        assert!(is_supported("en-US"));
        assert!(is_supported("zh"));
        assert!(!is_supported("en"));
        assert!(!is_supported(""));
    }

    #[test]
    fn test_language_pair_valid() {
        let pair = LanguagePair::new("en-US", "zh").unwrap();
        assert_eq!(pair.source_name(), "English");
        assert_eq!(pair.target_name(), "Chinese");
    }

    #[test]
    fn test_language_pair_rejects_unknown_code() {
        let err = LanguagePair::new("en-US", "xx").unwrap_err();
        let message = format!("{}", err);
        assert!(message.contains("xx"));
        assert!(message.contains("en-US"));
    }
}
