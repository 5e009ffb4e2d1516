//! User preferences storage
//!
//! Persists the default language pair to a JSON file in the platform config
//! directory so the CLI flags can be omitted on subsequent runs.

use crate::languages::LanguagePair;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

/// Default source language when nothing is stored
pub(crate) const DEFAULT_SOURCE_LANGUAGE: &str = "en-US";

/// Default target language when nothing is stored
pub(crate) const DEFAULT_TARGET_LANGUAGE: &str = "zh";

/// Persisted user preferences
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Preferences {
    /// Last used source language code
    pub source_language: Option<String>,
    /// Last used target language code
    pub target_language: Option<String>,
}

/// Get the preferences file path
fn preferences_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lingolive").join("preferences.json"))
}

/// Load preferences from disk
///
/// Returns default preferences if the file doesn't exist or can't be read
pub(crate) fn load_preferences() -> Preferences {
    let Some(path) = preferences_path() else {
        return Preferences::default();
    };

    if !path.exists() {
        return Preferences::default();
    }

    match fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(prefs) => prefs,
            Err(e) => {
                error!("Failed to parse preferences: {}", e);
                Preferences::default()
            }
        },
        Err(e) => {
            error!("Failed to read preferences file: {}", e);
            Preferences::default()
        }
    }
}

/// Save preferences to disk
pub(crate) fn save_preferences(prefs: &Preferences) -> Result<(), PreferencesError> {
    let path = preferences_path().ok_or(PreferencesError::NoConfigDir)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            info!("Created preferences directory: {:?}", parent);
        }
    }

    let json = serde_json::to_string_pretty(prefs)?;
    fs::write(&path, json)?;
    info!("Saved preferences to: {:?}", path);

    Ok(())
}

/// Store a language pair as the new default
pub(crate) fn remember_language_pair(pair: &LanguagePair) -> Result<(), PreferencesError> {
    let mut prefs = load_preferences();
    prefs.source_language = Some(pair.source.clone());
    prefs.target_language = Some(pair.target.clone());
    save_preferences(&prefs)
}

/// Source language code to use when no CLI flag is given
pub(crate) fn default_source_language() -> String {
    load_preferences()
        .source_language
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE_LANGUAGE.to_string())
}

/// Target language code to use when no CLI flag is given
pub(crate) fn default_target_language() -> String {
    load_preferences()
        .target_language
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.to_string())
}

/// Preferences errors
#[derive(Debug, thiserror::Error)]
pub(crate) enum PreferencesError {
    #[error("Could not find config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
