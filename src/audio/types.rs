//! Audio types and error definitions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;

/// Audio chunk ready to be streamed to the recognition service
///
/// Contains PCM audio data at the recognition sample rate (16kHz mono).
#[derive(Debug, Clone)]
pub(crate) struct AudioChunk {
    /// PCM 16-bit signed samples (mono)
    pub samples: Vec<i16>,
    /// Sample rate in Hz (typically 16000)
    pub sample_rate: u32,
}

/// Handle for controlling audio capture from outside the capture thread
///
/// Provides methods to stop capturing and check the capture status. The
/// microphone is released when `stop` is called or the capture thread exits.
pub(crate) struct AudioCaptureHandle {
    pub(crate) is_capturing: Arc<AtomicBool>,
    pub(crate) thread_handle: Option<JoinHandle<()>>,
}

impl AudioCaptureHandle {
    /// Stop capturing audio and release the microphone
    pub fn stop(&mut self) {
        self.is_capturing.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        info!("Audio capture stopped");
    }

    /// Check if currently capturing
    #[allow(dead_code)]
    pub fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }
}

/// Errors that can occur during audio capture
#[derive(Debug, thiserror::Error)]
pub(crate) enum AudioCaptureError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("No audio input device available")]
    DeviceUnavailable,

    #[error("No supported audio configuration found")]
    NoSupportedConfig,

    #[error("Audio configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    StreamError(String),
}

/// Classify a backend-specific error description as a permission failure or
/// a generic stream error. Platforms report denied microphone access through
/// this free-form channel.
fn classify_backend_error(description: &str) -> AudioCaptureError {
    let lower = description.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        AudioCaptureError::PermissionDenied
    } else {
        AudioCaptureError::StreamError(description.to_string())
    }
}

impl From<cpal::BuildStreamError> for AudioCaptureError {
    fn from(e: cpal::BuildStreamError) -> Self {
        match e {
            cpal::BuildStreamError::DeviceNotAvailable => AudioCaptureError::DeviceUnavailable,
            cpal::BuildStreamError::BackendSpecific { err } => {
                classify_backend_error(&err.description)
            }
            other => AudioCaptureError::StreamError(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for AudioCaptureError {
    fn from(e: cpal::PlayStreamError) -> Self {
        match e {
            cpal::PlayStreamError::DeviceNotAvailable => AudioCaptureError::DeviceUnavailable,
            cpal::PlayStreamError::BackendSpecific { err } => {
                classify_backend_error(&err.description)
            }
        }
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioCaptureError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                AudioCaptureError::DeviceUnavailable
            }
            cpal::DefaultStreamConfigError::BackendSpecific { err } => {
                classify_backend_error(&err.description)
            }
            other => AudioCaptureError::ConfigError(other.to_string()),
        }
    }
}
