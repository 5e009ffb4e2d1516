//! Listening session management
//!
//! Wires audio capture, the recognition stream, and the pipeline worker into
//! one listening session, guarded so that only a single session can be
//! active. Stopping aborts the pipeline worker, which makes late-arriving
//! translation or annotation results impossible to append after stop.

use crate::audio::{self, AudioCaptureError, AudioCaptureHandle};
use crate::config::RecognitionSettings;
use crate::pipeline::{Fragment, Pipeline};
use crate::transcription::{TranscriptEvent, TranscriptionClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use zeroize::Zeroize;

/// Guard ensuring a single active listening session
pub(crate) struct ListeningGuard(AtomicBool);

impl ListeningGuard {
    pub(crate) fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Try to claim the guard; false means a session is already active
    pub(crate) fn try_begin(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    /// Release the guard
    pub(crate) fn end(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_listening(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One active listening session's resources
struct LiveSession {
    audio_handle: AudioCaptureHandle,
    transcription: Arc<TranscriptionClient>,
    worker: JoinHandle<()>,
    forwarder: JoinHandle<()>,
}

/// Starts and stops listening sessions against a long-lived pipeline
pub(crate) struct SessionController {
    recognition: RecognitionSettings,
    api_key: String,
    pipeline: Arc<Pipeline>,
    guard: ListeningGuard,
    active: Mutex<Option<LiveSession>>,
}

/// Errors starting a listening session
#[derive(Debug, thiserror::Error)]
pub(crate) enum SessionError {
    #[error("Audio capture failed: {0}")]
    Capture(#[from] AudioCaptureError),
}

impl SessionController {
    pub(crate) fn new(
        recognition: RecognitionSettings,
        api_key: String,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        Self {
            recognition,
            api_key,
            pipeline,
            guard: ListeningGuard::new(),
            active: Mutex::new(None),
        }
    }

    pub(crate) fn is_listening(&self) -> bool {
        self.guard.is_listening()
    }

    /// Start a listening session
    ///
    /// A no-op (logged at debug) when a session is already active. On any
    /// startup failure the guard is released and the error returned.
    pub(crate) fn start_listening(self: Arc<Self>) -> Result<(), SessionError> {
        if !self.guard.try_begin() {
            debug!("Already listening - ignoring start request");
            return Ok(());
        }

        let (audio_handle, audio_rx) = match audio::start_capture() {
            Ok(result) => result,
            Err(e) => {
                self.guard.end();
                return Err(e.into());
            }
        };

        let source_language = self.pipeline.languages().source.clone();
        let transcription = Arc::new(TranscriptionClient::new(source_language));

        // Bridge transcript fragments into the pipeline queue
        let (fragment_tx, fragment_rx) = mpsc::channel(64);
        let forwarder = tokio::spawn(forward_fragments(transcription.subscribe(), fragment_tx));
        let worker = self.pipeline.clone().spawn_worker(fragment_rx);

        // Run the recognition stream; surface connection failures and tear
        // the session down so the user can retry.
        let controller = self.clone();
        let client = transcription.clone();
        let recognition = self.recognition.clone();
        let api_key = self.api_key.clone();
        tokio::spawn(async move {
            if let Err(e) = client.start(&recognition, &api_key, audio_rx).await {
                error!("Recognition stream failed: {}", e);
                eprintln!("Connection to the recognition service failed: {e}");
                controller.stop_listening();
            }
        });

        if let Ok(mut active) = self.active.lock() {
            *active = Some(LiveSession {
                audio_handle,
                transcription,
                worker,
                forwarder,
            });
        }

        info!("Listening session started");
        Ok(())
    }

    /// Stop the active listening session, if any
    ///
    /// Releases the microphone, signals the recognition stream to close, and
    /// aborts the pipeline worker so no results land after this returns.
    pub(crate) fn stop_listening(&self) {
        let session = match self.active.lock() {
            Ok(mut active) => active.take(),
            Err(_) => None,
        };

        let Some(mut session) = session else {
            self.guard.end();
            return;
        };

        session.audio_handle.stop();
        session.transcription.stop();
        session.worker.abort();
        session.forwarder.abort();
        self.guard.end();
        info!("Listening session stopped");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        // Clear API key from memory
        self.api_key.zeroize();
    }
}

/// Forward fragment events from the recognition stream into the pipeline
/// queue. Errors and closes are logged; fragments lost to broadcast lag are
/// counted and skipped.
async fn forward_fragments(
    mut event_rx: broadcast::Receiver<TranscriptEvent>,
    fragment_tx: mpsc::Sender<Fragment>,
) {
    loop {
        match event_rx.recv().await {
            Ok(TranscriptEvent::Fragment { seq, text }) => {
                if fragment_tx.send(Fragment { seq, text }).await.is_err() {
                    debug!("Pipeline queue closed - stopping fragment forwarder");
                    break;
                }
            }
            Ok(TranscriptEvent::Error { message }) => {
                warn!("Recognition stream reported error: {}", message);
            }
            Ok(TranscriptEvent::Closed) => {
                info!("Recognition stream closed");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Fragment forwarder lagged, {} events skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{Annotate, ContextNote};
    use crate::languages::LanguagePair;
    use crate::llm::LlmError;
    use crate::translate::Translate;
    use async_trait::async_trait;

    struct NoopTranslator;

    #[async_trait]
    impl Translate for NoopTranslator {
        async fn translate(&self, _: &str, _: &str, text: &str) -> Result<String, LlmError> {
            Ok(text.to_string())
        }
    }

    struct NoopAnnotator;

    #[async_trait]
    impl Annotate for NoopAnnotator {
        async fn annotate(&self, _: &str, _: &str) -> Result<Option<ContextNote>, LlmError> {
            Ok(None)
        }
    }

    fn test_controller() -> Arc<SessionController> {
        let pipeline = Arc::new(Pipeline::new(
            LanguagePair::new("en-US", "zh").unwrap(),
            Arc::new(NoopTranslator),
            Arc::new(NoopAnnotator),
        ));
        Arc::new(SessionController::new(
            RecognitionSettings {
                endpoint: "wss://api.deepgram.com/v1/listen".to_string(),
                model: "base".to_string(),
                smart_format: true,
            },
            "test-key".to_string(),
            pipeline,
        ))
    }

    #[tokio::test]
    async fn test_failed_start_releases_guard() {
        let controller = test_controller();
        match controller.clone().start_listening() {
            Err(_) => {
                // No usable device: the guard must be released so the user
                // can retry instead of being stuck "listening".
                assert!(!controller.is_listening());
            }
            Ok(()) => {
                // Machines with a microphone get a live session; tear it down.
                assert!(controller.is_listening());
                controller.stop_listening();
                assert!(!controller.is_listening());
            }
        }
    }

    #[test]
    fn test_guard_single_session() {
        let guard = ListeningGuard::new();
        assert!(!guard.is_listening());
        assert!(guard.try_begin());
        assert!(guard.is_listening());

        // Second start while listening is refused
        assert!(!guard.try_begin());

        guard.end();
        assert!(!guard.is_listening());
        assert!(guard.try_begin());
    }

    #[tokio::test]
    async fn test_forwarder_passes_fragments_and_skips_noise() {
        let (event_tx, event_rx) = broadcast::channel(16);
        let (fragment_tx, mut fragment_rx) = mpsc::channel(16);

        let handle = tokio::spawn(forward_fragments(event_rx, fragment_tx));

        event_tx
            .send(TranscriptEvent::Error {
                message: "transient".to_string(),
            })
            .unwrap();
        event_tx
            .send(TranscriptEvent::Fragment {
                seq: 1,
                text: "Hello world".to_string(),
            })
            .unwrap();
        event_tx.send(TranscriptEvent::Closed).unwrap();
        drop(event_tx);

        let fragment = fragment_rx.recv().await.expect("fragment expected");
        assert_eq!(fragment.seq, 1);
        assert_eq!(fragment.text, "Hello world");
        assert!(fragment_rx.recv().await.is_none());
        handle.await.unwrap();
    }
}
