//! Transcription module for real-time speech-to-text
//!
//! Handles the WebSocket connection to the Deepgram live recognition service.
//! Audio chunks are streamed upstream as binary PCM16 frames; committed
//! transcript fragments are published to subscribers. There is no automatic
//! reconnection: a dropped stream stays down until a new listening session
//! opens a fresh connection.

mod connection;
mod error;
mod messages;

pub(crate) use error::TranscriptionError;

use crate::audio::{AudioChunk, RECOGNITION_SAMPLE_RATE};
use crate::config::RecognitionSettings;
use connection::{build_ws_request, build_ws_url, spawn_receive_task, spawn_send_task};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tracing::info;

/// Transcript event for subscribers
#[derive(Clone, Debug)]
pub(crate) enum TranscriptEvent {
    /// Committed transcript fragment with its sequence number
    Fragment { seq: u64, text: String },
    /// Stream error (logged, never retried)
    Error { message: String },
    /// Connection was closed by the server
    Closed,
}

/// Client for one live recognition stream
pub(crate) struct TranscriptionClient {
    language_code: String,
    event_tx: broadcast::Sender<TranscriptEvent>,
    should_stop: Arc<AtomicBool>,
    stream_open: Arc<AtomicBool>,
}

impl TranscriptionClient {
    /// Create a new transcription client
    ///
    /// # Arguments
    /// * `language_code` - Source language for recognition (e.g. "en-US")
    pub(crate) fn new(language_code: String) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            language_code,
            event_tx,
            should_stop: Arc::new(AtomicBool::new(false)),
            stream_open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to transcript events
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.event_tx.subscribe()
    }

    /// Open the recognition stream and run it to completion
    ///
    /// Connects to the recognition service, then forwards audio chunks from
    /// `audio_rx` while parsing transcript events. Returns when the stream
    /// ends, whether by stop, audio channel close, or connection loss.
    pub(crate) async fn start(
        &self,
        settings: &RecognitionSettings,
        api_key: &str,
        audio_rx: mpsc::Receiver<AudioChunk>,
    ) -> Result<(), TranscriptionError> {
        let ws_url = build_ws_url(settings, &self.language_code, RECOGNITION_SAMPLE_RATE)
            .map_err(TranscriptionError::ConnectionError)?;

        info!(
            language_code = %self.language_code,
            model = %settings.model,
            "Connecting to recognition stream"
        );

        let request =
            build_ws_request(&ws_url, api_key).map_err(TranscriptionError::ConnectionError)?;

        let ws_result = timeout(
            Duration::from_secs(error::WS_CONNECT_TIMEOUT_SECS),
            connect_async(request),
        )
        .await;

        let ws_stream = match ws_result {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => return Err(TranscriptionError::ConnectionError(e.to_string())),
            Err(_) => return Err(TranscriptionError::ConnectionTimeout),
        };

        info!("Connected to recognition stream");
        self.stream_open.store(true, Ordering::SeqCst);

        let (ws_sink, ws_stream) = ws_stream.split();

        let recv_task = spawn_receive_task(
            ws_stream,
            self.event_tx.clone(),
            self.stream_open.clone(),
            self.should_stop.clone(),
        );

        let send_task = spawn_send_task(
            ws_sink,
            audio_rx,
            self.stream_open.clone(),
            self.should_stop.clone(),
        );

        // Send side finishes on stop or audio channel close; give the server
        // a moment to deliver the final results before tearing down receive.
        let _ = send_task.await;
        if timeout(Duration::from_secs(5), recv_task).await.is_err() {
            info!("Recognition receive task did not finish in time");
        }

        self.stream_open.store(false, Ordering::SeqCst);
        info!("Recognition stream session ended");
        Ok(())
    }

    /// Check whether the stream is currently accepting audio
    #[allow(dead_code)]
    pub(crate) fn is_open(&self) -> bool {
        self.stream_open.load(Ordering::SeqCst)
    }

    /// Signal the stream to stop
    pub(crate) fn stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }
}
