//! Recognition stream WebSocket connection handling
//!
//! Builds the live-transcription URL and handshake request, and runs the
//! split send/receive tasks over the open connection. Audio is only sent
//! while the shared open flag is set; a send attempted while the stream is
//! not open is a silent drop, never queued.

use super::messages::{ClientMessage, ServerMessage};
use super::TranscriptEvent;
use crate::audio::AudioChunk;
use crate::config::RecognitionSettings;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};

/// KeepAlive interval in seconds during silence
const KEEPALIVE_INTERVAL_SECS: u64 = 8;

/// Build the recognition WebSocket URL with live-transcription options
pub(crate) fn build_ws_url(
    settings: &RecognitionSettings,
    language: &str,
    sample_rate: u32,
) -> Result<url::Url, String> {
    let mut url = url::Url::parse(&settings.endpoint).map_err(|e| e.to_string())?;
    url.query_pairs_mut()
        .append_pair("model", &settings.model)
        .append_pair("language", language)
        .append_pair(
            "smart_format",
            if settings.smart_format { "true" } else { "false" },
        )
        .append_pair("encoding", "linear16")
        .append_pair("sample_rate", &sample_rate.to_string());
    Ok(url)
}

/// Build the WebSocket handshake request with token authentication
pub(crate) fn build_ws_request(
    ws_url: &url::Url,
    api_key: &str,
) -> Result<http::Request<()>, String> {
    let host = ws_url
        .host_str()
        .ok_or_else(|| "Invalid URL: no host".to_string())?
        .to_string();

    http::Request::builder()
        .uri(ws_url.as_str())
        .header("Host", host)
        .header("Authorization", format!("Token {}", api_key))
        .header("Upgrade", "websocket")
        .header("Connection", "Upgrade")
        .header("Sec-WebSocket-Key", generate_ws_key())
        .header("Sec-WebSocket-Version", "13")
        .body(())
        .map_err(|e| e.to_string())
}

/// Generate a random WebSocket key
fn generate_ws_key() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut key = [0u8; 16];
    rng.fill(&mut key);
    base64::engine::general_purpose::STANDARD.encode(key)
}

/// Spawn the receive task that parses incoming recognition events
///
/// Final, non-empty transcripts are numbered and published as fragments.
/// Any receive error clears the open flag and ends the task; there is no
/// reconnection, a fresh session is the only recovery path.
pub(crate) fn spawn_receive_task(
    mut ws_stream: impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin
        + Send
        + 'static,
    event_tx: broadcast::Sender<TranscriptEvent>,
    stream_open: Arc<AtomicBool>,
    should_stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut next_seq: u64 = 0;
        let mut stop_check = interval(Duration::from_millis(250));

        loop {
            let msg_result = tokio::select! {
                _ = stop_check.tick() => {
                    if should_stop.load(Ordering::SeqCst) {
                        break;
                    }
                    continue;
                }
                msg = ws_stream.next() => match msg {
                    Some(msg_result) => msg_result,
                    None => break,
                },
            };

            match msg_result {
                Ok(Message::Text(text)) => {
                    trace!("Recognition message: {}", text);
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(server_msg) => {
                            if let Some(error_msg) = server_msg.error_message() {
                                error!("Recognition stream error: {}", error_msg);
                                let _ = event_tx.send(TranscriptEvent::Error {
                                    message: error_msg,
                                });
                                continue;
                            }

                            match server_msg.transcript() {
                                Some((true, transcript)) => {
                                    next_seq += 1;
                                    debug!("Transcript fragment #{}: {}", next_seq, transcript);
                                    let _ = event_tx.send(TranscriptEvent::Fragment {
                                        seq: next_seq,
                                        text: transcript,
                                    });
                                }
                                Some((false, partial)) => {
                                    trace!("Interim transcript: {}", partial);
                                }
                                None => {}
                            }
                        }
                        Err(e) => {
                            warn!("Failed to parse recognition message: {} - {}", e, text);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("Recognition stream closed by server");
                    stream_open.store(false, Ordering::SeqCst);
                    let _ = event_tx.send(TranscriptEvent::Closed);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    trace!("Recognition stream ping/pong");
                }
                Err(e) => {
                    error!("Recognition stream receive error: {}", e);
                    stream_open.store(false, Ordering::SeqCst);
                    let _ = event_tx.send(TranscriptEvent::Error {
                        message: e.to_string(),
                    });
                    break;
                }
                _ => {}
            }
        }
    })
}

/// Spawn the send task that forwards audio chunks as binary frames
///
/// Chunks arriving while the stream is not open are dropped silently (the
/// ready-state gate from the connection contract). On stop or channel close
/// a CloseStream control message is sent and the sink closed.
pub(crate) fn spawn_send_task<S>(
    mut ws_sink: S,
    mut audio_rx: mpsc::Receiver<AudioChunk>,
    stream_open: Arc<AtomicBool>,
    should_stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()>
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunks_sent = 0u64;

        let mut keepalive = interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECS));
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = keepalive.tick() => {
                    if !stream_open.load(Ordering::SeqCst) {
                        continue;
                    }
                    if let Ok(json) = serde_json::to_string(&ClientMessage::KeepAlive) {
                        if ws_sink.send(Message::Text(json)).await.is_err() {
                            warn!("Failed to send recognition keepalive");
                            stream_open.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                }
                chunk = audio_rx.recv() => {
                    if should_stop.load(Ordering::SeqCst) {
                        finalize_stream(&mut ws_sink).await;
                        break;
                    }
                    match chunk {
                        Some(audio_chunk) => {
                            // Ready-state gate: not open means silent drop
                            if !stream_open.load(Ordering::SeqCst) {
                                debug!("Recognition stream not open - dropping audio chunk");
                                continue;
                            }
                            let bytes: Vec<u8> = audio_chunk
                                .samples
                                .iter()
                                .flat_map(|&s| s.to_le_bytes())
                                .collect();
                            match ws_sink.send(Message::Binary(bytes)).await {
                                Ok(()) => {
                                    chunks_sent += 1;
                                    if chunks_sent == 1 || chunks_sent % 50 == 0 {
                                        debug!(
                                            "Sent audio chunk #{} ({} samples)",
                                            chunks_sent,
                                            audio_chunk.samples.len()
                                        );
                                    }
                                }
                                Err(e) => {
                                    error!("Failed to send audio chunk: {}", e);
                                    stream_open.store(false, Ordering::SeqCst);
                                    break;
                                }
                            }
                        }
                        None => {
                            info!(
                                "Audio channel closed after {} chunks - finalizing stream",
                                chunks_sent
                            );
                            finalize_stream(&mut ws_sink).await;
                            break;
                        }
                    }
                }
            }
        }

        info!("Recognition send task exiting after {} chunks", chunks_sent);
    })
}

/// Send CloseStream and close the sink
async fn finalize_stream<S>(ws_sink: &mut S)
where
    S: SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    if let Ok(json) = serde_json::to_string(&ClientMessage::CloseStream) {
        if let Err(e) = ws_sink.send(Message::Text(json)).await {
            warn!("Failed to send CloseStream: {}", e);
        }
    }
    let _ = ws_sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RecognitionSettings {
        RecognitionSettings {
            endpoint: "wss://api.deepgram.com/v1/listen".to_string(),
            model: "base".to_string(),
            smart_format: true,
        }
    }

    #[test]
    fn test_build_ws_url() {
        let url = build_ws_url(&settings(), "en-US", 16000).unwrap();
        assert!(url.as_str().starts_with("wss://api.deepgram.com/v1/listen?"));
        assert!(url.query_pairs().any(|(k, v)| k == "model" && v == "base"));
        assert!(url.query_pairs().any(|(k, v)| k == "language" && v == "en-US"));
        assert!(url
            .query_pairs()
            .any(|(k, v)| k == "smart_format" && v == "true"));
        assert!(url
            .query_pairs()
            .any(|(k, v)| k == "sample_rate" && v == "16000"));
    }

    #[tokio::test]
    async fn test_receive_task_stops_during_silence() {
        let (event_tx, _event_rx) = broadcast::channel(4);
        let stream_open = Arc::new(AtomicBool::new(true));
        let should_stop = Arc::new(AtomicBool::new(false));

        // A stream that never yields: only the stop flag can end the task
        let task = spawn_receive_task(
            futures_util::stream::pending(),
            event_tx,
            stream_open,
            should_stop.clone(),
        );

        should_stop.store(true, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("receive task should stop promptly")
            .unwrap();
    }

    #[test]
    fn test_build_ws_request_has_token_auth() {
        let url = build_ws_url(&settings(), "en-US", 16000).unwrap();
        let request = build_ws_request(&url, "secret-key").unwrap();
        let auth = request.headers().get("Authorization").unwrap();
        assert_eq!(auth.to_str().unwrap(), "Token secret-key");
        assert_eq!(request.headers().get("Host").unwrap(), "api.deepgram.com");
    }
}
