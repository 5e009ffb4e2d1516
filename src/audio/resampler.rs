//! Audio resampling and sample processing

use super::types::AudioChunk;
use super::RECOGNITION_SAMPLE_RATE;
use rubato::{Resampler, SincFixedIn};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Chunk size in samples: 500ms of audio at 16kHz. This is the cadence at
/// which chunks are handed to the recognition stream.
pub(crate) const CHUNK_SIZE: usize = 8000;

/// Process incoming audio samples: convert to mono, optionally resample,
/// buffer, and emit complete chunks on the channel.
pub(crate) fn process_samples(
    data: &[i16],
    channels: usize,
    input_buffer: &Arc<Mutex<Vec<i16>>>,
    input_chunk_size: usize,
    output_buffer: &Arc<Mutex<Vec<i16>>>,
    sender: &mpsc::Sender<AudioChunk>,
    resampler: &Option<Arc<Mutex<SincFixedIn<f32>>>>,
) {
    let mono_samples = downmix_to_mono(data, channels);

    if let Some(resampler_arc) = resampler {
        resample_into_output(
            &mono_samples,
            input_buffer,
            input_chunk_size,
            output_buffer,
            resampler_arc,
        );
    } else if let Ok(mut output_buf) = output_buffer.lock() {
        output_buf.extend(&mono_samples);
    }

    flush_chunks(output_buffer, sender);
}

/// Convert interleaved samples to mono by averaging channels
fn downmix_to_mono(data: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Feed mono samples through the resampler in fixed-size blocks, appending
/// the 16kHz output to the output buffer.
fn resample_into_output(
    mono_samples: &[i16],
    input_buffer: &Arc<Mutex<Vec<i16>>>,
    input_chunk_size: usize,
    output_buffer: &Arc<Mutex<Vec<i16>>>,
    resampler_arc: &Arc<Mutex<SincFixedIn<f32>>>,
) {
    let Ok(mut input_buf) = input_buffer.lock() else {
        return;
    };
    input_buf.extend(mono_samples);

    while input_buf.len() >= input_chunk_size {
        let input_chunk: Vec<i16> = input_buf.drain(..input_chunk_size).collect();
        let input_f32: Vec<f32> = input_chunk.iter().map(|&s| s as f32 / 32768.0).collect();

        let Ok(mut resampler) = resampler_arc.lock() else {
            return;
        };
        match resampler.process(&[input_f32], None) {
            Ok(resampled) => {
                let output_i16: Vec<i16> = resampled[0]
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                    .collect();
                if let Ok(mut output_buf) = output_buffer.lock() {
                    output_buf.extend(&output_i16);
                }
            }
            Err(e) => {
                error!("Resampling error: {}", e);
            }
        }
    }
}

/// Emit complete 500ms chunks from the output buffer
fn flush_chunks(output_buffer: &Arc<Mutex<Vec<i16>>>, sender: &mpsc::Sender<AudioChunk>) {
    if let Ok(mut output_buf) = output_buffer.lock() {
        while output_buf.len() >= CHUNK_SIZE {
            let chunk: Vec<i16> = output_buf.drain(..CHUNK_SIZE).collect();
            let audio_chunk = AudioChunk {
                samples: chunk,
                sample_rate: RECOGNITION_SAMPLE_RATE,
            };
            // Use try_send to avoid blocking the audio callback
            if let Err(e) = sender.try_send(audio_chunk) {
                warn!("Audio buffer overflow - chunk dropped: {}", e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo_averages_channels() {
        let interleaved = [100i16, 300, -50, -150, 0, 0];
        let mono = downmix_to_mono(&interleaved, 2);
        assert_eq!(mono, vec![200, -100, 0]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let samples = [1i16, 2, 3];
        assert_eq!(downmix_to_mono(&samples, 1), vec![1, 2, 3]);
    }

    #[test]
    fn test_flush_chunks_emits_complete_chunks_only() {
        let output_buffer = Arc::new(Mutex::new(vec![0i16; CHUNK_SIZE + 10]));
        let (tx, mut rx) = mpsc::channel(4);

        flush_chunks(&output_buffer, &tx);

        let chunk = rx.try_recv().expect("one complete chunk expected");
        assert_eq!(chunk.samples.len(), CHUNK_SIZE);
        assert_eq!(chunk.sample_rate, RECOGNITION_SAMPLE_RATE);
        assert!(rx.try_recv().is_err());
        assert_eq!(output_buffer.lock().unwrap().len(), 10);
    }
}
