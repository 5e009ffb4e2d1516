//! Terminal presentation layer
//!
//! Pure projection of pipeline state: a subscriber task prints transcript,
//! translation, and context-note lines as they arrive, and a summary is
//! printed from a state snapshot when the program exits. No logic beyond
//! rendering lives here.

use crate::languages::LanguagePair;
use crate::pipeline::{Pipeline, PipelineEvent, PipelineState};
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

/// Print the session header with the language pair and controls
pub(crate) fn print_header(languages: &LanguagePair) {
    println!(
        "{} {} ({}) -> {} ({})",
        "lingolive".bold(),
        languages.source_name().cyan(),
        languages.source,
        languages.target_name().cyan(),
        languages.target,
    );
    println!(
        "{}",
        "Press Enter to start/stop listening, 'q' to quit.".dimmed()
    );
}

/// Print the listening indicator
pub(crate) fn print_listening(listening: bool) {
    if listening {
        println!("{}", "● listening".green());
    } else {
        println!("{}", "■ stopped".red());
    }
}

/// Spawn the event subscriber that renders pipeline output incrementally
pub(crate) fn spawn_display(pipeline: &Arc<Pipeline>) -> JoinHandle<()> {
    let event_rx = pipeline.subscribe();
    tokio::spawn(run_display(event_rx))
}

async fn run_display(mut event_rx: broadcast::Receiver<PipelineEvent>) {
    loop {
        match event_rx.recv().await {
            Ok(event) => render_event(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Display lagged, {} events skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Render a single pipeline event
fn render_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::TranscriptAppended { seq, text } => {
            println!("{:>4} {} {}", seq.dimmed(), "heard".dimmed(), text);
        }
        PipelineEvent::TranslationAppended { seq, text } => {
            println!("{:>4} {} {}", seq.dimmed(), "says ".cyan(), text.bold());
        }
        PipelineEvent::NoteAppended { note, .. } => {
            println!("     {} {}", "note ".yellow(), note.text.italic());
        }
    }
}

/// Print the final session summary from a state snapshot
pub(crate) fn print_summary(state: &PipelineState) {
    if state.transcripts.is_empty() {
        return;
    }
    println!();
    println!("{}", "Transcript:".bold());
    println!("{}", state.transcript_text());
    println!("{}", "Translation:".bold());
    println!("{}", state.translation_text());
    if !state.notes.is_empty() {
        println!("{}", "Context notes:".bold());
        for note in &state.notes {
            println!("  - {}", note.text);
        }
    }
}
