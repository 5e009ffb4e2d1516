//! Pipeline orchestrator
//!
//! Turns committed transcript fragments into translations and context notes.
//! A single worker task consumes fragments from a queue and runs each one
//! through translate then annotate, strictly in order, so the translation
//! sequence stays positionally aligned with the transcript prefix it belongs
//! to. Service failures are logged and only skip the affected fragment's
//! remaining stages.

mod state;

pub(crate) use state::PipelineState;

use crate::annotate::{Annotate, ContextNote};
use crate::languages::LanguagePair;
use crate::llm::LlmError;
use crate::translate::Translate;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One committed transcript fragment, numbered by arrival order
#[derive(Debug, Clone)]
pub(crate) struct Fragment {
    pub seq: u64,
    pub text: String,
}

/// Pipeline event for observers (the presentation layer)
#[derive(Debug, Clone)]
pub(crate) enum PipelineEvent {
    /// A transcript fragment was appended
    TranscriptAppended { seq: u64, text: String },
    /// A translation was appended for the given fragment
    TranslationAppended { seq: u64, text: String },
    /// A context note was appended for the given fragment
    NoteAppended { seq: u64, note: ContextNote },
}

/// The transcript-to-translation-to-context pipeline
///
/// Service clients are injected at construction so tests can substitute
/// mocks for the network-backed implementations.
pub(crate) struct Pipeline {
    languages: LanguagePair,
    translator: Arc<dyn Translate>,
    annotator: Arc<dyn Annotate>,
    state: Arc<Mutex<PipelineState>>,
    event_tx: broadcast::Sender<PipelineEvent>,
}

impl Pipeline {
    /// Create a pipeline for a validated language pair
    pub(crate) fn new(
        languages: LanguagePair,
        translator: Arc<dyn Translate>,
        annotator: Arc<dyn Annotate>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            languages,
            translator,
            annotator,
            state: Arc::new(Mutex::new(PipelineState::default())),
            event_tx,
        }
    }

    /// Subscribe to pipeline events
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the current state
    ///
    /// Returns the state or a recovered copy if the mutex is poisoned.
    pub(crate) fn state(&self) -> PipelineState {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => {
                warn!("Pipeline state mutex was poisoned, recovering data");
                poisoned.into_inner().clone()
            }
        }
    }

    /// The language pair this pipeline translates between
    pub(crate) fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    /// Spawn the worker that drains the fragment queue
    ///
    /// Fragments are processed one at a time to completion. Aborting the
    /// returned handle (on session stop) guarantees no late-arriving results
    /// are appended afterwards.
    pub(crate) fn spawn_worker(
        self: Arc<Self>,
        mut fragment_rx: mpsc::Receiver<Fragment>,
    ) -> JoinHandle<()> {
        let pipeline = self;
        tokio::spawn(async move {
            while let Some(fragment) = fragment_rx.recv().await {
                pipeline.process_fragment(fragment).await;
            }
            debug!("Pipeline worker: fragment channel closed");
        })
    }

    /// Run one fragment through the full pipeline
    #[tracing::instrument(skip(self, fragment), fields(seq = fragment.seq))]
    pub(crate) async fn process_fragment(&self, fragment: Fragment) {
        let Fragment { seq, text } = fragment;
        if text.trim().is_empty() {
            debug!("Discarding empty fragment");
            return;
        }

        self.append_transcript(seq, &text);

        let translated = match self
            .translator
            .translate(&self.languages.source, &self.languages.target, &text)
            .await
        {
            Ok(translated) => translated,
            Err(e) => {
                log_service_failure("Translation", seq, &e);
                return;
            }
        };
        self.append_translation(seq, &translated);

        match self
            .annotator
            .annotate(&translated, &self.languages.target)
            .await
        {
            Ok(Some(note)) => self.append_note(seq, note),
            Ok(None) => debug!("No context note for fragment"),
            Err(e) => log_service_failure("Annotation", seq, &e),
        }
    }

    fn append_transcript(&self, seq: u64, text: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.transcripts.push(text.to_string());
        }
        let _ = self.event_tx.send(PipelineEvent::TranscriptAppended {
            seq,
            text: text.to_string(),
        });
    }

    fn append_translation(&self, seq: u64, text: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.translations.push(text.to_string());
        }
        let _ = self.event_tx.send(PipelineEvent::TranslationAppended {
            seq,
            text: text.to_string(),
        });
    }

    fn append_note(&self, seq: u64, note: ContextNote) {
        if let Ok(mut state) = self.state.lock() {
            state.notes.push(note.clone());
        }
        let _ = self.event_tx.send(PipelineEvent::NoteAppended { seq, note });
    }
}

/// Log a failed service call; the fragment's remaining stages are skipped
fn log_service_failure(stage: &str, seq: u64, error: &LlmError) {
    warn!("{} failed for fragment #{}: {}", stage, seq, error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedTranslator(&'static str);

    #[async_trait]
    impl Translate for FixedTranslator {
        async fn translate(&self, _: &str, _: &str, _: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    struct EchoTranslator;

    #[async_trait]
    impl Translate for EchoTranslator {
        async fn translate(&self, _: &str, _: &str, text: &str) -> Result<String, LlmError> {
            Ok(format!("<{}>", text))
        }
    }

    struct FailingTranslator;

    #[async_trait]
    impl Translate for FailingTranslator {
        async fn translate(&self, _: &str, _: &str, _: &str) -> Result<String, LlmError> {
            Err(LlmError::ServerError {
                status: 500,
                message: "boom".to_string(),
            })
        }
    }

    /// Annotator that answers with the sentinel and counts invocations
    struct SentinelAnnotator {
        calls: AtomicUsize,
    }

    impl SentinelAnnotator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Annotate for SentinelAnnotator {
        async fn annotate(&self, _: &str, _: &str) -> Result<Option<ContextNote>, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    struct FixedAnnotator(&'static str);

    #[async_trait]
    impl Annotate for FixedAnnotator {
        async fn annotate(&self, _: &str, _: &str) -> Result<Option<ContextNote>, LlmError> {
            Ok(Some(ContextNote {
                text: self.0.to_string(),
                image_url: None,
            }))
        }
    }

    fn pair() -> LanguagePair {
        LanguagePair::new("en-US", "zh").unwrap()
    }

    fn fragment(seq: u64, text: &str) -> Fragment {
        Fragment {
            seq,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_with_sentinel_annotation() {
        let pipeline = Pipeline::new(
            pair(),
            Arc::new(FixedTranslator("你好世界")),
            SentinelAnnotator::new(),
        );

        pipeline.process_fragment(fragment(1, "Hello world")).await;

        let state = pipeline.state();
        assert_eq!(state.transcripts, vec!["Hello world"]);
        assert_eq!(state.translations, vec!["你好世界"]);
        assert!(state.notes.is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_with_annotation() {
        let pipeline = Pipeline::new(
            pair(),
            Arc::new(FixedTranslator("你好世界")),
            Arc::new(FixedAnnotator("This refers to a common greeting.")),
        );

        pipeline.process_fragment(fragment(1, "Hello world")).await;

        let state = pipeline.state();
        assert_eq!(state.transcripts, vec!["Hello world"]);
        assert_eq!(state.translations, vec!["你好世界"]);
        assert_eq!(state.notes.len(), 1);
        assert_eq!(state.notes[0].text, "This refers to a common greeting.");
    }

    #[tokio::test]
    async fn test_translation_failure_skips_annotation() {
        let annotator = SentinelAnnotator::new();
        let pipeline = Pipeline::new(pair(), Arc::new(FailingTranslator), annotator.clone());

        pipeline.process_fragment(fragment(1, "Hello world")).await;

        let state = pipeline.state();
        assert_eq!(state.transcripts, vec!["Hello world"]);
        assert!(state.translations.is_empty());
        assert!(state.notes.is_empty());
        assert_eq!(annotator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_fragment_discarded() {
        let pipeline = Pipeline::new(
            pair(),
            Arc::new(FixedTranslator("ignored")),
            SentinelAnnotator::new(),
        );

        pipeline.process_fragment(fragment(1, "   ")).await;

        let state = pipeline.state();
        assert!(state.transcripts.is_empty());
        assert!(state.translations.is_empty());
    }

    #[tokio::test]
    async fn test_identical_fragments_are_not_deduplicated() {
        let pipeline = Pipeline::new(
            pair(),
            Arc::new(FixedTranslator("你好")),
            SentinelAnnotator::new(),
        );

        pipeline.process_fragment(fragment(1, "hello")).await;
        pipeline.process_fragment(fragment(2, "hello")).await;

        let state = pipeline.state();
        assert_eq!(state.transcripts, vec!["hello", "hello"]);
        assert_eq!(state.translations, vec!["你好", "你好"]);
    }

    #[tokio::test]
    async fn test_worker_preserves_fragment_order() {
        let pipeline = Arc::new(Pipeline::new(
            pair(),
            Arc::new(EchoTranslator),
            SentinelAnnotator::new(),
        ));

        let (tx, rx) = mpsc::channel(8);
        let worker = pipeline.clone().spawn_worker(rx);

        for (seq, text) in [(1, "one"), (2, "two"), (3, "three")] {
            tx.send(fragment(seq, text)).await.unwrap();
        }
        drop(tx);
        worker.await.unwrap();

        let state = pipeline.state();
        assert_eq!(state.transcripts, vec!["one", "two", "three"]);
        assert_eq!(state.translations, vec!["<one>", "<two>", "<three>"]);
        assert_eq!(state.transcript_text(), "one two three");
    }

    #[tokio::test]
    async fn test_events_published_in_stage_order() {
        let pipeline = Pipeline::new(
            pair(),
            Arc::new(FixedTranslator("你好世界")),
            Arc::new(FixedAnnotator("A greeting.")),
        );
        let mut rx = pipeline.subscribe();

        pipeline.process_fragment(fragment(7, "Hello world")).await;

        assert!(matches!(
            rx.try_recv().unwrap(),
            PipelineEvent::TranscriptAppended { seq: 7, .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            PipelineEvent::TranslationAppended { seq: 7, .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            PipelineEvent::NoteAppended { seq: 7, .. }
        ));
    }
}
