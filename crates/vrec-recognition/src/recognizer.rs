//! Whole-pipeline facade: video bytes in, merged result out.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use vrec_media::{preprocess, FrameStream, VideoFrameSource};
use vrec_models::{RecognitionResult, RecognitionSettings, RuleSet};
use vrec_ocr::OcrEngine;

use crate::classifier::{ClassifierConfig, FrameClassifier};
use crate::dispatcher::{DispatchStats, RecognitionDispatcher};
use crate::error::PipelineResult;
use crate::guard::CancelGuard;
use crate::metrics::record_recognition;
use crate::similarity::{PartialRatio, SimilarityScorer};

/// Merged result of a pipeline run plus its counters.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionOutcome {
    /// Phrases and flags merged across every frame.
    pub result: RecognitionResult,
    pub stats: DispatchStats,
}

/// Runs recognition over a whole video.
#[async_trait]
pub trait VideoRecognizer: Send + Sync {
    /// Recognise `video` against `rules`, stopping when `guard` fires.
    async fn recognize(
        &self,
        video: Arc<[u8]>,
        rules: &RuleSet,
        settings: &RecognitionSettings,
        guard: CancelGuard,
    ) -> PipelineResult<RecognitionOutcome>;
}

/// Shared recognition services; one per process.
#[derive(Clone)]
pub struct Recognizer {
    source: VideoFrameSource,
    ocr: Arc<dyn OcrEngine>,
    scorer: Arc<dyn SimilarityScorer>,
    default_concurrency: Option<usize>,
}

impl Recognizer {
    /// Scores phrases with [`PartialRatio`] and sizes rounds to the core
    /// count unless overridden.
    pub fn new(source: VideoFrameSource, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            source,
            ocr,
            scorer: Arc::new(PartialRatio),
            default_concurrency: None,
        }
    }

    /// Swap the phrase matcher.
    pub fn with_scorer(mut self, scorer: Arc<dyn SimilarityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Concurrency used when a request does not set one.
    pub fn with_default_concurrency(mut self, concurrency: Option<usize>) -> Self {
        self.default_concurrency = concurrency;
        self
    }

    fn dispatcher(&self, settings: &RecognitionSettings) -> RecognitionDispatcher {
        let classifier = FrameClassifier::new(
            Arc::clone(&self.ocr),
            Arc::clone(&self.scorer),
            ClassifierConfig::from_settings(settings),
        );
        RecognitionDispatcher::new(classifier, settings.concurrency.or(self.default_concurrency))
    }

    /// Decode `video`, classify its sampled frames and merge the results.
    ///
    /// The decoder is closed on every exit path; if the guard fires, the
    /// stream is dropped mid-read and its subprocess killed.
    pub async fn recognize_video(
        &self,
        video: Arc<[u8]>,
        rules: &RuleSet,
        settings: &RecognitionSettings,
        mut guard: CancelGuard,
    ) -> PipelineResult<RecognitionOutcome> {
        let started = Instant::now();
        preprocess::ensure_supported(&settings.preprocess_options())?;
        let mut stream = guard
            .run(self.source.open(video, settings.sampling_policy()))
            .await??;

        let outcome = self
            .recognize_stream(&mut stream, rules, settings, &mut guard)
            .await;

        if let Err(e) = stream.close().await {
            warn!(error = %e, "Failed to close frame decoder");
        }

        let label = match &outcome {
            Ok(_) => "ok",
            Err(e) if e.is_timeout() => "timeout",
            Err(_) => "error",
        };
        record_recognition(label, started.elapsed().as_secs_f64());
        outcome
    }

    /// Classify an already-open stream.
    pub async fn recognize_stream(
        &self,
        stream: &mut dyn FrameStream,
        rules: &RuleSet,
        settings: &RecognitionSettings,
        guard: &mut CancelGuard,
    ) -> PipelineResult<RecognitionOutcome> {
        let dispatcher = self.dispatcher(settings);
        let (result, stats) = dispatcher
            .run(stream, Arc::new(rules.clone()), guard)
            .await?;

        info!(
            frames = stats.frames,
            rounds = stats.rounds,
            failed_frames = stats.failed_frames,
            phrases = result.found_phrases.len(),
            concurrency = dispatcher.concurrency(),
            "Recognition finished"
        );
        Ok(RecognitionOutcome { result, stats })
    }
}

#[async_trait]
impl VideoRecognizer for Recognizer {
    async fn recognize(
        &self,
        video: Arc<[u8]>,
        rules: &RuleSet,
        settings: &RecognitionSettings,
        guard: CancelGuard,
    ) -> PipelineResult<RecognitionOutcome> {
        self.recognize_video(video, rules, settings, guard).await
    }
}
