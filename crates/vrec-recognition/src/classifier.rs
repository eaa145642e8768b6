//! Single-frame classification.
//!
//! A frame is preprocessed, run through OCR, regrouped into text blocks
//! split between the URL band at the top of the screen and the page body,
//! and then matched against the rule set.

use std::sync::Arc;

use tracing::trace;

use vrec_media::{preprocess, Frame};
use vrec_models::settings::{
    DEFAULT_MIN_WORD_CONFIDENCE, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_URL_BAND_MAX_Y,
};
use vrec_models::{PreprocessOptions, RecognitionResult, RecognitionSettings, RuleSet};
use vrec_ocr::{OcrEngine, OcrWord};

use crate::error::{PipelineResult, RecognitionError};
use crate::similarity::SimilarityScorer;

/// Slack allowed when a block is shorter than the key it is compared with.
const LENGTH_SLACK: usize = 5;

/// Per-job classification parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    pub preprocess: PreprocessOptions,
    pub similarity_threshold: u8,
    /// Zero disables the URL band.
    pub url_band_max_y: u32,
    pub min_word_confidence: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessOptions::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            url_band_max_y: DEFAULT_URL_BAND_MAX_Y,
            min_word_confidence: DEFAULT_MIN_WORD_CONFIDENCE,
        }
    }
}

impl ClassifierConfig {
    pub fn from_settings(settings: &RecognitionSettings) -> Self {
        Self {
            preprocess: settings.preprocess_options(),
            similarity_threshold: settings.similarity_threshold(),
            url_band_max_y: settings.url_band_max_y(),
            min_word_confidence: settings.min_word_confidence(),
        }
    }
}

/// Recognised text grouped into blocks, split by screen band.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBlocks {
    pub url: Vec<String>,
    pub page: Vec<String>,
    url_band: bool,
}

impl TextBlocks {
    /// Group words by block id, in first-seen order, and join each group
    /// with single spaces. Words at or above `url_band_max_y` go to the URL
    /// band; low-confidence words and blank blocks are dropped.
    pub fn from_words(words: &[OcrWord], url_band_max_y: u32, min_confidence: f32) -> Self {
        let url_band = url_band_max_y > 0;
        let mut url: Vec<(u32, Vec<&str>)> = Vec::new();
        let mut page: Vec<(u32, Vec<&str>)> = Vec::new();

        for word in words.iter().filter(|w| w.confidence >= min_confidence) {
            let band = if url_band && word.top() <= url_band_max_y {
                &mut url
            } else {
                &mut page
            };
            match band.iter_mut().find(|(block, _)| *block == word.block) {
                Some((_, group)) => group.push(&word.text),
                None => band.push((word.block, vec![&word.text])),
            }
        }

        Self {
            url: join_blocks(url),
            page: join_blocks(page),
            url_band,
        }
    }

    /// Blocks URL keys are checked against: the URL band, or the page when
    /// the band is disabled.
    pub fn url_candidates(&self) -> &[String] {
        if self.url_band {
            &self.url
        } else {
            &self.page
        }
    }
}

fn join_blocks(groups: Vec<(u32, Vec<&str>)>) -> Vec<String> {
    groups
        .into_iter()
        .map(|(_, words)| words.join(" "))
        .filter(|block| !block.trim().is_empty())
        .collect()
}

/// Applies the match rule for one key against one block.
pub struct RuleMatcher<'a> {
    scorer: &'a dyn SimilarityScorer,
    threshold: u8,
}

impl<'a> RuleMatcher<'a> {
    pub fn new(scorer: &'a dyn SimilarityScorer, threshold: u8) -> Self {
        Self { scorer, threshold }
    }

    /// `key` matches `block` when the block is not much shorter than the key
    /// and either contains it (ignoring case) or scores at least the
    /// threshold. The scorer is only consulted after the length check.
    pub fn matches(&self, key: &str, block: &str) -> bool {
        if block.chars().count() + LENGTH_SLACK < key.chars().count() {
            return false;
        }
        if block.to_lowercase().contains(&key.to_lowercase()) {
            return true;
        }
        self.scorer.score(key, block) >= self.threshold
    }

    /// Evaluate every rule of `rules` against `blocks`.
    pub fn evaluate(&self, blocks: &TextBlocks, rules: &RuleSet) -> RecognitionResult {
        let mut result = RecognitionResult::empty_for(rules);

        for key in &rules.text_contains {
            if !result.is_text_marked(key) && blocks.page.iter().any(|b| self.matches(key, b)) {
                result.mark_text(key);
            }
        }

        for key in &rules.url_contains {
            if !result.is_url_marked(key)
                && blocks.url_candidates().iter().any(|b| self.matches(key, b))
            {
                result.mark_url(key);
            }
        }

        for phrase in &rules.search_phrases {
            for block in &blocks.page {
                if !result.found_phrases.contains(block) && self.matches(phrase, block) {
                    result.insert_phrase(block.clone());
                }
            }
        }

        result
    }
}

/// Classifies one frame at a time; cheap to clone into worker tasks.
#[derive(Clone)]
pub struct FrameClassifier {
    ocr: Arc<dyn OcrEngine>,
    scorer: Arc<dyn SimilarityScorer>,
    config: ClassifierConfig,
}

impl FrameClassifier {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        scorer: Arc<dyn SimilarityScorer>,
        config: ClassifierConfig,
    ) -> Self {
        Self {
            ocr,
            scorer,
            config,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify `frame` against `rules`, consuming the frame.
    pub async fn classify(&self, frame: Frame, rules: &RuleSet) -> PipelineResult<RecognitionResult> {
        if rules.is_empty() {
            return Ok(RecognitionResult::empty_for(rules));
        }

        let index = frame.index;
        let options = self.config.preprocess;
        let plane = tokio::task::spawn_blocking(move || preprocess(&frame, &options))
            .await
            .map_err(|e| RecognitionError::worker_failure(index, e.to_string()))??;

        let words = self.ocr.recognize(plane).await?;
        let blocks = TextBlocks::from_words(
            &words,
            self.config.url_band_max_y,
            self.config.min_word_confidence,
        );
        trace!(
            frame = index,
            words = words.len(),
            url_blocks = blocks.url.len(),
            page_blocks = blocks.page.len(),
            "Frame recognised"
        );

        Ok(RuleMatcher::new(self.scorer.as_ref(), self.config.similarity_threshold)
            .evaluate(&blocks, rules))
    }
}
