//! Request-level recognition settings.
//!
//! Every field is optional. Unknown keys are ignored, and the snake_case
//! names used by older clients are accepted as aliases.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default fuzzy-match threshold (0-100).
pub const DEFAULT_SIMILARITY_THRESHOLD: u8 = 80;

/// Default bottom edge, in pixels, of the URL band.
pub const DEFAULT_URL_BAND_MAX_Y: u32 = 80;

/// Default minimum OCR word confidence.
pub const DEFAULT_MIN_WORD_CONFIDENCE: f32 = 0.0;

/// Default sampling cadence when no policy is requested.
pub const DEFAULT_FRAMES_PER_SECOND: f64 = 1.0;

/// Recognition tuning sent with a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct RecognitionSettings {
    /// Emit every Nth decoded frame.
    #[serde(alias = "skip_frames", skip_serializing_if = "Option::is_none")]
    pub skip_frames: Option<u32>,

    /// Emit frames at a fixed rate.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(alias = "frames_per_second", skip_serializing_if = "Option::is_none")]
    pub frames_per_second: Option<f64>,

    /// Emit one frame every N seconds.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(alias = "seconds_between_frames", skip_serializing_if = "Option::is_none")]
    pub seconds_between_frames: Option<f64>,

    #[serde(alias = "use_gray_colors")]
    pub use_gray_colors: bool,

    #[serde(alias = "invert_colors")]
    pub invert_colors: bool,

    #[serde(alias = "use_morphology")]
    pub use_morphology: bool,

    #[serde(alias = "use_threshold_with_gausian_blur")]
    pub use_threshold_with_blur: bool,

    #[serde(alias = "use_adaptiveThreshold")]
    pub use_adaptive_threshold: bool,

    #[serde(alias = "increase_image_contrast")]
    pub increase_contrast: bool,

    #[validate(range(min = 0, max = 100))]
    #[serde(alias = "comparing_similarity_for_phrases", skip_serializing_if = "Option::is_none")]
    pub comparing_similarity_for_phrases: Option<i32>,

    /// Classification workers per job; defaults to the host core count.
    #[validate(range(min = 1, max = 256))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Words whose top edge is at or above this line belong to the URL band.
    /// Zero disables the band.
    #[serde(
        rename = "maxYForURLBand",
        alias = "maxYForUrlBand",
        alias = "max_y_position_for_URL",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_y_for_url_band: Option<u32>,

    #[serde(alias = "min_word_confidence", skip_serializing_if = "Option::is_none")]
    pub min_word_confidence: Option<f32>,
}

impl RecognitionSettings {
    /// Sampling policy, preferring an explicit rate over a frame step.
    pub fn sampling_policy(&self) -> SamplingPolicy {
        if let Some(fps) = self.frames_per_second.filter(|f| *f > 0.0) {
            return SamplingPolicy::Rate(fps);
        }
        if let Some(secs) = self.seconds_between_frames.filter(|s| *s > 0.0) {
            return SamplingPolicy::Rate(1.0 / secs);
        }
        if let Some(step) = self.skip_frames {
            return SamplingPolicy::FrameStep(step.max(1));
        }
        SamplingPolicy::default()
    }

    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            grayscale: self.use_gray_colors,
            adaptive_threshold: self.use_adaptive_threshold,
            blur_threshold: self.use_threshold_with_blur,
            morphology: self.use_morphology,
            contrast: self.increase_contrast,
            invert: self.invert_colors,
        }
    }

    pub fn similarity_threshold(&self) -> u8 {
        self.comparing_similarity_for_phrases
            .map(|v| v.clamp(0, 100) as u8)
            .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD)
    }

    pub fn url_band_max_y(&self) -> u32 {
        self.max_y_for_url_band.unwrap_or(DEFAULT_URL_BAND_MAX_Y)
    }

    pub fn min_word_confidence(&self) -> f32 {
        self.min_word_confidence.unwrap_or(DEFAULT_MIN_WORD_CONFIDENCE)
    }
}

/// Which decoded frames are handed to classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Every Nth input frame.
    FrameStep(u32),
    /// A fixed number of frames per second of video.
    Rate(f64),
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        SamplingPolicy::Rate(DEFAULT_FRAMES_PER_SECOND)
    }
}

/// Image preprocessing stages, applied in declaration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PreprocessOptions {
    /// Luma conversion instead of first-channel extraction.
    pub grayscale: bool,
    pub adaptive_threshold: bool,
    /// Gaussian blur followed by an inverse Otsu threshold.
    pub blur_threshold: bool,
    /// 3x3 morphological open.
    pub morphology: bool,
    pub contrast: bool,
    pub invert: bool,
}
