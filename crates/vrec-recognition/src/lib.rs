//! Frame-parallel recognition pipeline.
//!
//! This crate provides:
//! - Fuzzy similarity scoring behind a trait
//! - Per-frame classification against a rule set
//! - A bounded fan-out/fan-in dispatcher over a frame stream
//! - Deadline and cancellation guards for every blocking point
//! - A facade that runs the whole pipeline over in-memory video

pub mod classifier;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod recognizer;
pub mod similarity;

pub use classifier::{ClassifierConfig, FrameClassifier, RuleMatcher, TextBlocks};
pub use dispatcher::{DispatchStats, RecognitionDispatcher};
pub use error::{PipelineResult, RecognitionError};
pub use guard::CancelGuard;
pub use recognizer::{RecognitionOutcome, Recognizer, VideoRecognizer};
pub use similarity::{PartialRatio, SimilarityScorer};
