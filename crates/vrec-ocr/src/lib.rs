//! OCR for preprocessed frames.
//!
//! The recognition pipeline only depends on the [`OcrEngine`] trait; the
//! bundled backend shells out to the `tesseract` CLI and parses its TSV
//! report into positioned words.

pub mod engine;
pub mod error;
pub mod tesseract;
pub mod types;

pub use engine::OcrEngine;
pub use error::{OcrError, OcrResult};
pub use tesseract::{TesseractConfig, TesseractEngine};
pub use types::{BoundingBox, OcrWord};
