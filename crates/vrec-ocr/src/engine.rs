//! OCR engine abstraction.

use async_trait::async_trait;
use image::GrayImage;

use crate::error::OcrResult;
use crate::types::OcrWord;

/// Turns a single-channel image into positioned words.
///
/// Implementations must be safe to call from many tasks at once; each call
/// is independent.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognise words in `image`, in reading order.
    async fn recognize(&self, image: GrayImage) -> OcrResult<Vec<OcrWord>>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "ocr"
    }
}
