//! OCR output types.

use serde::{Deserialize, Serialize};

/// Pixel rectangle of a recognised word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// A single recognised word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    /// 0-100; negative when the engine reports no confidence.
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// Layout block the word belongs to.
    pub block: u32,
}

impl OcrWord {
    pub fn new(text: impl Into<String>, confidence: f32, top: u32, block: u32) -> Self {
        Self {
            text: text.into(),
            confidence,
            bbox: BoundingBox {
                top,
                ..Default::default()
            },
            block,
        }
    }

    pub fn top(&self) -> u32 {
        self.bbox.top
    }
}
