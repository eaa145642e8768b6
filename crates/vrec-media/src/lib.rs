//! FFmpeg CLI frame source and OCR preprocessing.
//!
//! This crate provides:
//! - Metadata probing of in-memory video via `ffprobe`
//! - Streaming, sampled raw-frame decode via `ffmpeg`
//! - Raster preprocessing stages applied before OCR

pub mod command;
pub mod error;
pub mod feed;
pub mod frame;
pub mod preprocess;
pub mod probe;
pub mod source;

#[cfg(all(test, unix))]
mod testing;

pub use command::DecodeCommand;
pub use error::{MediaError, MediaResult};
pub use frame::Frame;
pub use preprocess::preprocess;
pub use probe::{find_ffprobe, probe_bytes, VideoInfo};
pub use source::{DecodedFrameStream, FrameStream, VecFrameStream, VideoFrameSource};
