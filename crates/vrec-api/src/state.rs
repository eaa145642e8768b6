//! Application state.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use vrec_media::VideoFrameSource;
use vrec_ocr::TesseractEngine;
use vrec_recognition::{Recognizer, VideoRecognizer};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub recognizer: Arc<dyn VideoRecognizer>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    /// Locate ffmpeg and tesseract and build the recognizer.
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let source = VideoFrameSource::new().context("locating ffmpeg")?;
        let ocr = TesseractEngine::from_env().context("locating tesseract")?;
        let recognizer = Recognizer::new(source, Arc::new(ocr))
            .with_default_concurrency(config.recognition_concurrency);
        Ok(Self::with_recognizer(config, Arc::new(recognizer)))
    }

    pub fn with_recognizer(config: ApiConfig, recognizer: Arc<dyn VideoRecognizer>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            recognizer,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Signal fired when the server starts shutting down.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Cancel in-flight recognitions.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
