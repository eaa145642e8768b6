//! Tesseract CLI backend.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use image::codecs::png::PngEncoder;
use image::{ColorType, GrayImage, ImageEncoder};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::engine::OcrEngine;
use crate::error::{OcrError, OcrResult};
use crate::types::{BoundingBox, OcrWord};

/// TSV level of word rows.
const WORD_LEVEL: u32 = 5;

/// Configuration for the Tesseract backend.
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Binary name or path
    pub binary: String,
    /// Language pack(s), e.g. `eng` or `eng+deu`
    pub language: String,
    /// Page segmentation mode
    pub page_segmentation_mode: u8,
    /// Per-image timeout
    pub timeout: Duration,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: "eng".to_string(),
            page_segmentation_mode: 3,
            timeout: Duration::from_secs(60),
        }
    }
}

impl TesseractConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            binary: std::env::var("TESSERACT_BIN").unwrap_or_else(|_| "tesseract".to_string()),
            language: std::env::var("TESSERACT_LANG").unwrap_or_else(|_| "eng".to_string()),
            page_segmentation_mode: std::env::var("TESSERACT_PSM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            timeout: Duration::from_secs(
                std::env::var("TESSERACT_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}

/// Runs one `tesseract` process per image, PNG in on stdin, TSV out on stdout.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    config: TesseractConfig,
}

impl TesseractEngine {
    /// Resolve the binary and create the engine.
    pub fn new(config: TesseractConfig) -> OcrResult<Self> {
        let binary = which::which(&config.binary)
            .map_err(|_| OcrError::BinaryNotFound(config.binary.clone()))?;
        Ok(Self { binary, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> OcrResult<Self> {
        Self::new(TesseractConfig::from_env())
    }

    fn build_args(&self) -> Vec<String> {
        vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.config.language.clone(),
            "--psm".to_string(),
            self.config.page_segmentation_mode.to_string(),
            "tsv".to_string(),
        ]
    }

    async fn run(&self, png: Vec<u8>) -> OcrResult<String> {
        let mut child = Command::new(&self.binary)
            .args(self.build_args())
            // One thread per process; parallelism comes from running many.
            .env("OMP_THREAD_LIMIT", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::failed("tesseract stdin unavailable", None, None))?;
        let feeder = tokio::spawn(async move {
            stdin.write_all(&png).await?;
            stdin.shutdown().await
        });

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                feeder.abort();
                warn!("tesseract timed out after {:?}", self.config.timeout);
                return Err(OcrError::Timeout(self.config.timeout.as_secs()));
            }
        };

        if let Ok(Err(e)) = feeder.await {
            debug!("tesseract closed stdin early: {}", e);
        }

        if !output.status.success() {
            return Err(OcrError::failed(
                format!("tesseract exited with {}", output.status),
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
                output.status.code(),
            ));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| OcrError::invalid_output(format!("non-UTF-8 TSV: {}", e)))
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: GrayImage) -> OcrResult<Vec<OcrWord>> {
        let png = tokio::task::spawn_blocking(move || encode_png(&image))
            .await
            .map_err(|e| OcrError::Encode(e.to_string()))??;

        let tsv = self.run(png).await?;
        let words = parse_tsv(&tsv)?;
        debug!(words = words.len(), "tesseract recognised words");
        Ok(words)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

fn encode_png(image: &GrayImage) -> OcrResult<Vec<u8>> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::L8)
        .map_err(|e| OcrError::Encode(e.to_string()))?;
    Ok(png)
}

/// Parse Tesseract's TSV report, keeping word-level rows.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num, left,
/// top, width, height, conf, text.
pub fn parse_tsv(tsv: &str) -> OcrResult<Vec<OcrWord>> {
    let mut words = Vec::new();

    for (line_no, line) in tsv.lines().enumerate() {
        if line.is_empty() || line.starts_with("level") {
            continue;
        }
        let cols: Vec<&str> = line.splitn(12, '\t').collect();
        if cols.len() < 11 {
            return Err(OcrError::invalid_output(format!(
                "line {}: expected 12 columns, got {}",
                line_no + 1,
                cols.len()
            )));
        }

        let level = parse_col::<u32>(&cols, 0, line_no)?;
        if level != WORD_LEVEL {
            continue;
        }

        words.push(OcrWord {
            text: cols.get(11).copied().unwrap_or("").to_string(),
            confidence: parse_col::<f32>(&cols, 10, line_no)?,
            bbox: BoundingBox {
                left: parse_col(&cols, 6, line_no)?,
                top: parse_col(&cols, 7, line_no)?,
                width: parse_col(&cols, 8, line_no)?,
                height: parse_col(&cols, 9, line_no)?,
            },
            block: parse_col(&cols, 2, line_no)?,
        });
    }

    Ok(words)
}

fn parse_col<T: std::str::FromStr>(cols: &[&str], idx: usize, line_no: usize) -> OcrResult<T> {
    cols[idx].trim().parse().map_err(|_| {
        OcrError::invalid_output(format!(
            "line {}: bad value {:?} in column {}",
            line_no + 1,
            cols[idx],
            idx
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t1280\t720\t-1\t
2\t1\t1\t0\t0\t0\t20\t12\t300\t30\t-1\t
5\t1\t1\t1\t1\t1\t20\t12\t120\t30\t91.5\twordpress.com
5\t1\t2\t1\t1\t1\t40\t300\t90\t28\t96\tSystem
5\t1\t2\t1\t1\t2\t140\t300\t80\t28\t95.25\tError:
5\t1\t3\t1\t1\t1\t40\t500\t10\t10\t-1\t
";

    #[test]
    fn test_parse_tsv_keeps_word_rows() {
        let words = parse_tsv(SAMPLE).unwrap();
        assert_eq!(words.len(), 4);

        assert_eq!(words[0].text, "wordpress.com");
        assert_eq!(words[0].block, 1);
        assert_eq!(words[0].top(), 12);

        assert_eq!(words[2].text, "Error:");
        assert_eq!(words[2].confidence, 95.25);
        assert_eq!(words[2].bbox.left, 140);

        assert_eq!(words[3].text, "");
        assert_eq!(words[3].confidence, -1.0);
    }

    #[test]
    fn test_parse_tsv_rejects_garbage() {
        assert!(parse_tsv("5\t1\tx").is_err());
        assert!(parse_tsv("5\t1\tx\t1\t1\t1\t0\t0\t0\t0\t90\tword").is_err());
        assert!(parse_tsv("").unwrap().is_empty());
    }

    #[test]
    fn test_png_encoding_produces_signature() {
        let png = encode_png(&GrayImage::new(4, 4)).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_missing_binary_is_reported() {
        let config = TesseractConfig {
            binary: "definitely-not-a-real-tesseract".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            TesseractEngine::new(config),
            Err(OcrError::BinaryNotFound(_))
        ));
    }
}
