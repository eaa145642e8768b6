//! FFprobe metadata for in-memory video.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::feed::{settle_feeder, spawn_feeder};

/// Video stream information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps), when the container declares one
    pub fps: Option<f64>,
    /// Video codec
    pub codec: String,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Locate FFprobe on `PATH`.
pub fn find_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

/// Probe a video held in memory, streaming it into `ffprobe`'s stdin.
pub async fn probe_bytes(ffprobe: &Path, video: Arc<[u8]>) -> MediaResult<VideoInfo> {
    if video.is_empty() {
        return Err(MediaError::InvalidVideo("empty video body".to_string()));
    }

    let mut child = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-select_streams",
            "v:0",
            "-i",
            "pipe:0",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| MediaError::internal("ffprobe stdin unavailable"))?;
    let feeder = spawn_feeder(stdin, video);

    let output = child.wait_with_output().await?;
    settle_feeder(feeder.await, output.status.success())?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe exited with {}", output.status),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let info = parse_probe_output(&output.stdout)?;
    debug!(
        width = info.width,
        height = info.height,
        codec = %info.codec,
        "Probed video stream"
    );
    Ok(info)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref().unwrap_or("video") == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(MediaError::InvalidVideo(format!(
            "video stream has no dimensions ({}x{})",
            width, height
        )));
    }

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate));

    Ok(VideoInfo {
        width,
        height,
        fps,
        codec: stream.codec_name.clone().unwrap_or_default(),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.parse().ok()?
    };
    (rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    use crate::testing::{fake_ffprobe, FakeTools};

    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("garbage"), None);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{"streams": [{"codec_type": "video", "codec_name": "h264",
            "width": 1280, "height": 720, "avg_frame_rate": "30/1"}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert_eq!(info.fps, Some(30.0));
        assert_eq!(info.codec, "h264");
    }

    #[test]
    fn test_missing_stream_is_decode_error() {
        let err = parse_probe_output(br#"{"streams": []}"#).unwrap_err();
        assert!(err.is_decode_error());

        let err = parse_probe_output(br#"{"streams": [{"codec_type": "video", "width": 0}]}"#)
            .unwrap_err();
        assert!(err.is_decode_error());
    }

    #[tokio::test]
    async fn test_empty_body_rejected_without_spawning() {
        let err = probe_bytes(Path::new("/nonexistent/ffprobe"), Arc::from(Vec::<u8>::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_reads_stream_from_tool_output() {
        let tools = FakeTools::new();
        let ffprobe = tools.script("ffprobe", &fake_ffprobe(4, 2));

        let info = probe_bytes(&ffprobe, Arc::from(&b"video"[..])).await.unwrap();
        assert_eq!((info.width, info.height), (4, 2));
        assert_eq!(info.fps, Some(1.0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_failure_is_decode_error() {
        let tools = FakeTools::new();
        let ffprobe = tools.script("ffprobe", "cat > /dev/null\necho 'pipe:0: Invalid data' >&2\nexit 1");

        let err = probe_bytes(&ffprobe, Arc::from(&b"not a video"[..])).await.unwrap_err();
        assert!(err.is_decode_error());
        match err {
            MediaError::FfprobeFailed { stderr, .. } => {
                assert!(stderr.unwrap_or_default().contains("Invalid data"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
