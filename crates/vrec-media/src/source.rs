//! Lazy frame sources.
//!
//! [`VideoFrameSource::open`] probes an in-memory container and starts an
//! FFmpeg decoder that emits sampled raw frames on stdout. The returned
//! [`DecodedFrameStream`] owns the decoder and its stdin feeder and tears
//! both down on exhaustion, on [`FrameStream::close`], and on drop.

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vrec_models::SamplingPolicy;

use crate::command::DecodeCommand;
use crate::error::{MediaError, MediaResult};
use crate::feed::{settle_feeder, spawn_feeder};
use crate::frame::{frame_len, Frame};
use crate::probe::{find_ffprobe, probe_bytes, VideoInfo};

/// Bytes of decoder stderr kept for error reports.
const STDERR_TAIL: usize = 4096;

/// A finite, non-restartable sequence of frames.
#[async_trait]
pub trait FrameStream: Send {
    /// Next frame, or `None` once the sequence is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>>;

    /// Stop producing frames and release any resources.
    async fn close(&mut self) -> MediaResult<()> {
        Ok(())
    }
}

/// Opens decoded frame streams over in-memory video.
#[derive(Debug, Clone)]
pub struct VideoFrameSource {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl VideoFrameSource {
    /// Locate FFmpeg and FFprobe on `PATH`.
    pub fn new() -> MediaResult<Self> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
        let ffprobe = find_ffprobe()?;
        Ok(Self { ffmpeg, ffprobe })
    }

    /// Use explicit binaries without checking that they exist.
    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Probe `video` and start decoding it under `sampling`.
    pub async fn open(
        &self,
        video: Arc<[u8]>,
        sampling: SamplingPolicy,
    ) -> MediaResult<DecodedFrameStream> {
        let info = probe_bytes(&self.ffprobe, Arc::clone(&video)).await?;

        let args = DecodeCommand::new(sampling).build_args();
        debug!("Running: ffmpeg {}", args.join(" "));

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdout unavailable"))?;
        let stderr = child.stderr.take().map(|s| tokio::spawn(read_tail(s)));

        let feeder = spawn_feeder(stdin, video);

        info!(
            width = info.width,
            height = info.height,
            sampling = ?sampling,
            "Started frame decoder"
        );

        Ok(DecodedFrameStream {
            info,
            child: Some(child),
            stdout,
            feeder: Some(feeder),
            stderr,
            emitted: 0,
            finished: false,
        })
    }
}

/// Frames decoded by an FFmpeg subprocess.
pub struct DecodedFrameStream {
    info: VideoInfo,
    child: Option<Child>,
    stdout: ChildStdout,
    feeder: Option<JoinHandle<io::Result<()>>>,
    stderr: Option<JoinHandle<String>>,
    emitted: u64,
    finished: bool,
}

impl DecodedFrameStream {
    /// Stream metadata from the probe.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Frames emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Reap the decoder after stdout closed and decide whether the stream
    /// ended cleanly.
    async fn finish(&mut self) -> MediaResult<()> {
        self.finished = true;

        let status = match self.child.take() {
            Some(mut child) => child.wait().await?,
            None => return Ok(()),
        };
        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        let fed = match self.feeder.take() {
            Some(feeder) => settle_feeder(feeder.await, status.success()),
            None => Ok(()),
        };

        // The decoder's own exit status explains a failure better than the
        // pipe it left behind.
        self.check_exit(status, stderr).and(fed)
    }

    fn check_exit(&self, status: ExitStatus, stderr: String) -> MediaResult<()> {
        if status.success() {
            debug!(frames = self.emitted, "Frame decoder finished");
            return Ok(());
        }
        if self.emitted == 0 {
            return Err(MediaError::decode_failed(
                "decoder exited before producing a frame",
                Some(stderr),
                status.code(),
            ));
        }
        warn!(
            frames = self.emitted,
            exit_code = ?status.code(),
            stderr = %stderr,
            "Frame decoder exited with an error after producing frames"
        );
        Ok(())
    }

    fn terminate(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        if let Some(stderr) = self.stderr.take() {
            stderr.abort();
        }
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

#[async_trait]
impl FrameStream for DecodedFrameStream {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }

        let len = frame_len(self.info.width, self.info.height);
        let mut buf = vec![0u8; len];
        let filled = read_full(&mut self.stdout, &mut buf).await?;

        if filled < len {
            if filled > 0 {
                warn!(
                    expected = len,
                    received = filled,
                    "Discarding truncated trailing frame"
                );
            }
            self.finish().await?;
            return Ok(None);
        }

        let frame = Frame::from_rgb(self.emitted, self.info.width, self.info.height, buf)?;
        self.emitted += 1;
        Ok(Some(frame))
    }

    async fn close(&mut self) -> MediaResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.terminate();
        if let Some(mut child) = self.child.take() {
            child.wait().await?;
        }
        debug!(frames = self.emitted, "Frame decoder closed early");
        Ok(())
    }
}

impl Drop for DecodedFrameStream {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Frames already held in memory.
#[derive(Debug, Default)]
pub struct VecFrameStream {
    frames: VecDeque<Frame>,
}

impl VecFrameStream {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl FrameStream for VecFrameStream {
    async fn next_frame(&mut self) -> MediaResult<Option<Frame>> {
        Ok(self.frames.pop_front())
    }

    async fn close(&mut self) -> MediaResult<()> {
        self.frames.clear();
        Ok(())
    }
}

/// Read until `buf` is full or the reader hits EOF; returns bytes read.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn read_tail<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut out = Vec::new();
    let _ = reader.read_to_end(&mut out).await;
    let start = out.len().saturating_sub(STDERR_TAIL);
    String::from_utf8_lossy(&out[start..]).to_string()
}
