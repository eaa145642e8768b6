//! Stdin feeders for subprocesses that read a container from a pipe.

use std::io;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Stream `data` into `stdin` on a separate task, closing the pipe when done.
pub fn spawn_feeder(mut stdin: ChildStdin, data: Arc<[u8]>) -> JoinHandle<io::Result<()>> {
    tokio::spawn(async move {
        stdin.write_all(&data).await?;
        stdin.shutdown().await?;
        Ok(())
    })
}

/// Reconcile a feeder's outcome with the exit status of the process it fed.
///
/// A broken pipe only means the reader stopped early (ffprobe stops after
/// the header, ffmpeg may stop after the last selected frame); it is an
/// error only when the reader itself failed.
pub fn settle_feeder(
    outcome: Result<io::Result<()>, JoinError>,
    reader_succeeded: bool,
) -> MediaResult<()> {
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe && reader_succeeded => {
            debug!("Reader closed stdin early; ignoring broken pipe");
            Ok(())
        }
        Ok(Err(e)) => Err(MediaError::decode_failed(
            format!("failed to stream video into decoder: {}", e),
            None,
            None,
        )),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(MediaError::internal(format!("feeder task panicked: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broken_pipe_swallowed_only_on_clean_exit() {
        let broken = || Ok(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(settle_feeder(broken(), true).is_ok());

        let err = settle_feeder(broken(), false).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_other_write_errors_surface() {
        let denied = Ok(Err(io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(settle_feeder(denied, true).is_err());
        assert!(settle_feeder(Ok(Ok(())), false).is_ok());
    }
}
