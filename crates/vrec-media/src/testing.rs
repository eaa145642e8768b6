//! Fake FFmpeg/FFprobe executables for subprocess tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use tempfile::TempDir;

/// An executable still open for writing in a forked child fails to exec
/// with ETXTBSY, so script-writing tests run one at a time.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// Directory of shell scripts standing in for the real tools.
pub struct FakeTools {
    dir: TempDir,
    _serial: MutexGuard<'static, ()>,
}

impl FakeTools {
    pub fn new() -> Self {
        let serial = SPAWN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        Self {
            dir: tempfile::tempdir().unwrap(),
            _serial: serial,
        }
    }

    /// Write an executable `/bin/sh` script called `name`.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}

/// Script body for an ffprobe that reports one `width` x `height` stream.
pub fn fake_ffprobe(width: u32, height: u32) -> String {
    format!(
        "cat > /dev/null\necho '{{\"streams\": [{{\"codec_type\": \"video\", \"codec_name\": \"rawvideo\", \
         \"width\": {}, \"height\": {}, \"avg_frame_rate\": \"1/1\"}}]}}'",
        width, height
    )
}
