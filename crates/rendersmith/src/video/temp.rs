//! Uniquely named scratch files that are always removed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// A scratch file path owned by one render.
///
/// The file is not created here; whoever writes it does. Call
/// [`TempArtifact::cleanup`] on every exit path. If the artifact is dropped
/// without cleanup (e.g. the render was cancelled) the file is removed
/// synchronously on drop.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    removed: bool,
}

impl TempArtifact {
    /// Reserve `<dir>/<prefix>-<uuid>.<extension>`
    #[must_use]
    pub fn new(dir: &Path, prefix: &str, extension: &str) -> Self {
        let name = format!("{prefix}-{}.{extension}", Uuid::new_v4());
        Self {
            path: dir.join(name),
            removed: false,
        }
    }

    /// Path of the scratch file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file. A missing file is fine; other failures are logged
    /// and never returned.
    pub async fn cleanup(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove temp file"),
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove temp file"),
        }
    }
}
