use std::path::{Path, PathBuf};

/// Scratch file or directory removed when the guard drops.
///
/// Removal runs on every exit path of the owning scope. Failures are logged
/// and never propagated.
#[derive(Debug)]
pub(crate) struct ScratchPath {
    path: PathBuf,
    is_dir: bool,
}

impl ScratchPath {
    /// Create a world-writable directory at `path`. The container user may
    /// not match the host user that owns the bind mount.
    pub(crate) fn create_dir(path: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&path)?;
        let guard = Self { path, is_dir: true };
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&guard.path, std::fs::Permissions::from_mode(0o777))?;
        }
        Ok(guard)
    }

    /// Track a file another process is about to write.
    pub(crate) fn file(path: PathBuf) -> Self {
        Self {
            path,
            is_dir: false,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchPath {
    fn drop(&mut self) {
        let result = if self.is_dir {
            std::fs::remove_dir_all(&self.path)
        } else {
            std::fs::remove_file(&self.path)
        };
        match result {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed scratch path"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove scratch path")
            }
        }
    }
}
