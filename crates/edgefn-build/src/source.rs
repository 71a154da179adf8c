use std::path::{Path, PathBuf};

use crate::walk::WalkError;

/// Read access to function sources, addressed by logical path.
///
/// Logical paths use `/` separators and are relative to the tree root unless
/// they start with `/`.
pub trait SourceTree: Send + Sync {
    fn read(&self, path: &str) -> std::io::Result<Vec<u8>>;

    /// Logical paths matching `pattern`, in a stable order.
    fn glob(&self, pattern: &str) -> Result<Vec<String>, WalkError>;
}

/// [`SourceTree`] backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Host path for a logical path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn logical(&self, path: &Path) -> String {
        // arch-lint: allow(no-silent-result-drop) reason="matches outside the root keep their absolute form"
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if relative.is_absolute() {
            // components() yields "/" first for absolute paths
            joined.replacen("//", "/", 1)
        } else {
            joined
        }
    }
}

impl SourceTree for DirSource {
    fn read(&self, path: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>, WalkError> {
        let full = self.resolve(pattern);
        let full = full.to_string_lossy();
        let entries = glob::glob(&full).map_err(|e| WalkError::Pattern {
            pattern: pattern.to_owned(),
            source: e,
        })?;

        let mut matches = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| WalkError::Glob {
                pattern: pattern.to_owned(),
                source: e,
            })?;
            matches.push(self.logical(&path));
        }
        Ok(matches)
    }
}
