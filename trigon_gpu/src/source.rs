//! Where shader source text comes from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::GpuError;

/// Reads shader source text by path.
///
/// Reading happens once, synchronously, before any device call is made for that shader.
pub trait SourceStore {
    fn read_text(&self, path: &Path) -> Result<String, GpuError>;
}

/// Reads sources from the file system, relative to `root`.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SourceStore for FileSystemStore {
    fn read_text(&self, path: &Path) -> Result<String, GpuError> {
        let full = self.root.join(path);
        log::debug!("reading shader source {}", full.display());
        std::fs::read_to_string(&full).map_err(|source| GpuError::Io { path: full, source })
    }
}

/// Sources kept in memory. Useful for shaders embedded with `include_str!` and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: HashMap<PathBuf, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }

    pub fn with(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }
}

impl SourceStore for MemoryStore {
    fn read_text(&self, path: &Path) -> Result<String, GpuError> {
        self.files.get(path).cloned().ok_or_else(|| GpuError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such shader source"),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory_store_reports_missing_files() {
        let store = MemoryStore::new().with("a.vert", "void main() {}");

        assert_eq!(store.read_text(Path::new("a.vert")).unwrap(), "void main() {}");
        let err = store.read_text(Path::new("b.frag")).unwrap_err();
        assert!(matches!(err, GpuError::Io { ref path, .. } if path == Path::new("b.frag")));
    }

    #[test]
    fn file_system_store_joins_root() {
        let dir = std::env::temp_dir().join(format!("trigon-source-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("t.frag"), "out vec4 color;").unwrap();

        let store = FileSystemStore::new(&dir);
        assert_eq!(store.read_text(Path::new("t.frag")).unwrap(), "out vec4 color;");
        assert!(store.read_text(Path::new("missing.frag")).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
