//! Source access for import expansion.
//!
//! [`SourceProvider`] abstracts how imported documents are located and read
//! so the engine itself never touches `std::fs` directly. The filesystem
//! implementation backs the CLI; the in-memory one backs tests and hosts
//! that embed the engine without a filesystem.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

pub trait SourceProvider {
    /// Read the full text of a document.
    fn read(&self, path: &Path) -> io::Result<String>;

    /// Produce the canonical form of a path, used as the cache and
    /// cycle-detection key and for allowlist containment checks.
    fn canonical(&self, path: &Path) -> io::Result<PathBuf>;
}

/// Resolve `.` and `..` components lexically, without touching a
/// filesystem. `..` at the root is dropped rather than escaping.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(parts.last(), Some(Component::Normal(_))) {
                    parts.pop();
                }
            }
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Filesystem-backed provider used by the CLI.
pub struct FileSystemSource;

impl SourceProvider for FileSystemSource {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn canonical(&self, path: &Path) -> io::Result<PathBuf> {
        path.canonicalize()
    }
}

/// In-memory provider: a fixed map of paths to document text.
pub struct InMemorySource {
    files: HashMap<PathBuf, String>,
}

impl InMemorySource {
    pub fn new() -> Self {
        InMemorySource {
            files: HashMap::new(),
        }
    }

    pub fn with(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.files.insert(normalize_path(&path.into()), text.into());
        self
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceProvider for InMemorySource {
    fn read(&self, path: &Path) -> io::Result<String> {
        let normalized = normalize_path(path);
        self.files.get(&normalized).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such document: {}", normalized.display()),
            )
        })
    }

    fn canonical(&self, path: &Path) -> io::Result<PathBuf> {
        let normalized = normalize_path(path);
        if self.files.contains_key(&normalized)
            || self.files.keys().any(|k| k.starts_with(&normalized))
        {
            Ok(normalized)
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such path: {}", normalized.display()),
            ))
        }
    }
}
