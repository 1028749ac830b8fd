//! File Walker
//!
//! Recursive, deterministic enumeration of the input tree using walkdir.
//! Within each directory, files come first and then subdirectories, each
//! group sorted by name. Unreadable entries are yielded as `WalkFailure`
//! instead of ending the walk. Symlinks to files are listed with the
//! target's metadata; linked directories are not entered.

use crate::error::ReportError;
use crate::format::FormatCategory;
use chrono::{DateTime, Local};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A discovered file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path
    pub path: PathBuf,

    /// Path relative to the input root
    pub relative_path: PathBuf,

    /// Lowercase extension without the dot ("" when there is none)
    pub extension: String,

    /// Size in bytes
    pub size: u64,

    /// Last modification time, when the platform reports one
    pub modified: Option<DateTime<Local>>,
}

impl FileEntry {
    /// File name component
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Relative path with '/' separators on every platform
    pub fn label(&self) -> String {
        relative_label(&self.relative_path)
    }

    pub fn category(&self) -> FormatCategory {
        FormatCategory::classify(&self.extension)
    }

    /// Directory containing the file
    pub fn location(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Last `levels` directory names above the file, joined with '/'
    pub fn path_context(&self, levels: usize) -> String {
        let mut parts: Vec<String> = self
            .location()
            .components()
            .rev()
            .filter_map(|c| match c {
                std::path::Component::Normal(name) => Some(name.to_string_lossy().to_string()),
                _ => None,
            })
            .take(levels)
            .collect();
        parts.reverse();
        parts.join("/")
    }
}

/// An entry that could not be read during the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkFailure {
    /// Path of the entry, when walkdir reports one
    pub path: PathBuf,

    /// Path relative to the input root
    pub relative_path: PathBuf,

    pub reason: String,
}

impl WalkFailure {
    pub fn label(&self) -> String {
        relative_label(&self.relative_path)
    }
}

/// One step of the walk
pub type WalkItem = Result<FileEntry, WalkFailure>;

/// Walks an input directory
#[derive(Debug, Clone)]
pub struct FileWalker {
    root: PathBuf,
}

impl FileWalker {
    /// Create a walker, validating that `root` is an existing directory
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ReportError> {
        let root = validate_root(root.as_ref())?;
        Ok(Self { root })
    }

    /// Canonical input root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh walk from disk
    ///
    /// Nothing is cached between calls, so calling this again re-reads the
    /// tree. Fails if the root disappeared since the walker was created.
    pub fn walk(&self) -> Result<Walk, ReportError> {
        validate_root(&self.root)?;

        let inner = WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .sort_by(files_then_dirs_by_name)
            .into_iter();

        Ok(Walk {
            inner,
            root: self.root.clone(),
        })
    }
}

/// Lazy iterator over the files of one walk
pub struct Walk {
    inner: walkdir::IntoIter,
    root: PathBuf,
}

impl Iterator for Walk {
    type Item = WalkItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    tracing::warn!("[FileWalker] Walk error at {}: {}", path.display(), e);
                    return Some(Err(self.failure(path, e.to_string())));
                }
            };

            let path = entry.path().to_path_buf();
            let metadata = if entry.path_is_symlink() {
                // walkdir keeps follow_links off; only file targets are listed
                match std::fs::metadata(&path) {
                    Ok(m) if m.is_file() => m,
                    Ok(_) => {
                        tracing::debug!("[FileWalker] Skipping linked directory {}", path.display());
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!("[FileWalker] Broken symlink {}: {}", path.display(), e);
                        return Some(Err(self.failure(path, format!("Broken symlink: {}", e))));
                    }
                }
            } else if entry.file_type().is_file() {
                match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!("[FileWalker] Cannot stat {}: {}", path.display(), e);
                        return Some(Err(self.failure(path, format!("Cannot read metadata: {}", e))));
                    }
                }
            } else {
                continue;
            };

            return Some(Ok(self.entry(path, &metadata)));
        }
    }
}

impl Walk {
    fn entry(&self, path: PathBuf, metadata: &std::fs::Metadata) -> FileEntry {
        let relative_path = path
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        FileEntry {
            modified: metadata.modified().ok().map(DateTime::<Local>::from),
            size: metadata.len(),
            path,
            relative_path,
            extension,
        }
    }

    fn failure(&self, path: PathBuf, reason: String) -> WalkFailure {
        let relative_path = path
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());
        WalkFailure {
            path,
            relative_path,
            reason,
        }
    }
}

fn files_then_dirs_by_name(a: &walkdir::DirEntry, b: &walkdir::DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

fn validate_root(root: &Path) -> Result<PathBuf, ReportError> {
    if !root.exists() {
        return Err(ReportError::InvalidInput {
            path: root.to_path_buf(),
            reason: "does not exist".to_string(),
        });
    }
    if !root.is_dir() {
        return Err(ReportError::InvalidInput {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    root.canonicalize().map_err(|e| ReportError::InvalidInput {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })
}

fn relative_label(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
