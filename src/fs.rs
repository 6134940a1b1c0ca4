//! Filesystem search model
//!
//! Nodes and items are paths. A path matches when its file name contains the key;
//! a directory expands to its direct entries.

use crate::error::{ModelError, StorageError};
use crate::model::{SearchModel, SearchOutcome};
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Filesystem model configuration
#[derive(Debug, Clone)]
pub struct FsModelConfig {
    /// Whether to follow symbolic links (default: false, so link cycles cannot
    /// send the traversal around forever)
    pub follow_symlinks: bool,
    /// Entry names never searched (e.g., ".git", "target", "node_modules")
    pub ignore_patterns: Vec<String>,
}

impl Default for FsModelConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            ignore_patterns: vec![
                ".git".to_string(),
                "target".to_string(),
                "node_modules".to_string(),
                ".cargo".to_string(),
            ],
        }
    }
}

/// Searches file and directory names
#[derive(Debug, Clone, Default)]
pub struct FsSearchModel {
    config: FsModelConfig,
}

impl FsSearchModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FsModelConfig) -> Self {
        Self { config }
    }

    /// Canonicalize root directories so results carry absolute paths.
    pub fn root_nodes<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
    ) -> Result<Vec<PathBuf>, StorageError> {
        paths
            .into_iter()
            .map(|path| {
                let path = path.as_ref();
                dunce::canonicalize(path).map_err(|source| StorageError::InvalidPath {
                    path: path.to_path_buf(),
                    source,
                })
            })
            .collect()
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.config.ignore_patterns.iter().any(|pattern| pattern == name)
    }

    fn children(&self, dir: &Path) -> Result<Vec<PathBuf>, ModelError> {
        let mut children = Vec::new();
        let entries = WalkDir::new(dir)
            .follow_links(self.config.follow_symlinks)
            .min_depth(1)
            .max_depth(1);

        for entry in entries {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => ModelError::Io(io),
                None => ModelError::InvalidNode(format!("Failed to list {:?}", dir)),
            })?;
            if self.is_ignored(&entry.file_name().to_string_lossy()) {
                continue;
            }
            children.push(entry.into_path());
        }
        Ok(children)
    }
}

impl SearchModel for FsSearchModel {
    type Key = String;
    type Node = PathBuf;
    type Item = PathBuf;

    fn evaluate(
        &self,
        key: &String,
        node: &PathBuf,
    ) -> Result<SearchOutcome<PathBuf, PathBuf>, ModelError> {
        let metadata = if self.config.follow_symlinks {
            std::fs::metadata(node)?
        } else {
            std::fs::symlink_metadata(node)?
        };

        let mut outcome = SearchOutcome::dead_end();
        let name_matches = node
            .file_name()
            .map(|name| name.to_string_lossy().contains(key.as_str()))
            .unwrap_or(false);
        if name_matches {
            outcome = outcome.with_matches([node.clone()]);
        }
        if metadata.is_dir() {
            outcome = outcome.with_children(self.children(node)?);
        }
        Ok(outcome)
    }

    /// Create an empty file. `Ok(false)` if something already exists there.
    fn add(&self, item: &PathBuf) -> Result<bool, ModelError> {
        match OpenOptions::new().write(true).create_new(true).open(item) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(ModelError::Io(e)),
        }
    }

    /// Delete a file or empty directory. `Ok(false)` if nothing is there.
    fn remove(&self, item: &PathBuf) -> Result<bool, ModelError> {
        let metadata = match std::fs::symlink_metadata(item) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(ModelError::Io(e)),
        };
        let removed = if metadata.is_dir() {
            std::fs::remove_dir(item)
        } else {
            std::fs::remove_file(item)
        };
        match removed {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ModelError::Io(e)),
        }
    }
}
