//! Storage for materialized artifacts.
//!
//! The orchestrator never hard-codes file locations: it hands `(name, kind, bytes)` to an
//! [`ArtifactStore`], and the store decides where that lands. Names may carry a directory
//! prefix (`gateway/lib/gateway`) so one store can serve every consumer layout.

use std::{
    fs,
    io::{ErrorKind as IoErrorKind, Write},
    path::{Component, Path, PathBuf},
};

use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::{PredeployError, Result};

/// The consumer an artifact is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// `KEY=VALUE` file read by the runtime and the compile step
    Config,
    /// Solidity source fragment declaring a typed constant, read by the compiler
    SourceConstant,
}

/// Persistence for materialized artifacts.
#[auto_impl(&, Arc)]
pub trait ArtifactStore {
    /// Replaces the artifact `(name, kind)` with `bytes` and returns where it now lives.
    fn put(&self, name: &str, kind: ArtifactKind, bytes: &[u8]) -> Result<PathBuf>;

    /// Returns the current content of `(name, kind)`, or `None` if it was never written.
    fn get(&self, name: &str, kind: ArtifactKind) -> Result<Option<Vec<u8>>>;
}

/// An [`ArtifactStore`] rooted at a directory.
///
/// Layout, for a name `dir/stem`:
/// - [`ArtifactKind::Config`] → `<root>/dir/.env.<stem>`
/// - [`ArtifactKind::SourceConstant`] → `<root>/dir/<stem>Address.sol`
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`. Nothing is created until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the path of `(name, kind)` without touching the filesystem.
    pub fn locate(&self, name: &str, kind: ArtifactKind) -> Result<PathBuf> {
        let (dir, stem) = split_name(name)?;
        let file_name = match kind {
            ArtifactKind::Config => format!(".env.{stem}"),
            ArtifactKind::SourceConstant => format!("{stem}Address.sol"),
        };
        Ok(self.root.join(dir).join(file_name))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, name: &str, kind: ArtifactKind, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.locate(name, kind)?;
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir).map_err(|e| PredeployError::io(dir, e))?;

        // Write next to the target and rename over it so a reader never sees half a file.
        let mut file = NamedTempFile::new_in(dir).map_err(|e| PredeployError::io(dir, e))?;
        file.write_all(bytes).map_err(|e| PredeployError::io(&path, e))?;
        file.as_file().sync_all().map_err(|e| PredeployError::io(&path, e))?;
        file.persist(&path).map_err(|e| PredeployError::io(&path, e.error))?;

        debug!(path = %path.display(), ?kind, bytes = bytes.len(), "Artifact written");
        Ok(path)
    }

    fn get(&self, name: &str, kind: ArtifactKind) -> Result<Option<Vec<u8>>> {
        let path = self.locate(name, kind)?;
        match fs::read(&path) {
            Ok(bytes) => {
                trace!(path = %path.display(), ?kind, "Artifact read");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(PredeployError::io(path, e)),
        }
    }
}

/// Splits `dir/stem` into its directory and stem, rejecting names that would escape the root.
pub(crate) fn split_name(name: &str) -> Result<(PathBuf, &str)> {
    let invalid = |reason: &str| {
        PredeployError::InvalidInput(format!("Invalid artifact name '{name}': {reason}"))
    };
    let path = Path::new(name);
    if name.is_empty() || name.ends_with('/') {
        return Err(invalid("empty file stem"));
    }
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(invalid("must be a relative path without '..'"));
    }
    let (dir, stem) = match name.rsplit_once('/') {
        Some((dir, stem)) => (PathBuf::from(dir), stem),
        None => (PathBuf::new(), name),
    };
    Ok((dir, stem))
}
