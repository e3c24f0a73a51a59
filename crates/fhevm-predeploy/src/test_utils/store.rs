use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use crate::{
    artifact::{split_name, ArtifactKind, ArtifactStore},
    PredeployError, Result,
};

/// An [`ArtifactStore`] keeping artifacts in memory.
///
/// Paths returned by [`ArtifactStore::put`] are synthetic (`memory/<kind>/<name>`) but stable.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<BTreeMap<(String, ArtifactKind), Vec<u8>>>,
    writes: AtomicUsize,
    fail_after: Option<usize>,
}

impl MemoryArtifactStore {
    /// A store whose writes fail with an I/O error once `writes` writes succeeded.
    pub fn failing_after(writes: usize) -> Self {
        Self { fail_after: Some(writes), ..Default::default() }
    }

    /// Number of successful writes.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// The stored content of `(name, kind)` as a string.
    pub fn content(&self, name: &str, kind: ArtifactKind) -> Option<String> {
        self.artifacts
            .lock()
            .unwrap()
            .get(&(name.to_string(), kind))
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Every stored artifact name of `kind`.
    pub fn names(&self, kind: ArtifactKind) -> Vec<String> {
        self.artifacts
            .lock()
            .unwrap()
            .keys()
            .filter(|(_, k)| *k == kind)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn path(name: &str, kind: ArtifactKind) -> PathBuf {
        let kind = match kind {
            ArtifactKind::Config => "config",
            ArtifactKind::SourceConstant => "source",
        };
        PathBuf::from("memory").join(kind).join(name)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, name: &str, kind: ArtifactKind, bytes: &[u8]) -> Result<PathBuf> {
        split_name(name)?;
        let path = Self::path(name, kind);
        if self.fail_after.is_some_and(|limit| self.writes() >= limit) {
            return Err(PredeployError::Io {
                path,
                source: std::io::Error::other("disk full"),
            });
        }
        self.artifacts.lock().unwrap().insert((name.to_string(), kind), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(path)
    }

    fn get(&self, name: &str, kind: ArtifactKind) -> Result<Option<Vec<u8>>> {
        split_name(name)?;
        Ok(self.artifacts.lock().unwrap().get(&(name.to_string(), kind)).cloned())
    }
}
