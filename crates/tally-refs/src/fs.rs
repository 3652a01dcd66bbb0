//! File-per-ref reference store.
//!
//! Each ref is a file under the store root at its canonical name (for
//! example `<root>/refs/heads/coins/gold`) holding the target's hex ID and a
//! trailing newline. Updates follow git's lock protocol: the new value is
//! written to `<ref>.lock`, created exclusively, and renamed over the ref.
//! A lock that already exists means another writer is mid-update: plain
//! writes fail with [`RefError::Locked`] and compare-and-swap reports `false`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tally_types::ObjectId;
use tracing::{debug, trace};

use crate::error::{RefError, Result};
use crate::names::validate_ref_name;
use crate::traits::RefStore;
use crate::types::Ref;

const LOCK_SUFFIX: &str = ".lock";

/// A [`RefStore`] persisted as one file per ref.
#[derive(Debug, Clone)]
pub struct FsRefStore {
    root: PathBuf,
}

impl FsRefStore {
    /// Open a store rooted at `root`; refs live under `<root>/refs/`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("refs"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_ref_name(name)?;
        Ok(self.root.join(name))
    }

    fn read_target(&self, name: &str, path: &Path) -> Result<Option<ObjectId>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        ObjectId::from_hex(text.trim())
            .map(Some)
            .map_err(|e| RefError::Corrupt {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    /// Run `update` while holding the ref's lock file. `update` receives the
    /// current target and returns the value to store, or `None` to leave the
    /// ref as it is.
    fn with_lock<T>(
        &self,
        name: &str,
        update: impl FnOnce(Option<ObjectId>) -> Result<(Option<ObjectId>, T)>,
    ) -> Result<T> {
        let path = self.path_for(name)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock = RefLock::acquire(name, &path)?;
        let current = self.read_target(name, &path)?;
        let (next, out) = update(current)?;
        match next {
            Some(id) => lock.commit(id)?,
            None => drop(lock),
        }
        Ok(out)
    }
}

struct RefLock {
    lock_path: PathBuf,
    target: PathBuf,
    file: Option<std::fs::File>,
    committed: bool,
}

impl RefLock {
    fn acquire(name: &str, target: &Path) -> Result<Self> {
        let mut lock_path = target.as_os_str().to_owned();
        lock_path.push(LOCK_SUFFIX);
        let lock_path = PathBuf::from(lock_path);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => Ok(Self {
                lock_path,
                target: target.to_path_buf(),
                file: Some(file),
                committed: false,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(RefError::Locked {
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn commit(mut self, id: ObjectId) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            writeln!(file, "{id}")?;
            file.sync_all()?;
        }
        std::fs::rename(&self.lock_path, &self.target)?;
        self.committed = true;
        trace!(path = %self.target.display(), %id, "ref updated");
        Ok(())
    }
}

impl Drop for RefLock {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

impl RefStore for FsRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<Ref>> {
        let path = self.path_for(name)?;
        match self.read_target(name, &path)? {
            Some(target) => Ok(Some(Ref::parse(name, target)?)),
            None => Ok(None),
        }
    }

    fn write_ref(&self, reference: &Ref) -> Result<()> {
        let name = reference.canonical_name();
        let target = reference.target();
        let is_tag = reference.is_tag();
        self.with_lock(&name, |current| match current {
            Some(existing) if is_tag && existing != target => Err(RefError::TagImmutable {
                name: name.clone(),
            }),
            _ => Ok((Some(target), ())),
        })
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(false);
        }
        let lock = RefLock::acquire(name, &path)?;
        let existed = match std::fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        drop(lock);
        Ok(existed)
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<Ref>> {
        let mut refs = Vec::new();
        for entry in walkdir::WalkDir::new(self.root.join("refs")).sort_by_file_name() {
            let entry = entry.map_err(|e| RefError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if name.ends_with(LOCK_SUFFIX) || !name.starts_with(prefix) {
                continue;
            }
            if let Some(target) = self.read_target(&name, entry.path())? {
                refs.push(Ref::parse(&name, target)?);
            }
        }
        refs.sort_by_key(Ref::canonical_name);
        Ok(refs)
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> Result<bool> {
        let is_tag = Ref::parse(name, new)?.is_tag();
        let outcome = self.with_lock(name, |current| {
            if current != expected {
                return Ok((None, false));
            }
            if is_tag && current.is_some() && current != Some(new) {
                return Err(RefError::TagImmutable {
                    name: name.to_string(),
                });
            }
            Ok((Some(new), true))
        });
        match outcome {
            Err(RefError::Locked { .. }) => {
                debug!(ref_name = name, "ref locked by another writer");
                Ok(false)
            }
            other => other,
        }
    }
}
