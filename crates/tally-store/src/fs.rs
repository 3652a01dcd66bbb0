use std::io::Write;
use std::path::{Path, PathBuf};

use tally_types::ObjectId;
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectDatabase;

const COMPRESSION_LEVEL: i32 = 3;

/// Loose-object database on disk.
///
/// Each object lives at `<root>/<first two hex chars>/<remaining hex>` as a
/// zstd frame wrapping `"<kind> <size>\0<data>"`. Writes go through a
/// temporary file in the same directory and are renamed into place, so a
/// reader never observes a partial object. Every read re-hashes the content
/// and rejects objects whose hash does not match their path.
#[derive(Debug, Clone)]
pub struct FsObjectDatabase {
    root: PathBuf,
}

impl FsObjectDatabase {
    /// Open (creating if needed) a database rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        let (dir, file) = hex.split_at(2);
        self.root.join(dir).join(file)
    }

    fn encode(object: &StoredObject) -> StoreResult<Vec<u8>> {
        let mut raw = format!("{} {}\0", object.kind, object.data.len()).into_bytes();
        raw.extend_from_slice(&object.data);
        Ok(zstd::encode_all(raw.as_slice(), COMPRESSION_LEVEL)?)
    }

    fn decode(id: &ObjectId, bytes: &[u8]) -> StoreResult<StoredObject> {
        let corrupt = |reason: String| StoreError::CorruptObject { id: *id, reason };

        let raw = zstd::decode_all(bytes).map_err(|e| corrupt(e.to_string()))?;
        let nul = raw
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| corrupt("missing header terminator".into()))?;
        let header =
            std::str::from_utf8(&raw[..nul]).map_err(|e| corrupt(e.to_string()))?;
        let (kind, size) = header
            .split_once(' ')
            .ok_or_else(|| corrupt(format!("bad header {header:?}")))?;
        let kind: ObjectKind = kind.parse()?;
        let size: usize = size
            .parse()
            .map_err(|_| corrupt(format!("bad size {size:?}")))?;

        let data = raw[nul + 1..].to_vec();
        if data.len() != size {
            return Err(corrupt(format!(
                "size mismatch: header says {size}, found {}",
                data.len()
            )));
        }
        Ok(StoredObject::new(kind, data))
    }
}

impl ObjectDatabase for FsObjectDatabase {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let bytes = match std::fs::read(self.object_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let object = Self::decode(id, &bytes)?;
        let computed = object.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(Some(object))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Serialization(format!("no parent for {path:?}")))?;
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&Self::encode(object)?)?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        trace!(%id, kind = %object.kind, size = object.size, "wrote object");
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).is_file())
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        match std::fs::remove_file(self.object_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_ids(&self) -> StoreResult<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| StoreError::Walk(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(prefix) = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .and_then(|n| n.to_str())
            else {
                continue;
            };
            let Some(rest) = entry.file_name().to_str() else {
                continue;
            };
            // Leftover temp files from interrupted writes do not parse.
            if let Ok(id) = ObjectId::from_hex(&format!("{prefix}{rest}")) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Blob, Tree};

    fn open() -> (tempfile::TempDir, FsObjectDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let db = FsObjectDatabase::open(dir.path().join("objects")).unwrap();
        (dir, db)
    }

    #[test]
    fn write_then_read() {
        let (_dir, db) = open();
        let obj = Blob::new(b"persisted".to_vec()).to_stored_object();
        let id = db.write(&obj).unwrap();
        assert_eq!(db.read(&id).unwrap(), Some(obj));
        assert!(db.exists(&id).unwrap());
    }

    #[test]
    fn layout_uses_two_char_fanout() {
        let (_dir, db) = open();
        let id = db.write(&Blob::new(b"x".to_vec()).to_stored_object()).unwrap();
        let hex = id.to_hex();
        assert!(db.root().join(&hex[..2]).join(&hex[2..]).is_file());
    }

    #[test]
    fn missing_object_reads_none() {
        let (_dir, db) = open();
        assert!(db.read(&ObjectId::from_bytes(b"nope")).unwrap().is_none());
        assert!(!db.delete(&ObjectId::from_bytes(b"nope")).unwrap());
    }

    #[test]
    fn tampered_object_is_rejected() {
        let (_dir, db) = open();
        let id = db.write(&Blob::new(b"original".to_vec()).to_stored_object()).unwrap();
        let forged = FsObjectDatabase::encode(&Blob::new(b"forged".to_vec()).to_stored_object())
            .unwrap();
        let hex = id.to_hex();
        std::fs::write(db.root().join(&hex[..2]).join(&hex[2..]), forged).unwrap();
        assert!(matches!(
            db.read(&id),
            Err(StoreError::HashMismatch { .. })
        ));
    }

    #[test]
    fn garbage_is_corrupt() {
        let (_dir, db) = open();
        let id = db.write(&Blob::new(b"g".to_vec()).to_stored_object()).unwrap();
        let hex = id.to_hex();
        std::fs::write(db.root().join(&hex[..2]).join(&hex[2..]), b"not zstd").unwrap();
        assert!(matches!(db.read(&id), Err(StoreError::CorruptObject { .. })));
    }

    #[test]
    fn list_and_delete() {
        let (_dir, db) = open();
        let a = db.write(&Blob::new(b"a".to_vec()).to_stored_object()).unwrap();
        let t = db.write(&Tree::empty().to_stored_object().unwrap()).unwrap();
        let mut expected = vec![a, t];
        expected.sort();
        assert_eq!(db.list_ids().unwrap(), expected);

        assert!(db.delete(&a).unwrap());
        assert_eq!(db.list_ids().unwrap(), vec![t]);
    }

    #[test]
    fn reopen_sees_existing_objects() {
        let (dir, db) = open();
        let id = db.write(&Blob::new(b"durable".to_vec()).to_stored_object()).unwrap();
        drop(db);
        let db = FsObjectDatabase::open(dir.path().join("objects")).unwrap();
        assert!(db.read(&id).unwrap().is_some());
    }
}
