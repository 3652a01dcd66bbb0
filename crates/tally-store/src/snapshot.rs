//! Working-tree snapshots.
//!
//! [`write_tree`] records a directory as nested tree objects and
//! [`checkout`] makes a directory match a recorded tree. Both walk the
//! directory with the same rules: the metadata directory and any `.git`
//! directory are never part of a snapshot, and files excluded by
//! `.gitignore` or `.tallyignore` are neither recorded nor touched.

use std::collections::BTreeMap;
use std::fs::FileType;
use std::path::{Path, PathBuf};

use tally_types::ObjectId;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, EntryMode, ObjectKind, Tree, TreeEntry};
use crate::traits::ObjectDatabase;

/// Name of the per-mirror metadata directory.
pub const METADATA_DIR: &str = ".tally";

const IGNORE_FILE: &str = ".tallyignore";

/// What [`checkout`] changed on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckoutSummary {
    /// Files created or overwritten.
    pub written: usize,
    /// Files deleted because the tree does not contain them.
    pub removed: usize,
}

type FileMap = BTreeMap<PathBuf, (EntryMode, ObjectId)>;

enum Node {
    File(EntryMode, ObjectId),
    Dir(BTreeMap<String, Node>),
}

/// Snapshot `root` into the database and return the root tree ID.
///
/// Empty directories are not recorded.
pub fn write_tree<D>(db: &D, root: &Path) -> StoreResult<ObjectId>
where
    D: ObjectDatabase + ?Sized,
{
    let mut top = BTreeMap::new();
    for (rel, path, file_type) in working_files(root)? {
        let (mode, content) = read_entry(&path, file_type)?;
        let id = db.write(&Blob::new(content).to_stored_object())?;
        insert(&mut top, &rel, Node::File(mode, id))?;
    }
    let id = write_dir(db, top)?;
    debug!(root = %root.display(), tree = %id, "snapshot written");
    Ok(id)
}

/// Make `root` match `tree`: write missing or changed files, delete tracked
/// files the tree lacks, and prune directories left empty.
pub fn checkout<D>(db: &D, tree: &ObjectId, root: &Path) -> StoreResult<CheckoutSummary>
where
    D: ObjectDatabase + ?Sized,
{
    let mut target = FileMap::new();
    flatten(db, tree, PathBuf::new(), &mut target)?;
    std::fs::create_dir_all(root)?;

    let mut summary = CheckoutSummary::default();
    for (rel, path, _) in working_files(root)? {
        if !target.contains_key(&rel) {
            std::fs::remove_file(&path)?;
            summary.removed += 1;
        }
    }

    for (rel, (mode, id)) in &target {
        let path = root.join(rel);
        if let Ok(meta) = std::fs::symlink_metadata(&path) {
            if meta.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                let (current_mode, content) = read_entry(&path, meta.file_type())?;
                let current = Blob::new(content).to_stored_object().compute_id();
                if current_mode == *mode && current == *id {
                    continue;
                }
                std::fs::remove_file(&path)?;
            }
        }
        let object = db.read(id)?.ok_or(StoreError::NotFound(*id))?;
        let blob = Blob::from_stored_object(&object)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_entry(&path, *mode, &blob.data)?;
        summary.written += 1;
    }

    prune_empty_dirs(root)?;
    debug!(
        root = %root.display(),
        %tree,
        written = summary.written,
        removed = summary.removed,
        "checkout complete"
    );
    Ok(summary)
}

fn working_files(root: &Path) -> StoreResult<Vec<(PathBuf, PathBuf, FileType)>> {
    let walker = ignore::WalkBuilder::new(root)
        .hidden(false)
        .require_git(false)
        .add_custom_ignore_filename(IGNORE_FILE)
        .filter_entry(|entry| {
            let name = entry.file_name();
            name != METADATA_DIR && name != ".git"
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| StoreError::Walk(e.to_string()))?;
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| StoreError::Walk(e.to_string()))?
            .to_path_buf();
        files.push((rel, entry.path().to_path_buf(), file_type));
    }
    Ok(files)
}

fn read_entry(path: &Path, file_type: FileType) -> StoreResult<(EntryMode, Vec<u8>)> {
    if file_type.is_symlink() {
        let target = std::fs::read_link(path)?;
        return Ok((
            EntryMode::Symlink,
            target.to_string_lossy().into_owned().into_bytes(),
        ));
    }
    let content = std::fs::read(path)?;
    Ok((file_mode(path)?, content))
}

#[cfg(unix)]
fn file_mode(path: &Path) -> StoreResult<EntryMode> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path)?.permissions().mode();
    Ok(if mode & 0o111 != 0 {
        EntryMode::Executable
    } else {
        EntryMode::Regular
    })
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> StoreResult<EntryMode> {
    Ok(EntryMode::Regular)
}

fn write_entry(path: &Path, mode: EntryMode, data: &[u8]) -> StoreResult<()> {
    match mode {
        #[cfg(unix)]
        EntryMode::Symlink => {
            let target = String::from_utf8_lossy(data).into_owned();
            std::os::unix::fs::symlink(target, path)?;
        }
        #[cfg(unix)]
        EntryMode::Executable => {
            use std::os::unix::fs::PermissionsExt;
            std::fs::write(path, data)?;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
        }
        _ => std::fs::write(path, data)?,
    }
    Ok(())
}

fn insert(dir: &mut BTreeMap<String, Node>, rel: &Path, node: Node) -> StoreResult<()> {
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let Some((name, parents)) = parts.split_last() else {
        return Ok(());
    };

    let mut current = dir;
    for part in parents {
        let child = current
            .entry(part.clone())
            .or_insert_with(|| Node::Dir(BTreeMap::new()));
        current = match child {
            Node::Dir(children) => children,
            Node::File(..) => {
                return Err(StoreError::Walk(format!(
                    "{} is both a file and a directory",
                    rel.display()
                )))
            }
        };
    }
    current.insert(name.clone(), node);
    Ok(())
}

fn write_dir<D>(db: &D, children: BTreeMap<String, Node>) -> StoreResult<ObjectId>
where
    D: ObjectDatabase + ?Sized,
{
    let mut entries = Vec::with_capacity(children.len());
    for (name, node) in children {
        let entry = match node {
            Node::File(mode, id) => TreeEntry::new(mode, name, id),
            Node::Dir(grandchildren) => {
                TreeEntry::new(EntryMode::Directory, name, write_dir(db, grandchildren)?)
            }
        };
        entries.push(entry);
    }
    db.write(&Tree::new(entries).to_stored_object()?)
}

fn flatten<D>(db: &D, tree: &ObjectId, prefix: PathBuf, out: &mut FileMap) -> StoreResult<()>
where
    D: ObjectDatabase + ?Sized,
{
    let object = db.read(tree)?.ok_or(StoreError::NotFound(*tree))?;
    if object.kind != ObjectKind::Tree {
        return Err(StoreError::CorruptObject {
            id: *tree,
            reason: format!("expected tree, got {}", object.kind),
        });
    }
    for entry in Tree::from_stored_object(&object)?.entries {
        let path = prefix.join(&entry.name);
        match entry.mode {
            EntryMode::Directory => flatten(db, &entry.object_id, path, out)?,
            mode => {
                out.insert(path, (mode, entry.object_id));
            }
        }
    }
    Ok(())
}

fn prune_empty_dirs(root: &Path) -> StoreResult<()> {
    let walker = walkdir::WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_entry(|e| e.file_name() != METADATA_DIR && e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| StoreError::Walk(e.to_string()))?;
        if entry.file_type().is_dir() && std::fs::read_dir(entry.path())?.next().is_none() {
            std::fs::remove_dir(entry.path())?;
        }
    }
    Ok(())
}
