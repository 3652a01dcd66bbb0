use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tally_crypto::{domain_hash, BLOB_DOMAIN, BLOCK_DOMAIN, TREE_DOMAIN};
use tally_types::{ObjectId, Signature};

use crate::error::{StoreError, StoreResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Blob,
    Tree,
    Block,
}

impl ObjectKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Block => "block",
        }
    }

    /// Hash domain for ids of this kind.
    pub fn domain(self) -> &'static str {
        match self {
            Self::Blob => BLOB_DOMAIN,
            Self::Tree => TREE_DOMAIN,
            Self::Block => BLOCK_DOMAIN,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ObjectKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Blob, Self::Tree, Self::Block]
            .into_iter()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| StoreError::Serialization(format!("unknown object kind: {s:?}")))
    }
}

/// Bytes plus the kind they decode as. The database stores these opaquely,
/// keyed by [`compute_id`](Self::compute_id).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
    pub size: u64,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    pub fn compute_id(&self) -> ObjectId {
        domain_hash(self.kind.domain(), &self.data)
    }

    /// IDs this object points at: a block's tree and parents, a tree's
    /// entries. Blobs have no outgoing links.
    pub fn links(&self) -> StoreResult<Vec<ObjectId>> {
        match self.kind {
            ObjectKind::Blob => Ok(Vec::new()),
            ObjectKind::Tree => Ok(Tree::from_stored_object(self)?
                .entries
                .into_iter()
                .map(|e| e.object_id)
                .collect()),
            ObjectKind::Block => {
                let block = BlockObject::from_stored_object(self)?;
                let mut links = Vec::with_capacity(block.parents.len() + 1);
                links.push(block.tree);
                links.extend(block.parents);
                Ok(links)
            }
        }
    }

    fn expect_kind(&self, kind: ObjectKind) -> StoreResult<()> {
        if self.kind != kind {
            return Err(StoreError::CorruptObject {
                id: self.compute_id(),
                reason: format!("expected {kind}, got {}", self.kind),
            });
        }
        Ok(())
    }
}

/// File contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Blob, self.data.clone())
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Blob)?;
        Ok(Self::new(obj.data.clone()))
    }
}

/// How a working-tree path is restored on checkout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    Regular,
    Executable,
    Symlink,
    Directory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub mode: EntryMode,
    /// A single path component.
    pub name: String,
    pub object_id: ObjectId,
}

impl TreeEntry {
    pub fn new(mode: EntryMode, name: impl Into<String>, object_id: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            object_id,
        }
    }
}

/// One directory of a snapshot. Entries are kept sorted by name so equal
/// directories serialize, and therefore hash, identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data =
            serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Tree, data))
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Tree)?;
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// One chain block, stored in git's commit text layout:
///
/// ```text
/// tree <hex>
/// parent <hex>        (zero or more, direct predecessor first)
/// author <signature>
/// committer <signature>
///
/// <message>
/// ```
///
/// The same codec parses `git cat-file commit` output, so both backends share
/// one block model. Unknown headers (and their continuation lines) are
/// skipped when decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockObject {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl BlockObject {
    /// Serialize into block text.
    pub fn encode(&self) -> String {
        let mut out = format!("tree {}\n", self.tree);
        for parent in &self.parents {
            out.push_str(&format!("parent {parent}\n"));
        }
        out.push_str(&format!("author {}\n", self.author.encode()));
        out.push_str(&format!("committer {}\n", self.committer.encode()));
        out.push('\n');
        out.push_str(&self.message);
        out
    }

    /// Parse block text.
    pub fn decode(text: &str) -> StoreResult<Self> {
        let (header, message) = text.split_once("\n\n").unwrap_or((text, ""));

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in header.lines() {
            // Continuation of a multi-line header such as `gpgsig`.
            if line.starts_with(' ') {
                continue;
            }
            let Some((key, value)) = line.split_once(' ') else {
                continue;
            };
            match key {
                "tree" => tree = Some(parse_id(value)?),
                "parent" => parents.push(parse_id(value)?),
                "author" => author = Some(parse_signature(value)?),
                "committer" => committer = Some(parse_signature(value)?),
                _ => {}
            }
        }

        Ok(Self {
            tree: tree.ok_or_else(|| StoreError::MalformedBlock("missing tree".into()))?,
            parents,
            author: author.ok_or_else(|| StoreError::MalformedBlock("missing author".into()))?,
            committer: committer
                .ok_or_else(|| StoreError::MalformedBlock("missing committer".into()))?,
            message: message.to_string(),
        })
    }

    /// Convert into a `StoredObject` for storage.
    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Block, self.encode().into_bytes())
    }

    /// Decode from a `StoredObject`.
    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Block)?;
        let text = std::str::from_utf8(&obj.data)
            .map_err(|e| StoreError::MalformedBlock(e.to_string()))?;
        Self::decode(text)
    }
}

fn parse_id(value: &str) -> StoreResult<ObjectId> {
    ObjectId::from_hex(value).map_err(|e| StoreError::MalformedBlock(e.to_string()))
}

fn parse_signature(value: &str) -> StoreResult<Signature> {
    Signature::parse(value).map_err(|e| StoreError::MalformedBlock(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::{BlockTime, Person};

    fn sig(seconds: i64) -> Signature {
        Signature::new(
            Person::new("Tally Miner", "miner@tally.local"),
            BlockTime::new(seconds, 0),
        )
    }

    fn block(parents: Vec<ObjectId>) -> BlockObject {
        BlockObject {
            tree: ObjectId::from_bytes(b"tree"),
            parents,
            author: sig(100),
            committer: sig(100),
            message: "mined\n\nstamp 00ff".into(),
        }
    }

    #[test]
    fn blob_kind_mismatch() {
        let stored = StoredObject::new(ObjectKind::Tree, b"not a blob".to_vec());
        let err = Blob::from_stored_object(&stored).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn tree_entries_sorted() {
        let tree = Tree::new(vec![
            TreeEntry::new(EntryMode::Regular, "zebra.txt", ObjectId::null()),
            TreeEntry::new(EntryMode::Regular, "alpha.txt", ObjectId::null()),
            TreeEntry::new(EntryMode::Directory, "middle", ObjectId::null()),
        ]);
        assert_eq!(tree.entries[0].name, "alpha.txt");
        assert_eq!(tree.entries[1].name, "middle");
        assert_eq!(tree.entries[2].name, "zebra.txt");
        assert!(tree.get("middle").is_some());
        assert!(tree.get("missing").is_none());
    }

    #[test]
    fn block_text_layout() {
        let parent = ObjectId::from_bytes(b"p");
        let text = block(vec![parent]).encode();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("tree "));
        assert_eq!(lines[1], format!("parent {parent}"));
        assert!(lines[2].starts_with("author Tally Miner <miner@tally.local> 100 +0000"));
        assert!(lines[3].starts_with("committer "));
        assert_eq!(lines[4], "");
        assert!(text.ends_with("stamp 00ff"));
    }

    #[test]
    fn block_decode_inverts_encode() {
        let b = block(vec![ObjectId::from_bytes(b"a"), ObjectId::from_bytes(b"b")]);
        assert_eq!(BlockObject::decode(&b.encode()).unwrap(), b);
    }

    #[test]
    fn block_decode_accepts_git_output() {
        let text = "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
                    parent 1111111111111111111111111111111111111111\n\
                    author A <a@x> 1700000000 +0100\n\
                    committer C <c@x> 1700000001 +0100\n\
                    gpgsig -----BEGIN PGP SIGNATURE-----\n \n -----END PGP SIGNATURE-----\n\
                    \n\
                    hello\n";
        let b = BlockObject::decode(text).unwrap();
        assert_eq!(b.tree.hex_len(), 40);
        assert_eq!(b.parents.len(), 1);
        assert_eq!(b.author.person.name, "A");
        assert_eq!(b.committer.time.seconds, 1_700_000_001);
        assert_eq!(b.message, "hello\n");
    }

    #[test]
    fn block_decode_requires_tree_and_signatures() {
        assert!(matches!(
            BlockObject::decode("author A <a> 1 +0000\n\nmsg"),
            Err(StoreError::MalformedBlock(_))
        ));
    }

    #[test]
    fn identical_blocks_hash_identically() {
        let a = block(vec![ObjectId::from_bytes(b"p")]).to_stored_object();
        let b = block(vec![ObjectId::from_bytes(b"p")]).to_stored_object();
        assert_eq!(a.compute_id(), b.compute_id());
    }

    #[test]
    fn parent_order_changes_hash() {
        let (x, y) = (ObjectId::from_bytes(b"x"), ObjectId::from_bytes(b"y"));
        let a = block(vec![x, y]).to_stored_object();
        let b = block(vec![y, x]).to_stored_object();
        assert_ne!(a.compute_id(), b.compute_id());
    }

    #[test]
    fn links_of_each_kind() {
        let parent = ObjectId::from_bytes(b"p");
        let stored = block(vec![parent]).to_stored_object();
        assert_eq!(
            stored.links().unwrap(),
            vec![ObjectId::from_bytes(b"tree"), parent]
        );

        let file = ObjectId::from_bytes(b"file");
        let tree = Tree::new(vec![TreeEntry::new(EntryMode::Regular, "f", file)]);
        assert_eq!(tree.to_stored_object().unwrap().links().unwrap(), vec![file]);

        assert!(Blob::new(b"x".to_vec()).to_stored_object().links().unwrap().is_empty());
    }

    #[test]
    fn different_kinds_produce_different_ids() {
        let data = b"same data".to_vec();
        let blob = StoredObject::new(ObjectKind::Blob, data.clone());
        let tree = StoredObject::new(ObjectKind::Tree, data.clone());
        let block = StoredObject::new(ObjectKind::Block, data);
        assert_ne!(blob.compute_id(), tree.compute_id());
        assert_ne!(blob.compute_id(), block.compute_id());
    }

    #[test]
    fn object_kind_parse_and_display() {
        for kind in [ObjectKind::Blob, ObjectKind::Tree, ObjectKind::Block] {
            assert_eq!(kind.to_string().parse::<ObjectKind>().unwrap(), kind);
        }
        assert!("pack".parse::<ObjectKind>().is_err());
    }
}
