use tally_types::ObjectId;

/// Domain tags for native object ids. Bumping a version changes every id of
/// that kind.
pub const BLOB_DOMAIN: &str = "tally-blob-v1";
pub const TREE_DOMAIN: &str = "tally-tree-v1";
pub const BLOCK_DOMAIN: &str = "tally-block-v1";

/// BLAKE3 of `domain ":" data`, so equal bytes stored as different kinds get
/// different ids.
pub fn domain_hash(domain: &str, data: &[u8]) -> ObjectId {
    let digest = blake3::Hasher::new()
        .update(domain.as_bytes())
        .update(b":")
        .update(data)
        .finalize();
    ObjectId::from_hash(*digest.as_bytes())
}
