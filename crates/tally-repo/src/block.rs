use serde::{Deserialize, Serialize};
use tally_store::BlockObject;
use tally_types::{BlockTime, ChainIdentity, ObjectId, Signature};

/// Everything needed to write one block.
///
/// Author and committer share a single date; the identity is the chain's
/// configured identity and is passed in explicitly with every draft.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockDraft {
    pub tree: ObjectId,
    /// Direct predecessor first, then ancestors at increasing distance.
    pub parents: Vec<ObjectId>,
    pub identity: ChainIdentity,
    pub date: BlockTime,
    pub message: String,
}

impl BlockDraft {
    pub fn author(&self) -> Signature {
        self.identity.sign_author(self.date)
    }

    pub fn committer(&self) -> Signature {
        self.identity.sign_committer(self.date)
    }

    /// The object this draft is stored as.
    pub fn to_object(&self) -> BlockObject {
        BlockObject {
            tree: self.tree,
            parents: self.parents.clone(),
            author: self.author(),
            committer: self.committer(),
            message: self.message.clone(),
        }
    }

    /// The accepted block, once the store has assigned `hash`.
    pub fn into_block(self, hash: ObjectId) -> Block {
        Block {
            hash,
            author: self.author(),
            committer: self.committer(),
            tree: self.tree,
            parents: self.parents,
            message: self.message,
        }
    }
}

/// One block of the chain, as read back from a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: ObjectId,
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Block {
    pub fn from_object(hash: ObjectId, object: BlockObject) -> Self {
        Self {
            hash,
            tree: object.tree,
            parents: object.parents,
            author: object.author,
            committer: object.committer,
            message: object.message,
        }
    }

    /// The direct predecessor, or `None` for a root block such as genesis.
    pub fn first_parent(&self) -> Option<ObjectId> {
        self.parents.first().copied()
    }

    /// The authored date.
    pub fn date(&self) -> BlockTime {
        self.author.time
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}
