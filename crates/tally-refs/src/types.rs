//! The reference type.

use serde::{Deserialize, Serialize};
use tally_types::ObjectId;

use crate::error::{RefError, Result};

/// A named reference to a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ref {
    /// A mutable pointer to a chain tip. Moves forward as blocks are mined.
    Branch { name: String, target: ObjectId },

    /// An immutable pointer to one block, such as the genesis tag.
    Tag { name: String, target: ObjectId },

    /// Where a remote's branch stood at the last synchronization.
    Remote {
        remote: String,
        branch: String,
        target: ObjectId,
    },
}

impl Ref {
    pub fn branch(name: impl Into<String>, target: ObjectId) -> Self {
        Self::Branch {
            name: name.into(),
            target,
        }
    }

    pub fn tag(name: impl Into<String>, target: ObjectId) -> Self {
        Self::Tag {
            name: name.into(),
            target,
        }
    }

    /// Interpret a canonical name (e.g. `refs/heads/coins/gold`).
    pub fn parse(canonical: &str, target: ObjectId) -> Result<Self> {
        if let Some(name) = canonical.strip_prefix("refs/heads/") {
            return Ok(Self::branch(name, target));
        }
        if let Some(name) = canonical.strip_prefix("refs/tags/") {
            return Ok(Self::tag(name, target));
        }
        if let Some(rest) = canonical.strip_prefix("refs/remotes/") {
            if let Some((remote, branch)) = rest.split_once('/') {
                return Ok(Self::Remote {
                    remote: remote.to_string(),
                    branch: branch.to_string(),
                    target,
                });
            }
        }
        Err(RefError::InvalidName {
            name: canonical.to_string(),
            reason: "expected refs/heads/, refs/tags/ or refs/remotes/<remote>/".into(),
        })
    }

    /// Returns the canonical name for this ref (e.g. "refs/heads/main").
    pub fn canonical_name(&self) -> String {
        match self {
            Ref::Branch { name, .. } => format!("refs/heads/{name}"),
            Ref::Tag { name, .. } => format!("refs/tags/{name}"),
            Ref::Remote { remote, branch, .. } => format!("refs/remotes/{remote}/{branch}"),
        }
    }

    /// Returns the short name of this ref (without the refs/ prefix).
    pub fn short_name(&self) -> &str {
        match self {
            Ref::Branch { name, .. } | Ref::Tag { name, .. } => name,
            Ref::Remote { branch, .. } => branch,
        }
    }

    /// The block this ref points at.
    pub fn target(&self) -> ObjectId {
        match self {
            Ref::Branch { target, .. } | Ref::Tag { target, .. } | Ref::Remote { target, .. } => {
                *target
            }
        }
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Ref::Tag { .. })
    }

    /// The same ref pointed at a different block.
    pub fn with_target(&self, target: ObjectId) -> Self {
        match self {
            Ref::Branch { name, .. } => Ref::branch(name.clone(), target),
            Ref::Tag { name, .. } => Ref::tag(name.clone(), target),
            Ref::Remote { remote, branch, .. } => Ref::Remote {
                remote: remote.clone(),
                branch: branch.clone(),
                target,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_inverts_canonical_name() {
        let target = ObjectId::from_bytes(b"tip");
        for name in [
            "refs/heads/coins/gold",
            "refs/tags/genesis",
            "refs/remotes/origin/coins/gold",
        ] {
            let r = Ref::parse(name, target).unwrap();
            assert_eq!(r.canonical_name(), name);
            assert_eq!(r.target(), target);
        }
    }

    #[test]
    fn remote_splits_on_first_slash() {
        let r = Ref::parse("refs/remotes/origin/coins/gold", ObjectId::null()).unwrap();
        assert_eq!(r.short_name(), "coins/gold");
        assert!(matches!(r, Ref::Remote { ref remote, .. } if remote == "origin"));
    }

    #[test]
    fn parse_rejects_unknown_namespace() {
        assert!(Ref::parse("HEAD", ObjectId::null()).is_err());
        assert!(Ref::parse("refs/notes/x", ObjectId::null()).is_err());
        assert!(Ref::parse("refs/remotes/origin", ObjectId::null()).is_err());
    }

    #[test]
    fn with_target_keeps_name() {
        let r = Ref::tag("genesis", ObjectId::null());
        let moved = r.with_target(ObjectId::from_bytes(b"g"));
        assert_eq!(moved.canonical_name(), "refs/tags/genesis");
        assert!(moved.is_tag());
    }
}
