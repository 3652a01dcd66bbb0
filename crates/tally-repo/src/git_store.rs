use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tally_store::BlockObject;
use tally_types::ObjectId;
use tracing::{debug, info};

use crate::block::{Block, BlockDraft};
use crate::error::{RepoError, RepoResult};
use crate::git::GitCli;
use crate::traits::ObjectStore;

/// [`ObjectStore`] backed by a git repository: trees are git trees, blocks
/// are git commits, refs are git refs.
#[derive(Debug, Clone)]
pub struct GitObjectStore {
    git: GitCli,
}

impl GitObjectStore {
    /// Use the repository whose working tree is `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_cli(GitCli::new(dir))
    }

    pub fn with_cli(git: GitCli) -> Self {
        Self { git }
    }

    pub fn git(&self) -> &GitCli {
        &self.git
    }

    async fn object_count(&self) -> RepoResult<usize> {
        let out = self.git.run(&["count-objects", "-v"]).await?;
        let mut total = 0;
        for line in out.lines() {
            if let Some(("count" | "in-pack", n)) = line.split_once(':') {
                total += n
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| RepoError::Parse(line.to_string()))?;
            }
        }
        Ok(total)
    }
}

/// Parse a hex object id printed by git.
pub fn parse_id(stdout: &str) -> RepoResult<ObjectId> {
    let hex = stdout.trim();
    ObjectId::from_hex(hex).map_err(|e| RepoError::Parse(format!("{hex:?}: {e}")))
}

/// Per-invocation identity, in place of git config or process environment.
fn identity_env(draft: &BlockDraft) -> Vec<(&'static str, String)> {
    let author = draft.author();
    let committer = draft.committer();
    vec![
        ("GIT_AUTHOR_NAME", author.person.name),
        ("GIT_AUTHOR_EMAIL", author.person.email),
        ("GIT_AUTHOR_DATE", format!("@{}", author.time.encode())),
        ("GIT_COMMITTER_NAME", committer.person.name),
        ("GIT_COMMITTER_EMAIL", committer.person.email),
        ("GIT_COMMITTER_DATE", format!("@{}", committer.time.encode())),
    ]
}

#[async_trait]
impl ObjectStore for GitObjectStore {
    async fn compute_tree_hash(&self, directory: &Path) -> RepoResult<ObjectId> {
        let git = self.git.at(directory);
        git.run(&["add", "-A"]).await?;
        parse_id(&git.run(&["write-tree"]).await?)
    }

    async fn create_block(&self, draft: &BlockDraft) -> RepoResult<ObjectId> {
        let tree = draft.tree.to_hex();
        let parents: Vec<String> = draft.parents.iter().map(ObjectId::to_hex).collect();
        let mut args = vec!["commit-tree", tree.as_str()];
        for parent in &parents {
            args.push("-p");
            args.push(parent);
        }
        args.extend(["-F", "-"]);

        let out = self
            .git
            .run_with(&args, &identity_env(draft), Some(draft.message.as_bytes()))
            .await
            .map_err(|e| RepoError::ObjectWrite(e.to_string()))?;
        let hash = parse_id(&out)?;
        debug!(block = %hash, parents = draft.parents.len(), "commit written");
        Ok(hash)
    }

    async fn read_block(&self, hash: &ObjectId) -> RepoResult<Option<Block>> {
        let hex = hash.to_hex();
        let kind = self.git.output(&["cat-file", "-t", &hex], &[], None).await?;
        if !kind.success() {
            return Ok(None);
        }
        if kind.stdout.trim() != "commit" {
            return Err(RepoError::NotABlock(*hash));
        }
        let text = self.git.run(&["cat-file", "commit", &hex]).await?;
        let object = BlockObject::decode(&text)?;
        Ok(Some(Block::from_object(*hash, object)))
    }

    async fn resolve_ref(&self, name: &str) -> RepoResult<Option<ObjectId>> {
        let peeled = format!("{name}^{{commit}}");
        let out = self
            .git
            .output(&["rev-parse", "--verify", "-q", &peeled], &[], None)
            .await?;
        if !out.success() {
            return Ok(None);
        }
        Ok(Some(parse_id(&out.stdout)?))
    }

    async fn advance_ref(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        to: ObjectId,
    ) -> RepoResult<bool> {
        let new = to.to_hex();
        // An empty old value means "must not exist yet".
        let old = expected.map(|id| id.to_hex()).unwrap_or_default();
        let out = self
            .git
            .output(&["update-ref", name, &new, &old], &[], None)
            .await?;
        if !out.success() {
            debug!(ref_name = name, stderr = out.stderr.trim(), "update-ref refused");
        }
        Ok(out.success())
    }

    async fn garbage_collect(&self) -> RepoResult<usize> {
        let before = self.object_count().await?;
        self.git.run(&["gc", "--prune=now", "--quiet"]).await?;
        let removed = before.saturating_sub(self.object_count().await?);
        if removed > 0 {
            info!(removed, "git gc pruned objects");
        }
        Ok(removed)
    }
}
