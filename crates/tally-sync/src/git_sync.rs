use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tally_repo::git_store::parse_id;
use tally_repo::{GitCli, RepoError};
use tally_types::ObjectId;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::traits::RemoteSync;

const REMOTE_NAME: &str = "origin";

/// Stderr fragments git prints when a push loses a race.
const STALE_PUSH_MARKERS: [&str; 3] = ["rejected", "non-fast-forward", "fetch first"];

/// [`RemoteSync`] for a git mirror, driving the `git` executable against a
/// git origin.
#[derive(Debug, Clone)]
pub struct GitSync {
    git: GitCli,
    origin: String,
    branch: String,
    genesis_ref: String,
}

impl GitSync {
    /// `workdir` is the mirror's working tree; `origin` is anything
    /// `git remote add` accepts.
    pub fn new(
        workdir: impl Into<PathBuf>,
        origin: impl Into<String>,
        branch: impl Into<String>,
        genesis_ref: impl Into<String>,
    ) -> Self {
        Self::with_cli(GitCli::new(workdir), origin, branch, genesis_ref)
    }

    pub fn with_cli(
        git: GitCli,
        origin: impl Into<String>,
        branch: impl Into<String>,
        genesis_ref: impl Into<String>,
    ) -> Self {
        Self {
            git,
            origin: origin.into(),
            branch: branch.into(),
            genesis_ref: genesis_ref.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        self.git.dir()
    }

    pub fn branch_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    fn tracking_ref(&self) -> String {
        format!("refs/remotes/{REMOTE_NAME}/{}", self.branch)
    }

    /// Run a command that talks to the origin, reporting failure as a
    /// remote error.
    async fn remote(&self, args: &[&str]) -> SyncResult<String> {
        self.git.run(args).await.map_err(|e| match e {
            RepoError::Git { command, stderr, .. } => {
                SyncError::RemoteError(format!("git {command}: {stderr}"))
            }
            other => other.into(),
        })
    }

    /// Where the origin's `name` points, if it exists.
    async fn ls_remote(&self, name: &str) -> SyncResult<Option<ObjectId>> {
        let out = self.remote(&["ls-remote", REMOTE_NAME, name]).await?;
        match out.lines().next().and_then(|line| line.split_whitespace().next()) {
            Some(hex) => Ok(Some(parse_id(hex)?)),
            None => Ok(None),
        }
    }

    async fn ensure_repository(&self) -> SyncResult<()> {
        let dir = self.git.dir();
        if !dir.join(".git").exists() {
            std::fs::create_dir_all(dir)?;
            self.git.run(&["init", "-q"]).await?;
        }
        let current = self
            .git
            .output(&["remote", "get-url", REMOTE_NAME], &[], None)
            .await?;
        if !current.success() {
            self.git.run(&["remote", "add", REMOTE_NAME, &self.origin]).await?;
        } else if current.stdout.trim() != self.origin {
            self.git
                .run(&["remote", "set-url", REMOTE_NAME, &self.origin])
                .await?;
        }
        Ok(())
    }

    /// Fetch the origin's branch into the tracking ref, if the origin has it.
    async fn fetch(&self) -> SyncResult<Option<ObjectId>> {
        let Some(remote_tip) = self.ls_remote(&self.branch_ref()).await? else {
            return Ok(None);
        };
        let refspec = format!("+{}:{}", self.branch_ref(), self.tracking_ref());
        self.remote(&["fetch", "-q", REMOTE_NAME, &refspec]).await?;
        Ok(Some(remote_tip))
    }

    async fn has_branch(&self) -> SyncResult<bool> {
        let out = self
            .git
            .output(&["rev-parse", "--verify", "-q", &self.branch_ref()], &[], None)
            .await?;
        Ok(out.success())
    }

    /// Uncommitted or untracked changes in the working tree.
    async fn has_edits(&self) -> SyncResult<bool> {
        let status = self
            .git
            .run(&["status", "--porcelain", "--untracked-files=all"])
            .await?;
        Ok(!status.trim().is_empty())
    }

    async fn discard_changes(&self) -> SyncResult<()> {
        self.git.run(&["reset", "--hard", "-q"]).await?;
        self.git.run(&["clean", "-fdq"]).await?;
        Ok(())
    }

    async fn head(&self) -> SyncResult<ObjectId> {
        Ok(parse_id(&self.git.run(&["rev-parse", "HEAD"]).await?)?)
    }
}

#[async_trait]
impl RemoteSync for GitSync {
    async fn attach(&self) -> SyncResult<ObjectId> {
        self.ensure_repository().await?;
        let genesis = self
            .ls_remote(&self.genesis_ref)
            .await?
            .ok_or_else(|| SyncError::GenesisMissing(self.genesis_ref.clone()))?;
        let refspec = format!("+{0}:{0}", self.genesis_ref);
        self.remote(&["fetch", "-q", REMOTE_NAME, &refspec]).await?;

        let tip = self.fetch().await?.unwrap_or(genesis);
        let tip_hex = tip.to_hex();
        let branch_ref = self.branch_ref();
        let dirty = self.has_branch().await? && self.has_edits().await?;
        self.git.run(&["update-ref", &branch_ref, &tip_hex]).await?;
        self.git.run(&["symbolic-ref", "HEAD", &branch_ref]).await?;
        if dirty {
            // Index follows the tip, files stay for the next block.
            self.git.run(&["reset", "-q", &tip_hex]).await?;
            warn!(%tip, "working tree has edits; moved branch only");
        } else {
            self.git.run(&["reset", "--hard", "-q", &tip_hex]).await?;
            self.git.run(&["clean", "-fdq"]).await?;
        }
        info!(branch = %self.branch, %genesis, %tip, "git mirror attached");
        Ok(tip)
    }

    async fn synchronize(&self) -> SyncResult<ObjectId> {
        self.discard_changes().await?;
        if self.fetch().await?.is_some() {
            let tracking = self.tracking_ref();
            self.git.run(&["reset", "--hard", "-q", &tracking]).await?;
        }
        let tip = self.head().await?;
        debug!(branch = %self.branch, %tip, "synchronized");
        Ok(tip)
    }

    async fn push(&self, local_head: ObjectId) -> SyncResult<bool> {
        let refspec = format!("{}:{}", local_head.to_hex(), self.branch_ref());
        let out = self
            .git
            .output(&["push", "-q", REMOTE_NAME, &refspec], &[], None)
            .await?;
        if out.success() {
            return Ok(true);
        }
        if STALE_PUSH_MARKERS.iter().any(|m| out.stderr.contains(m)) {
            debug!(%local_head, "push rejected as non-fast-forward");
            return Ok(false);
        }
        Err(SyncError::RemoteError(format!(
            "git push: {}",
            out.stderr.trim()
        )))
    }
}
