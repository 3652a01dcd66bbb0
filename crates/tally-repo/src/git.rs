//! Thin async wrapper over the `git` executable.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::trace;

use crate::error::{RepoError, RepoResult};

/// Captured result of one git invocation.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs git commands inside one working directory.
///
/// Extra environment variables are applied to the child process only, so
/// per-block identity never leaks into the parent environment.
#[derive(Debug, Clone)]
pub struct GitCli {
    dir: PathBuf,
    program: PathBuf,
}

impl GitCli {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The same executable, working in `dir`.
    pub fn at(&self, dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            program: self.program.clone(),
        }
    }

    /// Whether a usable git executable is available.
    pub async fn available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Run and capture output whatever the exit status.
    pub async fn output(
        &self,
        args: &[&str],
        env: &[(&str, String)],
        stdin: Option<&[u8]>,
    ) -> RepoResult<GitOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(&self.dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input).await?;
            pipe.shutdown().await?;
        }
        let out = child.wait_with_output().await?;
        let output = GitOutput {
            code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        };
        trace!(dir = %self.dir.display(), ?args, code = ?output.code, "git");
        Ok(output)
    }

    /// Run with extra environment and optional stdin; non-zero exit is an
    /// error. Returns stdout.
    pub async fn run_with(
        &self,
        args: &[&str],
        env: &[(&str, String)],
        stdin: Option<&[u8]>,
    ) -> RepoResult<String> {
        let output = self.output(args, env, stdin).await?;
        if !output.success() {
            return Err(RepoError::Git {
                command: args.join(" "),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Run; non-zero exit is an error. Returns stdout.
    pub async fn run(&self, args: &[&str]) -> RepoResult<String> {
        self.run_with(args, &[], None).await
    }
}
