//! Upstream VCS access
//!
//! The upstream is driven through the `git` binary; exit status 0
//! means success and stdout is consumed as text. The poller owns the
//! working clone exclusively, so nothing here takes locks.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::GitError;

/// A working clone of one game's upstream repository.
#[derive(Debug)]
pub struct GitRepo {
    dir: PathBuf,
}

impl GitRepo {
    /// Wrap an existing clone.
    pub fn open<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Clone `url` into `dir`.
    pub fn clone_from<P: Into<PathBuf>>(url: &str, dir: P) -> Result<Self, GitError> {
        let dir = dir.into();
        run_git("clone", |cmd| {
            cmd.arg("clone").arg(url).arg(&dir);
        })?;
        Ok(Self { dir })
    }

    /// Directory of the working tree.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fetch all refs and tags from the upstream.
    pub fn fetch_tags(&self) -> Result<(), GitError> {
        self.run("fetch", &["fetch", "--tags"]).map(|_| ())
    }

    /// The newest `max` first-parent revisions reachable from the
    /// default branch tip, newest first.
    pub fn recent_revisions(&self, max: u32) -> Result<Vec<String>, GitError> {
        let out = self.run(
            "rev-list",
            &[
                "rev-list",
                "--first-parent",
                &format!("--max-count={max}"),
                "origin/HEAD",
            ],
        )?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// The tag pointing at `rev`, if any. When several tags point at
    /// the same revision the first one reported wins.
    pub fn tag_at(&self, rev: &str) -> Result<Option<String>, GitError> {
        let out = self.run("tag", &["tag", "--points-at", rev])?;
        Ok(out.lines().next().map(str::to_string))
    }

    /// Hard-reset the working tree to `target` (a revision or tag).
    pub fn reset_hard(&self, target: &str) -> Result<(), GitError> {
        self.run("reset", &["reset", "--hard", target]).map(|_| ())
    }

    /// Commit depth of HEAD from the root commit.
    pub fn commit_depth(&self) -> Result<u64, GitError> {
        let out = self.run("rev-list", &["rev-list", "--count", "HEAD"])?;
        let trimmed = out.trim();
        trimmed
            .parse()
            .map_err(|_| GitError::UnexpectedOutput {
                command: "rev-list --count".to_string(),
                output: trimmed.to_string(),
            })
    }

    fn run(&self, name: &str, args: &[&str]) -> Result<String, GitError> {
        run_git(name, |cmd| {
            cmd.arg("-C").arg(&self.dir).args(args);
        })
    }
}

fn run_git(name: &str, configure: impl FnOnce(&mut Command)) -> Result<String, GitError> {
    let mut cmd = Command::new("git");
    configure(&mut cmd);

    debug!("Running {cmd:?}");
    let output = cmd.output().map_err(GitError::Spawn)?;

    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command: name.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    String::from_utf8(output.stdout).map_err(|_| GitError::BadOutput {
        command: name.to_string(),
    })
}
