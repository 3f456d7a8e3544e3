//! Git adapter for service repositories.
//!
//! Every call runs `git` with an explicit working directory; nothing here
//! touches the process-wide current directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Remote-tracking ref the local clone is compared against and merged from.
const UPSTREAM_REF: &str = "origin/HEAD";

/// Source-control operations the service lifecycle depends on.
///
/// Each operation is indivisible from the caller's point of view and fails
/// with a propagated error on a non-zero exit.
pub trait SourceControl {
    /// Clone `url` into `dest` (which must not exist yet).
    fn clone_repository(&self, url: &str, dest: &Path) -> Result<()>;
    /// Fetch remote changes into the clone at `repo_dir`.
    fn fetch_remote(&self, repo_dir: &Path) -> Result<()>;
    /// Fast-forward the local head to the fetched upstream.
    fn merge_fast_forward(&self, repo_dir: &Path) -> Result<()>;
    /// True iff upstream has commits not yet reachable from the local head.
    fn has_upstream_changes(&self, repo_dir: &Path) -> Result<bool>;
    /// URL of the `origin` remote.
    fn origin_url(&self, repo_dir: &Path) -> Result<String>;
}

/// [`SourceControl`] backed by the `git` CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl SourceControl for GitCli {
    #[instrument(skip_all, fields(url = %url, dest = %dest.display()))]
    fn clone_repository(&self, url: &str, dest: &Path) -> Result<()> {
        let parent = dest
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let name = dest
            .file_name()
            .ok_or_else(|| anyhow!("clone destination has no name: {}", dest.display()))?
            .to_string_lossy();
        debug!("cloning repository");
        Git::new(parent).run_checked(&["clone", "-q", url, &name])?;
        Ok(())
    }

    fn fetch_remote(&self, repo_dir: &Path) -> Result<()> {
        Git::new(repo_dir).fetch_origin()
    }

    fn merge_fast_forward(&self, repo_dir: &Path) -> Result<()> {
        Git::new(repo_dir).merge_upstream()
    }

    fn has_upstream_changes(&self, repo_dir: &Path) -> Result<bool> {
        Git::new(repo_dir).has_upstream_commits()
    }

    fn origin_url(&self, repo_dir: &Path) -> Result<String> {
        Git::new(repo_dir).origin_url()
    }
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    #[instrument(skip_all, fields(workdir = %self.workdir.display()))]
    pub fn fetch_origin(&self) -> Result<()> {
        debug!("fetching origin");
        self.run_checked(&["fetch", "-q", "origin"])?;
        Ok(())
    }

    #[instrument(skip_all, fields(workdir = %self.workdir.display()))]
    pub fn merge_upstream(&self) -> Result<()> {
        debug!(upstream = UPSTREAM_REF, "fast-forwarding");
        self.run_checked(&["merge", "-q", "--ff-only", UPSTREAM_REF])?;
        Ok(())
    }

    /// True if `HEAD..origin/HEAD` lists at least one commit.
    pub fn has_upstream_commits(&self) -> Result<bool> {
        let range = format!("HEAD..{UPSTREAM_REF}");
        let out = self.run_capture(&["log", "--pretty=format:%H", "-1", &range])?;
        let changed = !out.trim().is_empty();
        debug!(changed, "upstream comparison");
        Ok(changed)
    }

    /// Return the `origin` remote URL (errors when missing or empty).
    pub fn origin_url(&self) -> Result<String> {
        let out = self.run_capture(&["remote", "get-url", "origin"])?;
        let url = out.trim().to_string();
        if url.is_empty() {
            return Err(anyhow!(
                "empty origin url in {}",
                self.workdir.display()
            ));
        }
        Ok(url)
    }

    /// Return the current HEAD SHA.
    pub fn head_sha(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestOrigin;

    #[test]
    fn clone_then_detect_and_merge_upstream_commit() {
        let origin = TestOrigin::new("configuration:\n  commands:\n    run: echo run\n")
            .expect("origin");
        let temp = tempfile::tempdir().expect("tempdir");
        let clone_dir = temp.path().join("_repository");

        GitCli
            .clone_repository(&origin.url(), &clone_dir)
            .expect("clone");
        assert_eq!(GitCli.origin_url(&clone_dir).expect("origin url"), origin.url());

        GitCli.fetch_remote(&clone_dir).expect("fetch");
        assert!(!GitCli.has_upstream_changes(&clone_dir).expect("compare"));

        origin
            .commit_file("README.md", "hello\n", "docs: readme")
            .expect("commit");
        GitCli.fetch_remote(&clone_dir).expect("fetch");
        assert!(GitCli.has_upstream_changes(&clone_dir).expect("compare"));

        GitCli.merge_fast_forward(&clone_dir).expect("merge");
        assert!(!GitCli.has_upstream_changes(&clone_dir).expect("compare"));
        assert!(clone_dir.join("README.md").exists());
        assert_eq!(
            Git::new(&clone_dir).head_sha().expect("head"),
            origin.head_sha().expect("origin head")
        );
    }

    #[test]
    fn origin_url_errors_without_remote() {
        let temp = tempfile::tempdir().expect("tempdir");
        Command::new("git")
            .args(["init", "-q"])
            .current_dir(temp.path())
            .status()
            .expect("git init");

        let err = GitCli.origin_url(temp.path()).unwrap_err();
        assert!(err.to_string().contains("git remote get-url origin failed"));
    }
}
