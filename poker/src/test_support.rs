//! Test-only fakes for the reconciler's I/O seams, plus a real-git fixture.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;

use crate::io::docker::ContainerRuntime;
use crate::io::git::SourceControl;
use crate::io::shell::{ShellRequest, ShellRunner};
use crate::manifest::MANIFEST_FILE_NAME;

/// Source-control call recorded by [`ScriptedSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Clone { url: String, dest: PathBuf },
    Fetch(PathBuf),
    Compare(PathBuf),
    Merge(PathBuf),
}

#[derive(Debug, Clone)]
struct ScriptedRepository {
    manifest: String,
    upstream: Option<String>,
}

#[derive(Debug, Default)]
struct ScriptedState {
    repositories: HashMap<String, ScriptedRepository>,
    origins: HashMap<PathBuf, String>,
    calls: Vec<SourceCall>,
}

/// In-memory [`SourceControl`]: "cloning" writes the scripted manifest into the
/// destination, and a pushed upstream manifest is what "merging" writes.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    state: Mutex<ScriptedState>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a remote repository whose clone contains `manifest`.
    pub fn with_repository(self, url: &str, manifest: &str) -> Self {
        self.lock().repositories.insert(
            url.to_string(),
            ScriptedRepository {
                manifest: manifest.to_string(),
                upstream: None,
            },
        );
        self
    }

    /// Make `manifest` the next upstream revision of `url`.
    pub fn push_upstream(&self, url: &str, manifest: &str) {
        if let Some(repo) = self.lock().repositories.get_mut(url) {
            repo.upstream = Some(manifest.to_string());
        }
    }

    /// Register an existing clone at `repo_dir` as tracking `url`.
    pub fn adopt(&self, repo_dir: &Path, url: &str) {
        self.lock()
            .origins
            .insert(repo_dir.to_path_buf(), url.to_string());
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.lock().calls.clone()
    }

    pub fn clone_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SourceCall::Clone { .. }))
            .count()
    }

    pub fn merge_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SourceCall::Merge(_)))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedState> {
        self.state.lock().expect("scripted source lock")
    }

    fn url_for(state: &ScriptedState, repo_dir: &Path) -> Result<String> {
        state
            .origins
            .get(repo_dir)
            .cloned()
            .ok_or_else(|| anyhow!("not a git repository: {}", repo_dir.display()))
    }
}

impl SourceControl for ScriptedSource {
    fn clone_repository(&self, url: &str, dest: &Path) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(SourceCall::Clone {
            url: url.to_string(),
            dest: dest.to_path_buf(),
        });
        let repo = state
            .repositories
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("repository '{url}' not found"))?;
        fs::create_dir_all(dest).with_context(|| format!("create {}", dest.display()))?;
        fs::write(dest.join(MANIFEST_FILE_NAME), &repo.manifest).context("write manifest")?;
        state.origins.insert(dest.to_path_buf(), url.to_string());
        Ok(())
    }

    fn fetch_remote(&self, repo_dir: &Path) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(SourceCall::Fetch(repo_dir.to_path_buf()));
        Self::url_for(&state, repo_dir)?;
        Ok(())
    }

    fn merge_fast_forward(&self, repo_dir: &Path) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(SourceCall::Merge(repo_dir.to_path_buf()));
        let url = Self::url_for(&state, repo_dir)?;
        let repo = state
            .repositories
            .get_mut(&url)
            .ok_or_else(|| anyhow!("repository '{url}' not found"))?;
        if let Some(manifest) = repo.upstream.take() {
            repo.manifest = manifest;
            fs::write(repo_dir.join(MANIFEST_FILE_NAME), &repo.manifest)
                .context("write manifest")?;
        }
        Ok(())
    }

    fn has_upstream_changes(&self, repo_dir: &Path) -> Result<bool> {
        let mut state = self.lock();
        state.calls.push(SourceCall::Compare(repo_dir.to_path_buf()));
        let url = Self::url_for(&state, repo_dir)?;
        Ok(state
            .repositories
            .get(&url)
            .is_some_and(|repo| repo.upstream.is_some()))
    }

    fn origin_url(&self, repo_dir: &Path) -> Result<String> {
        Self::url_for(&self.lock(), repo_dir)
    }
}

/// [`ShellRunner`] that records requests instead of spawning them.
#[derive(Debug, Default)]
pub struct RecordingShell {
    requests: Mutex<Vec<ShellRequest>>,
    fail_on: Option<String>,
}

impl RecordingShell {
    /// Shell whose invocation of exactly `command` exits non-zero.
    pub fn failing_on(command: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_on: Some(command.to_string()),
        }
    }

    pub fn requests(&self) -> Vec<ShellRequest> {
        self.requests.lock().expect("recording shell lock").clone()
    }

    /// Recorded command strings in call order.
    pub fn commands(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.command)
            .collect()
    }
}

impl ShellRunner for RecordingShell {
    fn run(&self, request: &ShellRequest) -> Result<()> {
        self.requests
            .lock()
            .expect("recording shell lock")
            .push(request.clone());
        if self.fail_on.as_deref() == Some(request.command.as_str()) {
            bail!("`{}` exited with status Some(1)", request.command);
        }
        Ok(())
    }
}

/// [`ContainerRuntime`] with a fixed container list.
#[derive(Debug, Clone, Default)]
pub struct StaticContainers(pub Vec<String>);

impl ContainerRuntime for StaticContainers {
    fn list_container_names(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// A bare git repository ("origin") backed by a working clone used to push commits.
pub struct TestOrigin {
    _temp: TempDir,
    work: PathBuf,
    bare: PathBuf,
}

impl TestOrigin {
    /// Create an origin on branch `main` whose first commit holds `manifest`.
    pub fn new(manifest: &str) -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let work = temp.path().join("work");
        let bare = temp.path().join("origin.git");
        fs::create_dir(&work).context("create work dir")?;

        git(&work, &["init", "-q"])?;
        git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        git(&work, &["config", "user.name", "Poker Test"])?;
        git(&work, &["config", "user.email", "poker-test@local.invalid"])?;
        git(&work, &["config", "commit.gpgsign", "false"])?;
        fs::write(work.join(MANIFEST_FILE_NAME), manifest).context("write manifest")?;
        git(&work, &["add", "-A"])?;
        git(&work, &["commit", "-q", "-m", "chore: initial manifest"])?;

        let bare_arg = bare.to_string_lossy().to_string();
        git(temp.path(), &["clone", "-q", "--bare", "work", &bare_arg])?;
        git(&work, &["remote", "add", "origin", &bare_arg])?;

        Ok(Self {
            _temp: temp,
            work,
            bare,
        })
    }

    pub fn url(&self) -> String {
        self.bare.to_string_lossy().to_string()
    }

    /// Commit `contents` at `path` and push it to the origin.
    pub fn commit_file(&self, path: &str, contents: &str, message: &str) -> Result<()> {
        let target = self.work.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&target, contents).with_context(|| format!("write {}", target.display()))?;
        git(&self.work, &["add", "-A"])?;
        git(&self.work, &["commit", "-q", "-m", message])?;
        git(&self.work, &["push", "-q", "origin", "main"])?;
        Ok(())
    }

    pub fn head_sha(&self) -> Result<String> {
        Ok(git(&self.work, &["rev-parse", "HEAD"])?.trim().to_string())
    }
}

fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("run git {args:?}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {:?} failed: {}", args, stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
