//! Shell execution for manifest lifecycle commands.
//!
//! Manifest commands are opaque shell strings (pipes, redirects), so they run
//! through `sh -c`. The environment is handed to the child as a structured map
//! rather than spliced into the command text.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::process::run_command;

pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 100_000;

/// One shell invocation of a lifecycle command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRequest {
    /// Working directory for the child (the service repository).
    pub workdir: PathBuf,
    /// Ordered environment assignments added on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Opaque shell command text.
    pub command: String,
}

/// Abstraction over shell execution so lifecycle tests never spawn processes.
pub trait ShellRunner {
    /// Run the request to completion. A non-zero exit is an error.
    fn run(&self, request: &ShellRequest) -> Result<()>;
}

/// [`ShellRunner`] that spawns `sh -c`.
#[derive(Debug, Clone)]
pub struct SystemShell {
    pub timeout: Option<Duration>,
    pub output_limit_bytes: usize,
}

impl Default for SystemShell {
    fn default() -> Self {
        Self {
            timeout: None,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl ShellRunner for SystemShell {
    #[instrument(skip_all, fields(workdir = %request.workdir.display()))]
    fn run(&self, request: &ShellRequest) -> Result<()> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&request.command)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&request.workdir);

        let output = run_command(cmd, self.timeout, self.output_limit_bytes)
            .with_context(|| format!("run `{}`", request.command))?;

        let stdout = output.stdout_lossy();
        let stderr = output.stderr_lossy();
        if !stdout.trim().is_empty() {
            info!(stdout = %stdout.trim_end(), "command output");
        }
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim_end(), "command stderr");
        }

        if output.timed_out {
            return Err(anyhow!(
                "`{}` timed out after {:?}",
                request.command,
                self.timeout.unwrap_or_default()
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "command failed");
            return Err(anyhow!(
                "`{}` exited with status {:?}: {}",
                request.command,
                output.status.code(),
                stderr.trim()
            ));
        }
        Ok(())
    }
}
