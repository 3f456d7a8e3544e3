//! Lifecycle command execution for a single service.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::environment::{build_environment, render_invocation};
use crate::core::types::LifecycleCommand;
use crate::io::shell::{ShellRequest, ShellRunner};
use crate::manifest::Manifest;

/// What happened to a lifecycle command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The manifest declares no such command.
    NotDeclared,
    /// Dry-run: the composed invocation was logged, nothing was spawned.
    DryRun { invocation: String },
    /// The command ran and exited successfully.
    Executed,
}

/// Runs manifest lifecycle commands with the service environment applied.
#[derive(Debug, Clone)]
pub struct CommandProcessor<R> {
    runner: R,
    host_services_root: PathBuf,
    dry_run: bool,
}

impl<R: ShellRunner> CommandProcessor<R> {
    pub fn new(runner: R, host_services_root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            runner,
            host_services_root: host_services_root.into(),
            dry_run,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `command` for a service whose clone lives at `repository_dir`.
    ///
    /// A command missing from the manifest is a logged no-op. A non-zero exit
    /// is returned as an error.
    #[instrument(skip_all, fields(service = service_id, command = %command))]
    pub fn run_lifecycle_command(
        &self,
        service_id: &str,
        manifest: &Manifest,
        repository_dir: &Path,
        command: LifecycleCommand,
    ) -> Result<CommandOutcome> {
        let Some(shell) = manifest.command(command) else {
            info!("no `{command}` command declared in manifest");
            return Ok(CommandOutcome::NotDeclared);
        };

        let env = build_environment(service_id, manifest, &self.host_services_root);
        let invocation = render_invocation(&env, shell);

        if self.dry_run {
            info!(%invocation, "dry run, not executing");
            return Ok(CommandOutcome::DryRun { invocation });
        }

        info!(%invocation, "executing");
        self.runner
            .run(&ShellRequest {
                workdir: repository_dir.to_path_buf(),
                env,
                command: shell.to_string(),
            })
            .with_context(|| format!("`{command}` command failed"))?;
        Ok(CommandOutcome::Executed)
    }
}
