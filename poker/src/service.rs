//! Per-service lifecycle: provisioning, source updates and lifecycle commands.
//!
//! A service moves through its states only from its own create-or-update pass:
//!
//! - create (service dir absent): `initializing` → `provisioning` →
//!   `executing-setup` → `executing-run` → `running`
//! - update (service dir present, upstream changed): `executing-teardown` →
//!   `executing-setup` → `executing-run` → `running`
//!
//! Any failing step leaves `error:<message>` for the rest of the pass; the next
//! pass retries from whatever is on disk. `running` is provisional until the
//! container status refresh confirms or corrects it.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{info, instrument, warn};

use crate::command::CommandProcessor;
use crate::core::types::{LifecycleCommand, StatusLabel};
use crate::io::git::SourceControl;
use crate::io::layout::{ServicePaths, create_service_dir, ensure_declared_dirs};
use crate::io::manifest_store::load_manifest;
use crate::io::shell::ShellRunner;
use crate::manifest::Manifest;
use crate::view::StatusCell;

/// What a successful create-or-update pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Created,
    Updated,
    Unchanged,
}

/// The engine's runtime record of one service.
#[derive(Debug)]
pub struct Service {
    id: String,
    repository_url: String,
    paths: ServicePaths,
    manifest: Option<Manifest>,
    status: StatusCell,
}

impl Service {
    /// New service for a declared entry, rooted at `<services_root>/<id>`.
    pub fn new(id: impl Into<String>, repository_url: impl Into<String>, services_root: &Path) -> Self {
        let id = id.into();
        Self {
            paths: ServicePaths::new(services_root, &id),
            id,
            repository_url: repository_url.into(),
            manifest: None,
            status: StatusCell::default(),
        }
    }

    /// Rebuild a service from an existing service directory.
    ///
    /// The id is the directory name and the repository URL comes from the
    /// clone's `origin` remote. The manifest is loaded best-effort.
    pub fn restore<S: SourceControl>(service_dir: &Path, source: &S) -> Result<Self> {
        let id = service_dir
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("invalid service dir name {}", service_dir.display()))?
            .to_string();
        let paths = ServicePaths::from_service_dir(service_dir);
        if !paths.repository_dir.is_dir() {
            bail!(
                "service repository has not been initialized in {}",
                paths.repository_dir.display()
            );
        }
        let repository_url = source.origin_url(&paths.repository_dir).with_context(|| {
            format!(
                "unable to get origin url of repository in {}",
                paths.repository_dir.display()
            )
        })?;

        let manifest = match load_manifest(&id, &paths.repository_dir) {
            Ok(manifest) => Some(manifest),
            Err(err) => {
                warn!(service = %id, err = %format!("{err:#}"), "restored without manifest");
                None
            }
        };

        Ok(Self {
            id,
            repository_url,
            paths,
            manifest,
            status: StatusCell::default(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    pub fn service_dir(&self) -> &Path {
        &self.paths.service_dir
    }

    pub fn repository_dir(&self) -> &Path {
        &self.paths.repository_dir
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// Container to match against the runtime; the id until a manifest says otherwise.
    pub fn container_name(&self) -> &str {
        self.manifest
            .as_ref()
            .map(|m| m.container_name.as_str())
            .unwrap_or(&self.id)
    }

    pub fn status(&self) -> StatusLabel {
        self.status.get()
    }

    pub fn status_cell(&self) -> &StatusCell {
        &self.status
    }

    /// Provision the service if its directory is absent, otherwise update it.
    ///
    /// On failure the status becomes `error:<message>` and the error is returned.
    #[instrument(skip_all, fields(service = %self.id))]
    pub fn create_or_update<S: SourceControl, R: ShellRunner>(
        &mut self,
        source: &S,
        processor: &CommandProcessor<R>,
    ) -> Result<PassOutcome> {
        let result = if self.paths.service_dir.exists() {
            self.update(source, processor)
        } else {
            self.create(source, processor)
        };
        if let Err(err) = &result {
            self.status.set(StatusLabel::Error(format!("{err:#}")));
        }
        result
    }

    fn create<S: SourceControl, R: ShellRunner>(
        &mut self,
        source: &S,
        processor: &CommandProcessor<R>,
    ) -> Result<PassOutcome> {
        info!(dir = %self.paths.service_dir.display(), "creating service");
        self.status.set(StatusLabel::Provisioning);

        create_service_dir(&self.paths.service_dir)?;
        info!(url = %self.repository_url, "cloning source repository");
        source.clone_repository(&self.repository_url, &self.paths.repository_dir)?;

        let manifest = self.reload_manifest()?;
        for dir in ensure_declared_dirs(&self.paths.service_dir, &manifest.directories)? {
            info!(dir = %dir.display(), "created declared dir");
        }

        self.run_command(processor, &manifest, LifecycleCommand::Setup)?;
        self.run_command(processor, &manifest, LifecycleCommand::Run)?;

        self.status.set(StatusLabel::Running);
        info!("service created");
        Ok(PassOutcome::Created)
    }

    fn update<S: SourceControl, R: ShellRunner>(
        &mut self,
        source: &S,
        processor: &CommandProcessor<R>,
    ) -> Result<PassOutcome> {
        let repo = self.paths.repository_dir.clone();
        source.fetch_remote(&repo)?;
        if !source.has_upstream_changes(&repo)? {
            info!("no upstream changes");
            return Ok(PassOutcome::Unchanged);
        }
        info!("upstream changes detected");

        // Teardown runs against the revision that is currently deployed.
        let previous = self.current_manifest()?;
        self.run_command(processor, &previous, LifecycleCommand::Teardown)?;

        info!("merging upstream");
        source.merge_fast_forward(&repo)?;

        let manifest = self.reload_manifest()?;
        for dir in ensure_declared_dirs(&self.paths.service_dir, &manifest.directories)? {
            info!(dir = %dir.display(), "created declared dir");
        }

        self.run_command(processor, &manifest, LifecycleCommand::Setup)?;
        self.run_command(processor, &manifest, LifecycleCommand::Run)?;

        self.status.set(StatusLabel::Running);
        info!("service updated");
        Ok(PassOutcome::Updated)
    }

    fn current_manifest(&mut self) -> Result<Manifest> {
        match &self.manifest {
            Some(manifest) => Ok(manifest.clone()),
            None => self.reload_manifest(),
        }
    }

    fn reload_manifest(&mut self) -> Result<Manifest> {
        let manifest = load_manifest(&self.id, &self.paths.repository_dir)?;
        self.manifest = Some(manifest.clone());
        Ok(manifest)
    }

    fn run_command<R: ShellRunner>(
        &self,
        processor: &CommandProcessor<R>,
        manifest: &Manifest,
        command: LifecycleCommand,
    ) -> Result<()> {
        self.status.set(StatusLabel::Executing(command));
        processor.run_lifecycle_command(&self.id, manifest, &self.paths.repository_dir, command)?;
        Ok(())
    }
}
