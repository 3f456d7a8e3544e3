//! Reconciliation engine: owns the service collection and drives passes on a schedule.

use std::fs;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{error, info, instrument, warn};

use crate::command::CommandProcessor;
use crate::core::types::EngineStatus;
use crate::io::config_store::{InvalidEntry, load_configuration};
use crate::io::git::SourceControl;
use crate::io::layout::list_service_dirs;
use crate::io::shell::ShellRunner;
use crate::service::{PassOutcome, Service};
use crate::settings::Settings;
use crate::view::EngineView;

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Ids of services first seen in the declared configuration this pass.
    pub created: Vec<String>,
    /// Services whose create-or-update pass succeeded, in collection order.
    pub outcomes: Vec<(String, PassOutcome)>,
    /// Services whose create-or-update pass failed.
    pub failed: Vec<String>,
    /// Declared entries skipped this pass because they could not be parsed.
    pub invalid: Vec<InvalidEntry>,
}

impl PassReport {
    pub fn count(&self, outcome: PassOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }
}

/// What a call to [`Engine::tick`] did.
#[derive(Debug)]
pub enum TickOutcome {
    /// The next pass is not due yet (or the engine was never started).
    NotDue,
    Completed(PassReport),
    /// The pass failed before reaching any service (configuration error).
    Failed(String),
}

pub struct Engine<S, R> {
    settings: Settings,
    source: S,
    processor: CommandProcessor<R>,
    services: Vec<Service>,
    status: EngineStatus,
    next_run: Option<DateTime<Utc>>,
    view: EngineView,
}

impl<S: SourceControl, R: ShellRunner> Engine<S, R> {
    pub fn new(settings: Settings, source: S, runner: R) -> Self {
        let processor = CommandProcessor::new(
            runner,
            settings.host_services_dir.trim(),
            settings.dry_run,
        );
        Self {
            settings,
            source,
            processor,
            services: Vec::new(),
            status: EngineStatus::default(),
            next_run: None,
            view: EngineView::default(),
        }
    }

    /// Shareable read-only view, kept current as the engine works.
    pub fn view(&self) -> EngineView {
        self.view.clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn processor(&self) -> &CommandProcessor<R> {
        &self.processor
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|service| service.id() == id)
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn next_run_time(&self) -> Option<DateTime<Utc>> {
        self.next_run
    }

    /// Restore services found on disk and make the first pass due at `now`.
    ///
    /// Returns the number of restored services. Never fails: unusable service
    /// directories are logged and skipped.
    #[instrument(skip_all)]
    pub fn start(&mut self, now: DateTime<Utc>) -> usize {
        let restored = self.restore_services();
        self.next_run = Some(now);
        self.publish();
        info!(restored, next_run = %now, "engine started");
        restored
    }

    fn restore_services(&mut self) -> usize {
        let root = match self.settings.services_root() {
            Ok(root) => root,
            Err(err) => {
                warn!(err = %err, "skipping restore");
                return 0;
            }
        };
        let dirs = match list_service_dirs(&root) {
            Ok(dirs) => dirs,
            Err(err) => {
                error!(err = %format!("{err:#}"), "unable to list service dirs");
                return 0;
            }
        };

        let mut restored = 0;
        for dir in dirs {
            match Service::restore(&dir, &self.source) {
                Ok(service) => {
                    if self.service(service.id()).is_some() {
                        continue;
                    }
                    info!(service = %service.id(), url = %service.repository_url(), "restored service");
                    self.services.push(service);
                    restored += 1;
                }
                Err(err) => {
                    error!(dir = %dir.display(), err = %format!("{err:#}"), "skipping service dir");
                }
            }
        }
        restored
    }

    /// Run a pass if one is due at `now`.
    ///
    /// Whatever the pass does, the engine ends `waiting` with the next run
    /// scheduled one interval after `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        match self.next_run {
            Some(due) if now >= due => {}
            _ => return TickOutcome::NotDue,
        }

        self.status = EngineStatus::Running;
        self.publish();

        let outcome = match self.reconcile() {
            Ok(report) => {
                info!(
                    created = report.created.len(),
                    updated = report.count(PassOutcome::Updated),
                    unchanged = report.count(PassOutcome::Unchanged),
                    failed = report.failed.len(),
                    invalid = report.invalid.len(),
                    "reconciliation pass finished"
                );
                TickOutcome::Completed(report)
            }
            Err(err) => {
                let message = format!("{err:#}");
                error!(err = %message, "reconciliation pass failed");
                TickOutcome::Failed(message)
            }
        };

        self.status = EngineStatus::Waiting;
        self.next_run = Some(
            now.checked_add_signed(self.interval())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        self.publish();
        outcome
    }

    /// One reconciliation pass over the declared configuration.
    ///
    /// Errors only for configuration problems; per-service failures are
    /// recorded in the report and in each service's status.
    #[instrument(skip_all)]
    pub fn reconcile(&mut self) -> Result<PassReport> {
        let services_root = self.settings.services_root()?;
        self.settings.host_services_root()?;
        let declared = load_configuration(&self.settings.config_file)
            .context("unable to load declared configuration")?;
        fs::create_dir_all(&services_root)
            .with_context(|| format!("create services root {}", services_root.display()))?;

        let mut report = PassReport::default();
        for invalid in &declared.invalid {
            error!(entry = %invalid.key, err = %invalid.reason, "skipping invalid declared entry");
        }
        report.invalid = declared.invalid;
        for entry in declared.entries {
            if self.service(&entry.id).is_some() {
                continue;
            }
            info!(service = %entry.id, url = %entry.repository, "new service declared");
            self.services
                .push(Service::new(entry.id.clone(), entry.repository, &services_root));
            report.created.push(entry.id);
        }
        self.view.publish_services(&self.services);

        for index in 0..self.services.len() {
            let service = &mut self.services[index];
            let id = service.id().to_string();
            match service.create_or_update(&self.source, &self.processor) {
                Ok(outcome) => report.outcomes.push((id, outcome)),
                Err(err) => {
                    error!(service = %id, err = %format!("{err:#}"), "service pass failed");
                    report.failed.push(id);
                }
            }
            self.view.publish_services(&self.services);
        }

        Ok(report)
    }

    fn interval(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.settings.interval()).unwrap_or(ChronoDuration::MAX)
    }

    fn publish(&self) {
        self.view.publish_schedule(self.status, self.next_run);
        self.view.publish_services(&self.services);
    }
}
