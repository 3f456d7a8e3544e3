//! Long-running loops: the reconciliation schedule and the container status refresh.
//!
//! The schedule owns the [`Engine`] and runs on one thread; the refresh only
//! touches the engine's [`EngineView`] and can run concurrently with a pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::engine::{Engine, TickOutcome};
use crate::io::docker::ContainerRuntime;
use crate::io::git::SourceControl;
use crate::io::shell::ShellRunner;
use crate::view::EngineView;

/// How often the schedule loop checks whether a pass is due.
pub const SCHEDULE_POLL: Duration = Duration::from_secs(1);

const SLEEP_SLICE: Duration = Duration::from_millis(200);

/// Start `engine` and tick it every `poll` until `shutdown` is set.
pub fn run_schedule<S: SourceControl, R: ShellRunner>(
    engine: &mut Engine<S, R>,
    poll: Duration,
    shutdown: &AtomicBool,
) {
    engine.start(Utc::now());
    while !shutdown.load(Ordering::Relaxed) {
        match engine.tick(Utc::now()) {
            TickOutcome::NotDue => {}
            TickOutcome::Completed(_) | TickOutcome::Failed(_) => {
                if let Some(next) = engine.next_run_time() {
                    info!(next_run = %next, "next reconciliation pass scheduled");
                }
            }
        }
        pause(poll, shutdown);
    }
    info!("schedule stopped");
}

/// Run the schedule on a dedicated thread.
pub fn spawn_schedule<S, R>(
    mut engine: Engine<S, R>,
    poll: Duration,
    shutdown: Arc<AtomicBool>,
) -> Result<JoinHandle<()>>
where
    S: SourceControl + Send + 'static,
    R: ShellRunner + Send + 'static,
{
    thread::Builder::new()
        .name("schedule".to_string())
        .spawn(move || run_schedule(&mut engine, poll, &shutdown))
        .context("spawn schedule thread")
}

/// Apply one container listing to the view. Returns how many statuses were overwritten.
pub fn refresh_statuses<C: ContainerRuntime>(view: &EngineView, runtime: &C) -> Result<usize> {
    let names = runtime
        .list_container_names()
        .context("list containers")?;
    let changed = view.apply_container_names(&names);
    debug!(containers = names.len(), changed, "container statuses refreshed");
    Ok(changed)
}

/// Refresh container statuses every `interval` on a dedicated thread until `shutdown` is set.
///
/// A failing listing is logged and retried on the next interval.
pub fn spawn_status_refresh<C>(
    view: EngineView,
    runtime: C,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
) -> Result<JoinHandle<()>>
where
    C: ContainerRuntime + Send + 'static,
{
    thread::Builder::new()
        .name("status-refresh".to_string())
        .spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                if let Err(err) = refresh_statuses(&view, &runtime) {
                    warn!(err = %format!("{err:#}"), "container status refresh failed");
                }
                pause(interval, &shutdown);
            }
        })
        .context("spawn status refresh thread")
}

fn pause(duration: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + duration;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::core::types::StatusLabel;
    use crate::io::config_store::{DeclaredEntry, write_entries};
    use crate::service::Service;
    use crate::settings::Settings;
    use crate::test_support::{RecordingShell, ScriptedSource, StaticContainers};

    const MANIFEST: &str = "configuration:\n  containerName: demo-web\n";

    fn wait_for(mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        false
    }

    fn published(root: &Path, ids: &[&str]) -> (EngineView, Vec<Service>) {
        let services: Vec<Service> = ids
            .iter()
            .map(|id| Service::new(*id, format!("https://git.example/{id}.git"), root))
            .collect();
        let view = EngineView::default();
        view.publish_services(&services);
        (view, services)
    }

    #[test]
    fn refresh_marks_services_by_container_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (view, services) = published(temp.path(), &["up", "down"]);
        services[0].status_cell().set(StatusLabel::Running);
        services[1].status_cell().set(StatusLabel::Running);

        let changed = refresh_statuses(&view, &StaticContainers(vec!["up".to_string()]))
            .expect("refresh");

        assert_eq!(changed, 2);
        assert_eq!(services[0].status(), StatusLabel::Running);
        assert_eq!(services[1].status(), StatusLabel::NotRunning);
    }

    #[test]
    fn refresh_leaves_transient_states_alone() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (view, services) = published(temp.path(), &["busy"]);
        services[0].status_cell().set(StatusLabel::Provisioning);

        refresh_statuses(&view, &StaticContainers(vec!["busy".to_string()])).expect("refresh");

        assert_eq!(services[0].status(), StatusLabel::Provisioning);
    }

    #[test]
    fn refresh_thread_updates_until_shutdown() {
        let temp = tempfile::tempdir().expect("tempdir");
        let (view, services) = published(temp.path(), &["idle"]);
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = spawn_status_refresh(
            view,
            StaticContainers::default(),
            Duration::from_millis(10),
            Arc::clone(&shutdown),
        )
        .expect("spawn");

        assert!(wait_for(|| services[0].status() == StatusLabel::NotRunning));
        shutdown.store(true, Ordering::Relaxed);
        handle.join().expect("join");
    }

    #[test]
    fn schedule_thread_runs_the_first_pass_immediately() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = temp.path().join("services.yml");
        write_entries(&config, &[DeclaredEntry::new("demo", "https://git.example/demo.git")])
            .expect("config");
        let settings = Settings::new(
            config.clone(),
            temp.path().join("services").display().to_string(),
            "/host/services",
        );
        let source = ScriptedSource::new().with_repository("https://git.example/demo.git", MANIFEST);
        let engine = Engine::new(settings, source, RecordingShell::default());
        let view = engine.view();
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = spawn_schedule(engine, Duration::from_millis(10), Arc::clone(&shutdown))
            .expect("spawn");

        assert!(wait_for(|| {
            view.services()
                .iter()
                .any(|service| service.id == "demo" && service.status == StatusLabel::Running)
        }));
        shutdown.store(true, Ordering::Relaxed);
        handle.join().expect("join");
        assert!(temp.path().join("services/demo/_repository").is_dir());
    }
}
