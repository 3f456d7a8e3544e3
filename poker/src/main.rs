//! Declarative service reconciler.
//!
//! Reads the declared service list, clones each service's repository under the
//! services root and runs the lifecycle commands its manifest declares.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use poker::core::environment::build_environment;
use poker::daemon::{SCHEDULE_POLL, run_schedule, spawn_status_refresh};
use poker::engine::Engine;
use poker::exit_codes;
use poker::io::config_store::validate_service_id;
use poker::io::docker::DockerCli;
use poker::io::git::GitCli;
use poker::io::layout::ServicePaths;
use poker::io::manifest_store::load_manifest;
use poker::logging;
use poker::service::PassOutcome;
use poker::settings::Settings;

#[derive(Parser)]
#[command(
    name = "poker",
    version,
    about = "Keep cloned services in step with a declared service list"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single reconciliation pass and exit.
    Pass {
        #[command(flatten)]
        settings: Settings,
    },
    /// Run the reconciliation schedule and container status refresh until killed.
    Daemon {
        #[command(flatten)]
        settings: Settings,
    },
    /// Print the environment a service's lifecycle commands receive.
    Env {
        /// Service id (directory name under the services root).
        service_id: String,
        #[command(flatten)]
        settings: Settings,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Pass { settings } => cmd_pass(settings),
        Command::Daemon { settings } => cmd_daemon(settings),
        Command::Env {
            service_id,
            settings,
        } => cmd_env(&service_id, &settings),
    }
}

fn cmd_pass(settings: Settings) -> Result<i32> {
    let shell = settings.system_shell();
    let mut engine = Engine::new(settings, GitCli, shell);
    engine.start(Utc::now());
    let report = engine.reconcile()?;

    println!(
        "pass: created={} updated={} unchanged={} failed={} invalid={}",
        report.count(PassOutcome::Created),
        report.count(PassOutcome::Updated),
        report.count(PassOutcome::Unchanged),
        report.failed.len(),
        report.invalid.len()
    );
    for service in engine.services() {
        println!("service: id={} status={}", service.id(), service.status());
    }
    for invalid in &report.invalid {
        println!("invalid: key={} reason={}", invalid.key, invalid.reason);
    }

    if report.failed.is_empty() && report.invalid.is_empty() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::SERVICE_FAILED)
    }
}

fn cmd_daemon(settings: Settings) -> Result<i32> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let refresh = settings.refresh_interval();
    let shell = settings.system_shell();
    let mut engine = Engine::new(settings, GitCli, shell);

    let _refresh = spawn_status_refresh(engine.view(), DockerCli, refresh, Arc::clone(&shutdown))?;
    run_schedule(&mut engine, SCHEDULE_POLL, &shutdown);
    Ok(exit_codes::OK)
}

fn cmd_env(service_id: &str, settings: &Settings) -> Result<i32> {
    validate_service_id(service_id)?;
    let services_root = settings.services_root()?;
    let host_root = settings.host_services_root()?;
    let paths = ServicePaths::new(&services_root, service_id);
    if !paths.repository_dir.is_dir() {
        bail!(
            "service '{service_id}' has no repository at {}",
            paths.repository_dir.display()
        );
    }

    let manifest = load_manifest(service_id, &paths.repository_dir)?;
    for (key, value) in build_environment(service_id, &manifest, &host_root) {
        println!("{key}={value}");
    }
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_subcommand_takes_id_and_settings() {
        let cli = Cli::parse_from([
            "poker",
            "env",
            "demo",
            "--services-dir",
            "/srv/services",
            "--host-services-dir",
            "/host/services",
        ]);
        let Command::Env {
            service_id,
            settings,
        } = cli.command
        else {
            panic!("expected env subcommand");
        };
        assert_eq!(service_id, "demo");
        assert_eq!(settings.services_dir, "/srv/services");
        assert_eq!(settings.host_services_dir, "/host/services");
    }

    #[test]
    fn pass_subcommand_accepts_dry_run() {
        let cli = Cli::parse_from(["poker", "pass", "--dry-run"]);
        let Command::Pass { settings } = cli.command else {
            panic!("expected pass subcommand");
        };
        assert!(settings.dry_run);
    }
}
