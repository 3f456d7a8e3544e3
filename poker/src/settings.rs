//! Process configuration shared by the `poker` and `poker-server` binaries.
//!
//! Every setting resolves command-line flag → environment variable → default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Args};

use crate::io::shell::{DEFAULT_OUTPUT_LIMIT_BYTES, SystemShell};

pub const DEFAULT_CONFIG_FILE: &str = "services.yml";

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Declared service list (YAML).
    #[arg(short = 'c', long = "config", env = "SERVICE_CONFIG_FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Root the engine clones and provisions services under.
    #[arg(long, env = "SERVICES_DIR", default_value = "")]
    pub services_dir: String,

    /// The same root as seen by the host that runs the lifecycle commands.
    #[arg(long, env = "HOST_SERVICES_DIR", default_value = "")]
    pub host_services_dir: String,

    /// Log composed lifecycle commands instead of executing them (true/yes/1).
    #[arg(
        long,
        env = "DRY_RUN",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_toggle
    )]
    pub dry_run: bool,

    /// Seconds between reconciliation passes.
    #[arg(long, default_value_t = 300)]
    pub interval_secs: u64,

    /// Seconds between container status refreshes.
    #[arg(long, default_value_t = 15)]
    pub refresh_secs: u64,

    /// Kill lifecycle commands that run longer than this (unbounded when unset).
    #[arg(long)]
    pub command_timeout_secs: Option<u64>,

    /// Truncate captured command stdout/stderr beyond this many bytes.
    #[arg(long, default_value_t = DEFAULT_OUTPUT_LIMIT_BYTES)]
    pub output_limit_bytes: usize,
}

impl Settings {
    /// Settings with defaults for everything but the two roots.
    pub fn new(
        config_file: impl Into<PathBuf>,
        services_dir: impl Into<String>,
        host_services_dir: impl Into<String>,
    ) -> Self {
        Self {
            config_file: config_file.into(),
            services_dir: services_dir.into(),
            host_services_dir: host_services_dir.into(),
            dry_run: false,
            interval_secs: 300,
            refresh_secs: 15,
            command_timeout_secs: None,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    /// Local services root, made absolute against the current directory; an error when unset.
    pub fn services_root(&self) -> Result<PathBuf> {
        let root = non_empty_root(&self.services_dir, "local services root", "SERVICES_DIR")?;
        std::path::absolute(&root)
            .with_context(|| format!("resolve services root {}", root.display()))
    }

    /// Host-visible services root; an error when unset.
    pub fn host_services_root(&self) -> Result<PathBuf> {
        non_empty_root(&self.host_services_dir, "host services root", "HOST_SERVICES_DIR")
    }

    pub fn validate_roots(&self) -> Result<()> {
        self.services_root()?;
        self.host_services_root()?;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn system_shell(&self) -> SystemShell {
        SystemShell {
            timeout: self.command_timeout_secs.map(Duration::from_secs),
            output_limit_bytes: self.output_limit_bytes,
        }
    }
}

fn non_empty_root(value: &str, label: &str, env: &str) -> Result<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("{label} not configured (set {env})"));
    }
    Ok(PathBuf::from(trimmed))
}

/// `true`, `yes` and `1` (any case, surrounding whitespace ignored) enable a toggle.
pub fn is_enabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1"
    )
}

fn parse_toggle(value: &str) -> Result<bool, String> {
    Ok(is_enabled(value))
}
