//! Container runtime adapter used for status display.

use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Read-only view of the container runtime.
///
/// Only feeds the `running`/`not-running` status; never drives lifecycle decisions.
pub trait ContainerRuntime {
    fn list_container_names(&self) -> Result<Vec<String>>;
}

/// [`ContainerRuntime`] backed by `docker ps`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerCli;

impl ContainerRuntime for DockerCli {
    #[instrument(skip_all)]
    fn list_container_names(&self) -> Result<Vec<String>> {
        let output = Command::new("docker")
            .args(["ps", "--format", "{{.Names}}"])
            .output()
            .context("spawn docker ps")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("docker ps failed: {}", stderr.trim()));
        }
        let names = parse_container_names(&String::from_utf8_lossy(&output.stdout));
        debug!(count = names.len(), "listed containers");
        Ok(names)
    }
}

fn parse_container_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_name_per_line() {
        let names = parse_container_names("demo-web\n\n  cache \n");
        assert_eq!(names, vec!["demo-web", "cache"]);
    }
}
