//! Service manifest (`pokermanifest.yml`) model.
//!
//! A manifest lives at the root of every service repository and declares the
//! data directories and lifecycle commands for that service:
//!
//! ```yaml
//! configuration:
//!   serviceName: demo
//!   containerName: demo-web
//!   directories:
//!     data: data
//!   commands:
//!     setup: docker pull demo/web
//!     run: docker run -d --name "$CONTAINER_NAME" demo/web
//!     teardown: docker rm -f "$CONTAINER_NAME"
//! ```

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::LifecycleCommand;

/// Fixed manifest filename inside a service repository.
pub const MANIFEST_FILE_NAME: &str = "pokermanifest.yml";

/// Resolved manifest with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub service_name: String,
    pub container_name: String,
    /// Directory name -> path relative to the service directory.
    pub directories: BTreeMap<String, String>,
    /// Lifecycle command name -> opaque shell string.
    pub commands: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    configuration: Option<ManifestConfiguration>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestConfiguration {
    service_name: Option<String>,
    container_name: Option<String>,
    #[serde(default)]
    directories: BTreeMap<String, String>,
    #[serde(default)]
    commands: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse manifest YAML for `service_id`.
    ///
    /// `serviceName` and `containerName` default to the service id. A document
    /// without a `configuration` section is rejected.
    pub fn parse(service_id: &str, yaml: &str) -> Result<Self> {
        let file: Option<ManifestFile> =
            serde_yaml::from_str(yaml).context("parse manifest yaml")?;
        let configuration = file
            .and_then(|file| file.configuration)
            .ok_or_else(|| anyhow!("missing `configuration` section"))?;

        Ok(Self {
            service_name: configuration
                .service_name
                .unwrap_or_else(|| service_id.to_string()),
            container_name: configuration
                .container_name
                .unwrap_or_else(|| service_id.to_string()),
            directories: configuration.directories,
            commands: configuration.commands,
        })
    }

    /// Shell string declared for `command`, if any.
    pub fn command(&self, command: LifecycleCommand) -> Option<&str> {
        self.commands
            .get(command.as_str())
            .map(String::as_str)
            .filter(|cmd| !cmd.trim().is_empty())
    }
}
