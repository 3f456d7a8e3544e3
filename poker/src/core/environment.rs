//! Environment composition for lifecycle commands.

use std::path::Path;

use crate::manifest::Manifest;

/// Build the ordered environment handed to a service's lifecycle commands.
///
/// Order: `SERVICE_ID`, `SERVICE_NAME`, `CONTAINER_NAME`, then one
/// `<NAME>-DIR` entry per declared directory in name order. Directory values
/// point into the host-visible services root, which may differ from the root
/// the engine itself works in.
pub fn build_environment(
    service_id: &str,
    manifest: &Manifest,
    host_services_root: &Path,
) -> Vec<(String, String)> {
    let mut env = vec![
        ("SERVICE_ID".to_string(), service_id.to_string()),
        ("SERVICE_NAME".to_string(), manifest.service_name.clone()),
        ("CONTAINER_NAME".to_string(), manifest.container_name.clone()),
    ];

    for (name, relative) in &manifest.directories {
        let host_path = host_services_root.join(service_id).join(relative);
        env.push((
            format!("{}-DIR", name.to_uppercase()),
            host_path.display().to_string(),
        ));
    }

    env
}

/// Render `KEY=value ... command` for logs and dry-run output.
pub fn render_invocation(env: &[(String, String)], command: &str) -> String {
    let mut parts: Vec<String> = env
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    parts.push(command.to_string());
    parts.join(" ")
}
