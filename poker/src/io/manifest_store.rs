//! Loading `pokermanifest.yml` from a service clone.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::manifest::{MANIFEST_FILE_NAME, Manifest};

/// Read and resolve the manifest at the root of `repository_dir`.
pub fn load_manifest(service_id: &str, repository_dir: &Path) -> Result<Manifest> {
    let path = repository_dir.join(MANIFEST_FILE_NAME);
    let manifest = fs::read_to_string(&path)
        .context("read manifest file")
        .and_then(|contents| Manifest::parse(service_id, &contents))
        .with_context(|| format!("unable to read manifest in repository at {}", path.display()))?;
    debug!(
        service = service_id,
        container = %manifest.container_name,
        directories = manifest.directories.len(),
        commands = manifest.commands.len(),
        "manifest loaded"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reports_unable_to_read_manifest() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_manifest("demo", temp.path()).unwrap_err();
        assert!(err.to_string().starts_with("unable to read manifest"));
    }

    #[test]
    fn loads_manifest_from_repository_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join(MANIFEST_FILE_NAME),
            "configuration:\n  containerName: demo-web\n",
        )
        .expect("write");
        let manifest = load_manifest("demo", temp.path()).expect("load");
        assert_eq!(manifest.container_name, "demo-web");
        assert_eq!(manifest.service_name, "demo");
    }
}
