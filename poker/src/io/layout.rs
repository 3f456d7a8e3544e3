//! On-disk layout of the services root.
//!
//! ```text
//! <services-root>/
//!   <service-id>/
//!     _repository/          clone of the service repository
//!       pokermanifest.yml
//!     <declared dirs>/      created from the manifest `directories`
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// Name of the clone directory inside a service directory.
pub const REPOSITORY_DIR_NAME: &str = "_repository";

/// Canonical paths for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePaths {
    pub service_dir: PathBuf,
    pub repository_dir: PathBuf,
}

impl ServicePaths {
    pub fn new(services_root: &Path, id: &str) -> Self {
        Self::from_service_dir(services_root.join(id))
    }

    pub fn from_service_dir(service_dir: impl Into<PathBuf>) -> Self {
        let service_dir = service_dir.into();
        let repository_dir = service_dir.join(REPOSITORY_DIR_NAME);
        Self {
            service_dir,
            repository_dir,
        }
    }
}

/// List service directories under `root`, sorted by name.
///
/// A missing root yields no services.
pub fn list_service_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        debug!(root = %root.display(), "services root missing");
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("read {}", root.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", root.display()))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Create the service directory. Fails if it already exists, so a partial
/// earlier attempt surfaces as a conflict instead of being reused.
pub fn create_service_dir(service_dir: &Path) -> Result<()> {
    fs::create_dir(service_dir)
        .with_context(|| format!("create service dir {}", service_dir.display()))
}

/// Create every declared directory that does not exist yet.
///
/// Each directory lives at `service_dir/<value>`; the key only names it (and its `<NAME>-DIR`
/// variable). Returns the directories that were created. Directories dropped from a
/// manifest are left in place.
pub fn ensure_declared_dirs(
    service_dir: &Path,
    directories: &BTreeMap<String, String>,
) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for (name, relative) in directories {
        let path = service_dir.join(relative);
        if path.is_dir() {
            continue;
        }
        if path.exists() {
            return Err(anyhow!(
                "declared dir `{name}` at {} exists but is not a directory",
                path.display()
            ));
        }
        debug!(name = %name, path = %path.display(), "creating declared dir");
        fs::create_dir_all(&path)
            .with_context(|| format!("create `{name}` dir {}", path.display()))?;
        created.push(path);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_layout() {
        let paths = ServicePaths::new(Path::new("/srv/services"), "demo");
        assert_eq!(paths.service_dir, Path::new("/srv/services/demo"));
        assert_eq!(
            paths.repository_dir,
            Path::new("/srv/services/demo/_repository")
        );
    }

    #[test]
    fn lists_only_directories_sorted() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("zeta")).expect("mkdir");
        fs::create_dir(temp.path().join("alpha")).expect("mkdir");
        fs::write(temp.path().join("notes.txt"), "x").expect("write");

        let dirs = list_service_dirs(temp.path()).expect("list");
        let names: Vec<_> = dirs
            .iter()
            .map(|d| d.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn missing_root_lists_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dirs = list_service_dirs(&temp.path().join("absent")).expect("list");
        assert!(dirs.is_empty());
    }

    #[test]
    fn create_service_dir_is_not_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("demo");
        create_service_dir(&dir).expect("first create");
        assert!(create_service_dir(&dir).is_err());
    }

    #[test]
    fn ensure_declared_dirs_creates_only_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("data")).expect("mkdir");
        let directories = BTreeMap::from([
            ("data".to_string(), "data".to_string()),
            ("logs".to_string(), "var/logs".to_string()),
        ]);

        let created = ensure_declared_dirs(temp.path(), &directories).expect("ensure");
        assert_eq!(created, vec![temp.path().join("var/logs")]);
        assert!(temp.path().join("var/logs").is_dir());
        assert!(!temp.path().join("logs").exists());
    }
}
