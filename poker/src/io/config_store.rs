//! Declared service list stored as YAML (`services.yml`).
//!
//! ```yaml
//! services:
//!   demo:
//!     repository: https://example.org/demo.git
//!     owner: ops        # extra fields are ignored but preserved on write
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::debug;

/// One service as named in the configuration store.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredEntry {
    pub id: String,
    pub repository: String,
    /// Fields the reconciler does not use, kept for round-tripping.
    pub extra: BTreeMap<String, Value>,
}

impl DeclaredEntry {
    pub fn new(id: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repository: repository.into(),
            extra: BTreeMap::new(),
        }
    }
}

/// Returned by [`add_entry`] when the id is already declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateServiceError {
    pub id: String,
}

impl fmt::Display for DuplicateServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service `{}` is already declared", self.id)
    }
}

impl std::error::Error for DuplicateServiceError {}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ConfigurationFile {
    #[serde(default)]
    services: Mapping,
}

#[derive(Debug, Deserialize, Serialize)]
struct EntryDefinition {
    repository: String,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// Service ids become directory names, so they are restricted to a safe charset.
pub fn validate_service_id(id: &str) -> Result<()> {
    if id.is_empty() {
        bail!("service id must not be empty");
    }
    if id.starts_with('.') {
        bail!("service id `{id}` must not start with '.'");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
    {
        bail!("service id `{id}` may only contain [A-Za-z0-9._-]");
    }
    Ok(())
}

/// Entries that parsed, plus the ones that did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclaredConfiguration {
    pub entries: Vec<DeclaredEntry>,
    pub invalid: Vec<InvalidEntry>,
}

/// A declared entry that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEntry {
    /// The entry's key as written in the file.
    pub key: String,
    pub reason: String,
}

/// Load the declared configuration, setting aside entries that do not parse.
///
/// Only an unreadable file or a malformed document is an error.
pub fn load_configuration(path: &Path) -> Result<DeclaredConfiguration> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read configuration {}", path.display()))?;
    let configuration =
        parse_configuration(&contents).with_context(|| format!("parse {}", path.display()))?;
    debug!(
        path = %path.display(),
        count = configuration.entries.len(),
        invalid = configuration.invalid.len(),
        "configuration loaded"
    );
    Ok(configuration)
}

/// Parse configuration YAML. An empty document is an error; a document
/// without `services` declares nothing.
pub fn parse_configuration(contents: &str) -> Result<DeclaredConfiguration> {
    let file: Option<ConfigurationFile> =
        serde_yaml::from_str(contents).context("parse configuration yaml")?;
    let file = file.ok_or_else(|| anyhow!("configuration document is empty"))?;

    let mut configuration = DeclaredConfiguration::default();
    for (key, value) in file.services {
        match parse_entry(&key, value) {
            Ok(entry) => configuration.entries.push(entry),
            Err(err) => configuration.invalid.push(InvalidEntry {
                key: display_key(&key),
                reason: format!("{err:#}"),
            }),
        }
    }
    Ok(configuration)
}

/// Load declared entries in file order, failing on the first invalid entry.
pub fn load_entries(path: &Path) -> Result<Vec<DeclaredEntry>> {
    strict(load_configuration(path)?)
}

/// Strict form of [`parse_configuration`].
pub fn parse_entries(contents: &str) -> Result<Vec<DeclaredEntry>> {
    strict(parse_configuration(contents)?)
}

fn strict(configuration: DeclaredConfiguration) -> Result<Vec<DeclaredEntry>> {
    match configuration.invalid.into_iter().next() {
        Some(invalid) => Err(anyhow!(invalid.reason)),
        None => Ok(configuration.entries),
    }
}

fn parse_entry(key: &Value, value: Value) -> Result<DeclaredEntry> {
    let id = key
        .as_str()
        .ok_or_else(|| anyhow!("service ids must be strings, got {key:?}"))?
        .to_string();
    validate_service_id(&id)?;
    let definition: EntryDefinition =
        serde_yaml::from_value(value).with_context(|| format!("service `{id}`"))?;
    Ok(DeclaredEntry {
        id,
        repository: definition.repository,
        extra: definition.extra,
    })
}

fn display_key(key: &Value) -> String {
    match key {
        Value::String(text) => text.clone(),
        other => serde_yaml::to_string(other)
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|_| format!("{other:?}")),
    }
}

/// Render the full entry list back to YAML.
pub fn render_entries(entries: &[DeclaredEntry]) -> Result<String> {
    let mut services = Mapping::new();
    for entry in entries {
        let definition = EntryDefinition {
            repository: entry.repository.clone(),
            extra: entry.extra.clone(),
        };
        let value = serde_yaml::to_value(&definition)
            .with_context(|| format!("serialize service `{}`", entry.id))?;
        services.insert(Value::String(entry.id.clone()), value);
    }
    serde_yaml::to_string(&ConfigurationFile { services }).context("serialize configuration")
}

/// Atomically write the full entry list (temp file + rename).
pub fn write_entries(path: &Path, entries: &[DeclaredEntry]) -> Result<()> {
    let contents = render_entries(entries)?;
    write_atomic(path, &contents)
}

/// Append a new entry, rejecting ids that are already declared.
///
/// A missing file is treated as an empty list.
pub fn add_entry(path: &Path, entry: DeclaredEntry) -> Result<()> {
    validate_service_id(&entry.id)?;
    let mut entries = if path.exists() {
        load_entries(path)?
    } else {
        Vec::new()
    };
    if entries.iter().any(|existing| existing.id == entry.id) {
        return Err(DuplicateServiceError { id: entry.id }.into());
    }
    debug!(id = %entry.id, "declaring service");
    entries.push(entry);
    write_entries(path, &entries)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("yml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp configuration {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace configuration {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries_in_file_order() {
        let entries = parse_entries(
            "services:\n  zeta:\n    repository: https://example/zeta.git\n  alpha:\n    repository: https://example/alpha.git\n",
        )
        .expect("parse");
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
        assert_eq!(entries[1].repository, "https://example/alpha.git");
    }

    #[test]
    fn missing_services_section_declares_nothing() {
        let entries = parse_entries("other: true\n").expect("parse");
        assert!(entries.is_empty());
    }

    #[test]
    fn empty_document_is_an_error() {
        let err = parse_entries("").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn entry_without_repository_is_an_error() {
        let err = parse_entries("services:\n  demo:\n    branch: main\n").unwrap_err();
        assert!(format!("{err:#}").contains("service `demo`"));
    }

    #[test]
    fn rejects_path_like_ids() {
        let err = parse_entries("services:\n  a/b:\n    repository: x\n").unwrap_err();
        assert!(err.to_string().contains("may only contain"));
    }

    #[test]
    fn invalid_entries_are_set_aside_without_hiding_valid_ones() {
        let configuration = parse_configuration(
            "services:\n  good:\n    repository: https://example/good.git\n  bad:\n    branch: main\n  a/b:\n    repository: x\n  42:\n    repository: y\n  later:\n    repository: https://example/later.git\n",
        )
        .expect("parse");

        let ids: Vec<&str> = configuration.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["good", "later"]);
        let keys: Vec<&str> = configuration.invalid.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["bad", "a/b", "42"]);
        assert!(configuration.invalid[0].reason.contains("repository"));
        assert!(configuration.invalid[2].reason.contains("must be strings"));
    }

    #[test]
    fn add_entry_refuses_a_file_with_invalid_entries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("services.yml");
        fs::write(&path, "services:\n  bad:\n    branch: main\n").expect("seed");

        add_entry(&path, DeclaredEntry::new("demo", "https://example/demo.git")).unwrap_err();

        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "services:\n  bad:\n    branch: main\n"
        );
    }

    #[test]
    fn write_preserves_extra_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("services.yml");
        fs::write(
            &path,
            "services:\n  demo:\n    repository: https://example/demo.git\n    owner: ops\n",
        )
        .expect("seed");

        let entries = load_entries(&path).expect("load");
        write_entries(&path, &entries).expect("write");
        let reloaded = load_entries(&path).expect("reload");

        assert_eq!(reloaded, entries);
        assert_eq!(
            reloaded[0].extra.get("owner"),
            Some(&Value::String("ops".to_string()))
        );
    }

    #[test]
    fn add_entry_appends_and_rejects_duplicates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("services.yml");

        add_entry(&path, DeclaredEntry::new("demo", "https://example/demo.git")).expect("add");
        add_entry(&path, DeclaredEntry::new("blog", "https://example/blog.git")).expect("add");

        let err = add_entry(&path, DeclaredEntry::new("demo", "https://example/other.git"))
            .unwrap_err();
        assert!(err.downcast_ref::<DuplicateServiceError>().is_some());

        let ids: Vec<String> = load_entries(&path)
            .expect("load")
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["demo", "blog"]);
    }
}
