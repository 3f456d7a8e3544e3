//! Shared deterministic types for the reconciler.
//!
//! These types are the stable contract between the engine, the service
//! lifecycle and outside readers (status refresh, HTTP API).

use std::fmt;

use serde::{Serialize, Serializer};

/// Lifecycle status of a single service.
///
/// Rendered as `initializing`, `provisioning`, `executing-setup`,
/// `executing-teardown`, `executing-run`, `running`, `not-running` or
/// `error:<message>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusLabel {
    #[default]
    Initializing,
    Provisioning,
    Executing(LifecycleCommand),
    Running,
    NotRunning,
    Error(String),
}

impl StatusLabel {
    /// True while a lifecycle operation owns the label.
    ///
    /// The container status refresh must leave transient labels alone.
    pub fn is_transient(&self) -> bool {
        matches!(self, StatusLabel::Provisioning | StatusLabel::Executing(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StatusLabel::Error(_))
    }

    /// Label for a container that is (or is not) among the live containers.
    pub fn from_container_state(live: bool) -> Self {
        if live {
            StatusLabel::Running
        } else {
            StatusLabel::NotRunning
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLabel::Initializing => f.write_str("initializing"),
            StatusLabel::Provisioning => f.write_str("provisioning"),
            StatusLabel::Executing(command) => write!(f, "executing-{command}"),
            StatusLabel::Running => f.write_str("running"),
            StatusLabel::NotRunning => f.write_str("not-running"),
            StatusLabel::Error(message) => write!(f, "error:{message}"),
        }
    }
}

impl Serialize for StatusLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Lifecycle command names a manifest may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleCommand {
    Setup,
    Run,
    Teardown,
}

impl LifecycleCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleCommand::Setup => "setup",
            LifecycleCommand::Run => "run",
            LifecycleCommand::Teardown => "teardown",
        }
    }
}

impl fmt::Display for LifecycleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the reconciliation schedule itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    #[default]
    Waiting,
    Running,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_render_as_wire_strings() {
        let cases = [
            (StatusLabel::Initializing, "initializing"),
            (StatusLabel::Provisioning, "provisioning"),
            (
                StatusLabel::Executing(LifecycleCommand::Setup),
                "executing-setup",
            ),
            (
                StatusLabel::Executing(LifecycleCommand::Teardown),
                "executing-teardown",
            ),
            (StatusLabel::Executing(LifecycleCommand::Run), "executing-run"),
            (StatusLabel::Running, "running"),
            (StatusLabel::NotRunning, "not-running"),
            (
                StatusLabel::Error("unable to read manifest".to_string()),
                "error:unable to read manifest",
            ),
        ];
        for (label, expected) in cases {
            assert_eq!(label.to_string(), expected);
        }
    }

    #[test]
    fn only_provisioning_and_executing_are_transient() {
        assert!(StatusLabel::Provisioning.is_transient());
        assert!(StatusLabel::Executing(LifecycleCommand::Run).is_transient());
        assert!(!StatusLabel::Initializing.is_transient());
        assert!(!StatusLabel::Running.is_transient());
        assert!(!StatusLabel::Error("boom".to_string()).is_transient());
    }

    #[test]
    fn engine_status_serializes_lowercase() {
        let yaml = serde_yaml::to_string(&EngineStatus::Waiting).expect("serialize");
        assert_eq!(yaml.trim(), "waiting");
    }
}
