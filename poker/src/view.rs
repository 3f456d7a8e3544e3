//! Read-only view of the engine shared with other threads.
//!
//! The service collection belongs to the engine's thread. Everything else
//! (status refresh, HTTP API) reads the snapshot published here. The one
//! write path from outside is [`StatusCell::apply_container_state`], which
//! checks and overwrites a service status under a single lock.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::types::{EngineStatus, StatusLabel};
use crate::manifest::Manifest;
use crate::service::Service;

/// Shared, lockable status of one service.
#[derive(Debug, Clone, Default)]
pub struct StatusCell(Arc<Mutex<StatusLabel>>);

impl StatusCell {
    pub fn get(&self) -> StatusLabel {
        self.lock().clone()
    }

    pub fn set(&self, label: StatusLabel) {
        *self.lock() = label;
    }

    /// Overwrite with `running`/`not-running` unless a lifecycle step owns the label.
    ///
    /// Returns whether the label was overwritten.
    pub fn apply_container_state(&self, live: bool) -> bool {
        let mut label = self.lock();
        if label.is_transient() {
            return false;
        }
        *label = StatusLabel::from_container_state(live);
        true
    }

    fn lock(&self) -> MutexGuard<'_, StatusLabel> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Published handle to one service.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    pub id: String,
    pub repository_url: String,
    pub container_name: String,
    pub manifest: Option<Manifest>,
    pub status: StatusCell,
}

/// Serializable point-in-time copy of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub id: String,
    pub repository_url: String,
    pub status: StatusLabel,
    pub manifest: Option<Manifest>,
}

/// Serializable schedule state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSnapshot {
    pub status: EngineStatus,
    pub next_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct ViewState {
    status: EngineStatus,
    next_run: Option<DateTime<Utc>>,
    services: Vec<ServiceHandle>,
}

/// Cloneable handle to the published engine state.
#[derive(Debug, Clone, Default)]
pub struct EngineView {
    inner: Arc<RwLock<ViewState>>,
}

impl EngineView {
    /// Replace the published service list with the engine's current collection.
    pub fn publish_services(&self, services: &[Service]) {
        let handles = services
            .iter()
            .map(|service| ServiceHandle {
                id: service.id().to_string(),
                repository_url: service.repository_url().to_string(),
                container_name: service.container_name().to_string(),
                manifest: service.manifest().cloned(),
                status: service.status_cell().clone(),
            })
            .collect();
        self.write().services = handles;
    }

    pub fn publish_schedule(&self, status: EngineStatus, next_run: Option<DateTime<Utc>>) {
        let mut state = self.write();
        state.status = status;
        state.next_run = next_run;
    }

    pub fn schedule(&self) -> ScheduleSnapshot {
        let state = self.read();
        ScheduleSnapshot {
            status: state.status,
            next_run: state.next_run,
        }
    }

    pub fn services(&self) -> Vec<ServiceSnapshot> {
        self.read()
            .services
            .iter()
            .map(|handle| ServiceSnapshot {
                id: handle.id.clone(),
                repository_url: handle.repository_url.clone(),
                status: handle.status.get(),
                manifest: handle.manifest.clone(),
            })
            .collect()
    }

    pub fn handles(&self) -> Vec<ServiceHandle> {
        self.read().services.clone()
    }

    /// Mark each published service `running`/`not-running` by container name.
    ///
    /// Services in a transient state are skipped. Returns how many labels changed hands.
    pub fn apply_container_names(&self, names: &[String]) -> usize {
        let live: HashSet<&str> = names.iter().map(String::as_str).collect();
        self.handles()
            .iter()
            .filter(|handle| {
                handle
                    .status
                    .apply_container_state(live.contains(handle.container_name.as_str()))
            })
            .count()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ViewState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ViewState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
