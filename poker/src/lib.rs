//! Declarative service reconciler.
//!
//! Keeps a host's materialized services (cloned repositories, data directories,
//! running containers) in step with a declared service list. The architecture
//! keeps the same split throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (status labels, environment
//!   composition). No I/O.
//! - **[`io`]**: Side-effecting adapters (configuration store, manifests, git,
//!   docker, shell). Each sits behind a trait so tests can script it.
//!
//! Orchestration modules ([`command`], [`service`], [`engine`], [`daemon`])
//! coordinate core logic with I/O.

pub mod command;
pub mod core;
pub mod daemon;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod manifest;
pub mod service;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod view;
