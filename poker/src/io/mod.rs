//! Side-effecting adapters used by the reconciler.

pub mod config_store;
pub mod docker;
pub mod git;
pub mod layout;
pub mod manifest_store;
pub mod process;
pub mod shell;
