//! stateguard - infrastructure state compliance and drift reconciliation
//!
//! This library exposes the data models, the reconciliation engine and the
//! command handlers used by the `stateguard` binary.

pub mod cli;
pub mod compliance;
pub mod constants;
pub mod daemon;
pub mod diff;
pub mod fetch;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod output;
pub mod store;
pub mod tooling;
