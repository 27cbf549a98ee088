//! Background reconciliation
//!
//! - `state_loop`: keeps tracked states' content and compliance results current
//! - `drift`: keeps the foreign resource table current
//! - `resources`: enumerators listing live cloud resources
//! - `validation`: compliance evaluation shared with on-demand validation

pub mod drift;
pub mod resources;
pub mod state_loop;
pub mod validation;

pub use drift::{plan_drift, DriftAction};
pub use resources::{ResourceEnumerator, ResourceRegistry};
pub use state_loop::{StateCheckOutcome, StateChecker, SweepKind, SweepScheduler};
