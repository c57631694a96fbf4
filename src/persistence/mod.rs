//! Cluster identity across runs.

mod previous;
mod reconciler;
mod registry;

pub use previous::{parse_previous, read_previous, PreviousRun};
pub use reconciler::{reconcile, AuditOutcome, PreviousClusterAudit, Reconciliation, Rename};
pub use registry::{high_water_path, IdRegistry};
