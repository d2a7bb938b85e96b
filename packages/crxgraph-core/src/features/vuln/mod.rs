//! Vulnerability rules: source/sink catalogs and the per-class rule
//! families gluing listeners and catalogs into the flow-pair matcher.

pub mod domain;
pub mod infrastructure;

pub use domain::{DangerRecord, FlowNodeRecord, RendezvousRecord, SideFindings, StorageAccessRecord, ViolationRecord};
pub use infrastructure::rules::{analyze_side, Side};
