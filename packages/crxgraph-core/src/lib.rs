/*
 * crxgraph-core - static taint analysis of browser extensions under the
 * renderer-attacker model.
 *
 * Feature-first layout:
 * - shared/    : common models (ids, spans, JS values) and the deadline
 * - features/  : vertical slices (ast -> pdg -> data_flow -> flow_graph
 *                -> double_flow -> vuln -> driver)
 * - config/    : the analysis options
 *
 * An extension's content script and background page are parsed (by an
 * external ESTree parser), annotated into PDGs, and searched for flow
 * pairs where privileged data reaches a renderer-controlled exit
 * (exfiltration) or attacker data reaches an injection sink
 * (infiltration/UXSS).
 */

#![allow(clippy::too_many_arguments)] // analysis queries carry many toggles
#![allow(clippy::collapsible_if)] // readability over brevity
#![allow(clippy::only_used_in_recursion)] // recursive params for API clarity

/// Shared models and utilities
pub mod shared;

/// Feature modules
pub mod features;

/// Analysis configuration
pub mod config;

/// Error types
pub mod errors;

// Re-exports for the public API
pub use config::AnalysisConfig;
pub use errors::{CrxError, Result};
pub use features::ast::Tree;
pub use features::driver::{analyze_extension, ExtensionInput, FindingDocument};
pub use features::flow_graph::{DataFlow, DataFlowGraph, FlowStrategy};
pub use shared::deadline::Deadline;
pub use shared::models::{JsVal, NodeId, Span};
