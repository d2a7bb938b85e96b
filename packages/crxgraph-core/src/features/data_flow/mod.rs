//! Lazy data-flow edge generation between identifier occurrences.
//!
//! Three layers, each latched per identifier: basic edges (declarations,
//! assignments, patterns, def-to-use), call-expression edges (arguments
//! to formal parameters), return-value edges (return arguments to call
//! receivers). [`flow_parents`]/[`flow_children`] are the only entry
//! points the rest of the analysis uses; they trigger exactly the layers
//! a query needs.

pub mod infrastructure;

pub use infrastructure::dep::{flow_children, flow_parents};
pub use infrastructure::pruning::prune_incorrect_edges;
