//! Per-start data-flow subgraph and flow enumeration.

pub mod domain;
pub mod infrastructure;

pub use domain::{DataFlow, FlowStrategy};
pub use infrastructure::dfg::DataFlowGraph;
