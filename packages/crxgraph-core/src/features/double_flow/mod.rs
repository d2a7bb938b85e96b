//! Flow-pair matching: find (source flow, sink flow) pairs meeting at a
//! common rendezvous node, with reachability, IIFE, descendant and
//! sanitization filters.

pub mod infrastructure;

pub use infrastructure::matcher::{data_flows_into_sink, DoubleDataFlow, MatchProfile};
pub use infrastructure::sanitizer;
