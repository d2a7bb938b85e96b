//! Flow-graph infrastructure.

pub mod dfg;
