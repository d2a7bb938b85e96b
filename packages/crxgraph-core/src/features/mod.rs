//! Feature modules, one vertical slice per analysis subsystem:
//!
//! - `ast`         - arena-backed AST model with positional queries
//! - `pdg`         - semantic services (scoping, static eval, patterns, functions)
//! - `data_flow`   - lazy identifier-to-identifier edge generation
//! - `flow_graph`  - per-start data-flow subgraph with Dijkstra index
//! - `double_flow` - source/sink flow pair matching at rendezvous nodes
//! - `vuln`        - vulnerability catalogs and rule families
//! - `driver`      - per-extension orchestration
//!
//! Each feature keeps pure types under `domain/` and the working code
//! under `infrastructure/`.

pub mod ast;
pub mod data_flow;
pub mod double_flow;
pub mod driver;
pub mod flow_graph;
pub mod pdg;
pub mod vuln;
