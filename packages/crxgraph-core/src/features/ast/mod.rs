//! AST model: typed arena tree with parent links, child roles, source
//! locations, attributes, and the identifier-level data-flow state that
//! turns it into a PDG once edges are added.

pub mod domain;
pub mod infrastructure;

pub use domain::{Attrs, ControlLabel, DeclKind, NodeKind, RegexLit};
pub use infrastructure::builder;
pub use infrastructure::estree;
pub use infrastructure::tree::{LazyLayer, NodeData, Tree};
