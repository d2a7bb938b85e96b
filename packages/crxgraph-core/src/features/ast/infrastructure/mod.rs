//! AST infrastructure: the arena tree, the ESTree document loader, and
//! the programmatic document builder.

pub mod builder;
pub mod estree;
pub mod tree;

pub use tree::{Edge, EdgeTag, LazyLayer, NodeData, Preorder, Tree};
