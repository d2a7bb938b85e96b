//! Common value types: node ids, source spans, JavaScript values.

pub mod ids;
pub mod span;
pub mod value;

pub use ids::NodeId;
pub use span::{Location, Span};
pub use value::JsVal;
