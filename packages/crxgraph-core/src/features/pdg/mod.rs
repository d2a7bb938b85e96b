//! PDG semantic services: pure queries over the AST that everything else
//! builds on - scoping and identifier resolution, the static evaluator,
//! structural pattern matching, reachability, and the function/class/
//! message-listener models.

pub mod infrastructure;

pub use infrastructure::{calls, func, listeners, patterns, reachability, scoping, static_eval};

pub use func::{Func, JsClass};
pub use listeners::{ListenerKind, MessageListener};
pub use patterns::{MatchOptions, NodePattern};
