//! Per-extension orchestration: manifest parsing, CS/BP split, per-side
//! analysis under a deadline, result aggregation.

pub mod infrastructure;

pub use infrastructure::extension::{analyze_extension, ExtensionInput, FindingDocument};
pub use infrastructure::manifest::{is_injected_everywhere_pattern, Manifest};
pub use infrastructure::parser_cmd;
