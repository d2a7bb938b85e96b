//! Error types for crxgraph-core.
//!
//! Semantic queries prefer total functions returning options; these kinds
//! cover the few situations that genuinely unwind, and they are caught at
//! well-defined boundaries (per script, per rule).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrxError {
    /// The external parser could not parse a script; the script is marked
    /// crashed, the other side still runs.
    #[error("parse error: {0}")]
    Parse(String),

    /// An expression cannot be statically evaluated; always recovered by
    /// the caller (fallback value, or the check becomes inconclusive).
    #[error("static eval failed: {0}")]
    StaticEval(String),

    /// A binary-expression-like node did not have the expected left side.
    #[error("no left-hand side: {0}")]
    Lhs(String),

    /// A binary-expression-like node did not have the expected right side.
    #[error("no right-hand side: {0}")]
    Rhs(String),

    /// An identifier could not be resolved to a function.
    #[error("function resolution failed: {0}")]
    FuncResolution(String),

    /// A required ancestor/descendant with a given kind was not found.
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// The per-script wall-clock budget was exceeded; unwinds the current
    /// script analysis, the driver records a crash and continues.
    #[error("analysis deadline exceeded (budget: {0} s)")]
    DeadlineExceeded(u64),

    /// Invalid configuration; surfaced at CLI parse time.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrxError {
    pub fn parse(msg: impl Into<String>) -> Self {
        CrxError::Parse(msg.into())
    }

    pub fn static_eval(msg: impl Into<String>) -> Self {
        CrxError::StaticEval(msg.into())
    }

    pub fn func_resolution(msg: impl Into<String>) -> Self {
        CrxError::FuncResolution(msg.into())
    }

    pub fn lookup(msg: impl Into<String>) -> Self {
        CrxError::Lookup(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        CrxError::Config(msg.into())
    }
}

/// Result type alias for crxgraph operations.
pub type Result<T> = std::result::Result<T, CrxError>;
