//! Source location types.

use serde::{Deserialize, Serialize};

/// Single position in source code (1-based line, 0-based column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Span in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    pub fn zero() -> Self {
        Self::new(0, 0, 0, 0)
    }

    pub fn start(&self) -> Location {
        Location::new(self.start_line, self.start_col)
    }

    pub fn end(&self) -> Location {
        Location::new(self.end_line, self.end_col)
    }

    /// Whether this span lies entirely within `other` (boundaries included).
    pub fn lies_within(&self, other: &Span) -> bool {
        other.start() <= self.start() && self.end() <= other.end()
    }

    /// Whether this span starts strictly before `other` starts.
    pub fn starts_before(&self, other: &Span) -> bool {
        self.start() < other.start()
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// "12:5 - 12:20" form used by finding documents.
    pub fn location_string(&self) -> String {
        format!(
            "{}:{} - {}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lies_within() {
        let outer = Span::new(1, 0, 10, 0);
        let inner = Span::new(2, 4, 3, 9);
        assert!(inner.lies_within(&outer));
        assert!(!outer.lies_within(&inner));
        assert!(outer.lies_within(&outer));
    }

    #[test]
    fn test_ordering_same_line() {
        let a = Span::new(4, 2, 4, 5);
        let b = Span::new(4, 8, 4, 12);
        assert!(a.starts_before(&b));
        assert!(!b.starts_before(&a));
    }

    #[test]
    fn test_location_string() {
        assert_eq!(Span::new(12, 5, 12, 20).location_string(), "12:5 - 12:20");
    }
}
