//! Source locations attached to declarations and diagnostics

use serde::{Deserialize, Serialize};

/// Byte range of a declaration in its source file, with the line/column of its start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// 1-based line of `start` (0 for synthesized entities)
    pub line: u32,
    /// 1-based column of `start`
    pub column: u32,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Length of the span in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True for zero-length spans, including the span of built-in classes
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}
