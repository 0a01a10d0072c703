use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location span.
///
/// Lines and columns are 1-based. Nodes built programmatically (without a
/// parser) carry the all-zero span, see [`Span::is_synthetic`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(line: u32, col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            line,
            col,
            end_line,
            end_col,
        }
    }

    /// Zero-width span at a single position.
    pub fn point(line: u32, col: u32) -> Self {
        Self::new(line, col, line, col)
    }

    /// True for spans of nodes that never came from source text.
    pub fn is_synthetic(&self) -> bool {
        self.line == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_synthetic() {
            write!(f, "<synthetic>")
        } else {
            write!(f, "{}:{}", self.line, self.col)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_point() {
        let s = Span::point(4, 9);
        assert_eq!((s.line, s.col, s.end_line, s.end_col), (4, 9, 4, 9));
        assert!(!s.is_synthetic());
    }

    #[test]
    fn test_span_display() {
        assert_eq!(Span::new(3, 7, 3, 15).to_string(), "3:7");
        assert_eq!(Span::default().to_string(), "<synthetic>");
    }

    #[test]
    fn test_span_json_shape() {
        let json = serde_json::to_string(&Span::point(2, 6)).unwrap();
        assert_eq!(json, r#"{"line":2,"col":6,"end_line":2,"end_col":6}"#);
    }
}
