//! Source-location bookkeeping shared by the parser, merger and workspace.

use std::collections::BTreeMap;

/// A single point in a source buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub col: u32,
    pub byte: usize,
}

/// A half-open byte range within a named blueprint file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceRange {
    pub filename: String,
    pub start: Position,
    pub end: Position,
}

impl SourceRange {
    /// Extract the slice of `buffer` this range denotes.
    ///
    /// Returns `None` if the range falls outside `buffer`'s bounds, which can
    /// happen if the buffer was edited after the range was recorded.
    #[must_use]
    pub fn extract<'a>(&self, buffer: &'a str) -> Option<&'a str> {
        buffer.get(self.start.byte..self.end.byte)
    }
}

/// An error reported directly by the (out-of-scope) blueprint parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub subject: SourceRange,
    pub detail: String,
}

/// `filename -> source ranges` that contributed to the full name it is keyed by.
pub type SourceMap = BTreeMap<String, Vec<SourceRange>>;

/// Union `other` into `into`, per-key concatenation (§4.4.3 step 1).
pub fn union_source_maps(into: &mut SourceMap, other: &SourceMap) {
    for (full_name, ranges) in other {
        into.entry(full_name.clone())
            .or_default()
            .extend(ranges.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(filename: &str, start: usize, end: usize) -> SourceRange {
        SourceRange {
            filename: filename.to_string(),
            start: Position { line: 1, col: 1, byte: start },
            end: Position { line: 1, col: 1, byte: end },
        }
    }

    #[test]
    fn extract_returns_the_denoted_slice() {
        let r = range("a.bp", 2, 5);
        assert_eq!(r.extract("abcdef"), Some("cde"));
    }

    #[test]
    fn extract_returns_none_when_out_of_bounds() {
        let r = range("a.bp", 2, 50);
        assert_eq!(r.extract("abcdef"), None);
    }

    #[test]
    fn union_concatenates_per_key() {
        let mut into: SourceMap = SourceMap::new();
        into.insert("a.b".to_string(), vec![range("a.bp", 0, 1)]);
        let mut other: SourceMap = SourceMap::new();
        other.insert("a.b".to_string(), vec![range("b.bp", 0, 1)]);
        other.insert("c.d".to_string(), vec![range("b.bp", 2, 3)]);
        union_source_maps(&mut into, &other);
        assert_eq!(into["a.b"].len(), 2);
        assert_eq!(into["c.d"].len(), 1);
    }
}
