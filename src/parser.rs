//! Blueprint parser abstraction (§6.1). The real DSL parser is out of scope;
//! this crate consumes only the interface it exposes.

use crate::cache::ParseResult;

/// Parse a blueprint buffer into elements, a source map and parse errors.
///
/// The real parser lives in an out-of-scope package; this trait is the seam
/// the workspace coordinator calls through, so tests can swap in a
/// deterministic fixture.
pub trait BlueprintParser: Send + Sync {
    fn parse(&self, buffer: &str, filename: &str) -> ParseResult;
}

/// A fixture parser for tests: returns a fixed `ParseResult` regardless of
/// input, or one registered per filename.
#[derive(Default)]
pub struct FixtureParser {
    by_filename: std::collections::HashMap<String, ParseResult>,
}

impl FixtureParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, filename: impl Into<String>, result: ParseResult) -> Self {
        self.by_filename.insert(filename.into(), result);
        self
    }
}

impl BlueprintParser for FixtureParser {
    fn parse(&self, _buffer: &str, filename: &str) -> ParseResult {
        self.by_filename.get(filename).cloned().unwrap_or(ParseResult {
            elements: Vec::new(),
            source_map: crate::source::SourceMap::new(),
            errors: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_filename_parses_empty() {
        let parser = FixtureParser::new();
        let result = parser.parse("anything", "missing.bp");
        assert!(result.elements.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn registered_filename_returns_the_fixture() {
        let fixture = ParseResult {
            elements: Vec::new(),
            source_map: crate::source::SourceMap::new(),
            errors: vec![crate::source::ParseError {
                subject: crate::source::SourceRange {
                    filename: "a.bp".into(),
                    start: crate::source::Position { line: 1, col: 1, byte: 0 },
                    end: crate::source::Position { line: 1, col: 1, byte: 1 },
                },
                detail: "broken".into(),
            }],
        };
        let parser = FixtureParser::new().with("a.bp", fixture);
        let result = parser.parse("anything", "a.bp");
        assert_eq!(result.errors.len(), 1);
    }
}
