//! Runtime values carried by instances, fields and annotations.

use std::collections::BTreeMap;

/// A dotted traversal path interpreted against the merged element set.
///
/// The path is kept split rather than as a single string so traversal can
/// walk it segment by segment without re-parsing; [`full_path`] reconstructs
/// the dotted form for error messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceExpression {
    path: Vec<String>,
}

impl ReferenceExpression {
    #[must_use]
    pub fn new(path: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a dotted string such as `salesforce.Account.field1` into segments.
    #[must_use]
    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.').map(str::to_owned))
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.path
    }

    #[must_use]
    pub fn full_path(&self) -> String {
        self.path.join(".")
    }
}

/// A tagged union of the value shapes a field, annotation or instance may hold.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Reference(ReferenceExpression),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_reference(&self) -> Option<&ReferenceExpression> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l.as_slice()),
            _ => None,
        }
    }

    /// A short, stable discriminator name used in validation messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Reference(_) => "reference",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_expression_parses_dotted_path() {
        let r = ReferenceExpression::parse("salesforce.Account.field1");
        assert_eq!(
            r.segments(),
            &["salesforce".to_string(), "Account".to_string(), "field1".to_string()]
        );
        assert_eq!(r.full_path(), "salesforce.Account.field1");
    }

    #[test]
    fn reference_expressions_compare_by_path_not_resolution() {
        let a = ReferenceExpression::parse("var.x");
        let b = ReferenceExpression::parse("var.x");
        assert_eq!(a, b);
    }
}
