//! Structured identifiers for elements, fields and annotations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved adapter namespace for [`Variable`](crate::element::Variable) elements.
pub const VAR_NAMESPACE: &str = "var";

/// Discriminates what an [`ElemId`] names within an adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdType {
    Type,
    Field,
    Attr,
    Instance,
    Annotation,
    Var,
}

impl IdType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Field => "field",
            Self::Attr => "attr",
            Self::Instance => "instance",
            Self::Annotation => "annotation",
            Self::Var => "var",
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered, hierarchical identifier: `(adapter, type_name, id_type, ...name_parts)`.
///
/// Two `ElemId`s are equal iff every field compares equal; this is the sole
/// identity the merger keys on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElemId {
    adapter: String,
    type_name: String,
    id_type: IdType,
    name_parts: Vec<String>,
}

impl ElemId {
    #[must_use]
    pub fn new(
        adapter: impl Into<String>,
        type_name: impl Into<String>,
        id_type: IdType,
        name_parts: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            adapter: adapter.into(),
            type_name: type_name.into(),
            id_type,
            name_parts: name_parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Build the ElemID for a top-level type (no further name parts).
    #[must_use]
    pub fn for_type(adapter: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(adapter, type_name, IdType::Type, Vec::<String>::new())
    }

    /// Build the ElemID for a field nested under an object type.
    #[must_use]
    pub fn for_field(
        adapter: impl Into<String>,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self::new(adapter, type_name, IdType::Field, [field_name.into()])
    }

    /// Build the ElemID for an instance of a type.
    #[must_use]
    pub fn for_instance(
        adapter: impl Into<String>,
        type_name: impl Into<String>,
        instance_name: impl Into<String>,
    ) -> Self {
        Self::new(adapter, type_name, IdType::Instance, [instance_name.into()])
    }

    /// Build the ElemID for a variable in the reserved `var` namespace.
    #[must_use]
    pub fn for_variable(name: impl Into<String>) -> Self {
        Self::new(VAR_NAMESPACE, "", IdType::Var, [name.into()])
    }

    #[must_use]
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub const fn id_type(&self) -> IdType {
        self.id_type
    }

    #[must_use]
    pub fn name_parts(&self) -> &[String] {
        &self.name_parts
    }

    /// Canonical dotted string form, e.g. `adapter.type.field.name`.
    ///
    /// Variables skip the `id_type` segment so `var.varName` reads the way
    /// `spec.md` documents it, rather than the redundant `var.var.varName`.
    #[must_use]
    pub fn full_name(&self) -> String {
        let mut segments = vec![self.adapter.clone()];
        if !self.type_name.is_empty() {
            segments.push(self.type_name.clone());
        }
        if !matches!(self.id_type, IdType::Type | IdType::Var) {
            segments.push(self.id_type.to_string());
        }
        segments.extend(self.name_parts.iter().cloned());
        segments.join(".")
    }

    /// Whether this ElemID addresses a config-singleton instance of its adapter.
    #[must_use]
    pub fn is_config(&self) -> bool {
        self.id_type == IdType::Instance
            && self.name_parts.len() == 1
            && self.name_parts[0] == "_config"
    }

    /// The identifier one level up the hierarchy, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if let Some((_, rest)) = self.name_parts.split_last() {
            return Some(Self {
                adapter: self.adapter.clone(),
                type_name: self.type_name.clone(),
                id_type: self.id_type,
                name_parts: rest.to_vec(),
            });
        }
        if !matches!(self.id_type, IdType::Type) {
            return Some(Self::for_type(self.adapter.clone(), self.type_name.clone()));
        }
        None
    }

    /// Depth of this identifier below its root type: the root type is `0`.
    #[must_use]
    pub fn nesting_level(&self) -> usize {
        let base = usize::from(!matches!(self.id_type, IdType::Type));
        base + self.name_parts.len()
    }
}

impl fmt::Display for ElemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}
