//! Element variants: the typed vocabulary a merged blueprint graph is built from.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::elem_id::ElemId;
use crate::value::Value;

/// The built-in scalar kinds a `PrimitiveType` may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Number,
    Boolean,
}

/// A reference to a type that may not be resolved yet.
///
/// Holds the target [`ElemId`] plus a resolution slot populated once, in
/// place, by the reference resolver (§4.2). The slot is a [`OnceLock`]
/// rather than a `RefCell` so the element graph stays `Send + Sync` and can
/// live behind the workspace's async mutex.
#[derive(Debug)]
pub struct TypeRef {
    elem_id: ElemId,
    resolved: OnceLock<Arc<Element>>,
}

impl TypeRef {
    #[must_use]
    pub fn placeholder(elem_id: ElemId) -> Self {
        Self {
            elem_id,
            resolved: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn elem_id(&self) -> &ElemId {
        &self.elem_id
    }

    #[must_use]
    pub fn resolved(&self) -> Option<&Arc<Element>> {
        self.resolved.get()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Populate the resolution slot. A no-op if already resolved, matching
    /// the idempotence the resolver relies on (I5).
    pub fn resolve(&self, target: Arc<Element>) {
        let _ = self.resolved.set(target);
    }
}

impl Clone for TypeRef {
    fn clone(&self) -> Self {
        let resolved = OnceLock::new();
        if let Some(target) = self.resolved.get() {
            let _ = resolved.set(Arc::clone(target));
        }
        Self {
            elem_id: self.elem_id.clone(),
            resolved,
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.elem_id == other.elem_id
    }
}

impl From<ElemId> for TypeRef {
    fn from(elem_id: ElemId) -> Self {
        Self::placeholder(elem_id)
    }
}

/// A parametric wrapper type; equal iff the inner type's `ElemId`s match.
#[derive(Clone, Debug, PartialEq)]
pub struct ListType {
    pub inner: TypeRef,
}

/// A field declared on an `ObjectType`.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub parent_id: ElemId,
    pub name: String,
    pub r#type: TypeRef,
    pub annotations: BTreeMap<String, Value>,
}

/// A scalar type definition.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimitiveType {
    pub elem_id: ElemId,
    pub primitive: Primitive,
    pub annotations: BTreeMap<String, Value>,
    pub annotation_types: BTreeMap<String, TypeRef>,
}

/// A structured object type, merged from a base plus zero or more updates.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectType {
    pub elem_id: ElemId,
    pub fields: BTreeMap<String, Field>,
    pub annotations: BTreeMap<String, Value>,
    pub annotation_types: BTreeMap<String, TypeRef>,
    pub is_settings: bool,
}

/// An instance of an `ObjectType` (or `PrimitiveType`), carrying values.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceElement {
    pub elem_id: ElemId,
    pub r#type: TypeRef,
    pub value: BTreeMap<String, Value>,
    pub annotations: BTreeMap<String, Value>,
}

/// A named literal in the reserved `var` namespace.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub elem_id: ElemId,
    pub value: Value,
}

/// The tagged union of declarable elements.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Primitive(PrimitiveType),
    Object(ObjectType),
    Instance(InstanceElement),
    Variable(Variable),
    List(ListType),
}

impl Element {
    /// `None` for `List`, which has no identity of its own — it wraps another type.
    #[must_use]
    pub fn elem_id(&self) -> Option<&ElemId> {
        match self {
            Self::Primitive(p) => Some(&p.elem_id),
            Self::Object(o) => Some(&o.elem_id),
            Self::Instance(i) => Some(&i.elem_id),
            Self::Variable(v) => Some(&v.elem_id),
            Self::List(_) => None,
        }
    }

    #[must_use]
    pub const fn as_object(&self) -> Option<&ObjectType> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_instance(&self) -> Option<&InstanceElement> {
        match self {
            Self::Instance(i) => Some(i),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_primitive(&self) -> Option<&PrimitiveType> {
        match self {
            Self::Primitive(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::Variable(v) => Some(v),
            _ => None,
        }
    }
}

/// Annotation key carrying a field or type's default value (§4.1.4).
pub const DEFAULT_ANNOTATION: &str = "DEFAULT";

/// Annotation key marking a field as required on its owning instance (§4.3).
pub const REQUIRED_ANNOTATION: &str = "_required";

/// Keyword ending a type name that marks an `ObjectType` declaration as an update.
pub const UPDATE_MARKER_KEYWORD: &str = "update";

/// True if `elem_id` names the reserved update-marker type (its last
/// name part, or type name when there are no name parts, ends with
/// [`UPDATE_MARKER_KEYWORD`], matched case-insensitively: real blueprints
/// name the marker `fieldUpdate`, not `fieldupdate`).
#[must_use]
pub fn is_update_marker_type(elem_id: &ElemId) -> bool {
    let last = elem_id
        .name_parts()
        .last()
        .map(String::as_str)
        .unwrap_or_else(|| elem_id.type_name());
    last.to_ascii_lowercase().ends_with(UPDATE_MARKER_KEYWORD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_ref_clone_preserves_resolution() {
        let target = Arc::new(Element::Primitive(PrimitiveType {
            elem_id: ElemId::for_type("salesforce", "Text"),
            primitive: Primitive::String,
            annotations: BTreeMap::new(),
            annotation_types: BTreeMap::new(),
        }));
        let placeholder = TypeRef::placeholder(ElemId::for_type("salesforce", "Text"));
        placeholder.resolve(Arc::clone(&target));
        let cloned = placeholder.clone();
        assert!(cloned.is_resolved());
        assert_eq!(cloned.resolved().map(Arc::as_ptr), Some(Arc::as_ptr(&target)));
    }

    #[test]
    fn type_ref_equality_ignores_resolution() {
        let a = TypeRef::placeholder(ElemId::for_type("salesforce", "Account"));
        let b = TypeRef::placeholder(ElemId::for_type("salesforce", "Account"));
        assert_eq!(a, b);
    }

    #[test]
    fn update_marker_detected_by_suffix() {
        assert!(is_update_marker_type(&ElemId::for_type("salesforce", "fieldUpdate")));
        assert!(!is_update_marker_type(&ElemId::for_type("salesforce", "Account")));
    }
}
