//! Structural and reference validation over a merged, resolved element graph (§4.3).

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::elem_id::ElemId;
use crate::element::{Element, ObjectType, Primitive, REQUIRED_ANNOTATION};
use crate::error::ValidationError;
use crate::resolver::ElementGraph;
use crate::value::{ReferenceExpression, Value};

struct Context<'a> {
    by_id: BTreeMap<ElemId, &'a Arc<Element>>,
    by_full_name: BTreeMap<String, ElemId>,
}

impl<'a> Context<'a> {
    fn build(graph: &'a ElementGraph) -> Self {
        let mut by_id = BTreeMap::new();
        let mut by_full_name = BTreeMap::new();
        for element in graph {
            if let Some(id) = element.elem_id() {
                by_full_name.insert(id.full_name(), id.clone());
                by_id.insert(id.clone(), element);
            }
        }
        Self { by_id, by_full_name }
    }

    /// Resolve a reference's traversal root against the longest matching
    /// element full name, per §4.3 ("traversal root does not resolve").
    fn resolve_root(&self, reference: &ReferenceExpression) -> Option<&ElemId> {
        let segments = reference.segments();
        for len in (1..=segments.len()).rev() {
            let candidate = segments[..len].join(".");
            if let Some(id) = self.by_full_name.get(&candidate) {
                return Some(id);
            }
        }
        None
    }

    /// Follow a chain of variable-to-variable references looking for a cycle
    /// back to `start` (§4.3 "ultimately refers to itself").
    fn variable_cycle_from(&self, start: &ElemId) -> bool {
        let mut current = start.clone();
        let mut seen: HashSet<ElemId> = HashSet::new();
        loop {
            if !seen.insert(current.clone()) {
                return true;
            }
            let Some(Element::Variable(variable)) = self.by_id.get(&current).map(|e| e.as_ref()) else {
                return false;
            };
            match &variable.value {
                Value::Reference(r) => match self.resolve_root(r) {
                    Some(id) => current = id.clone(),
                    None => return false,
                },
                _ => return false,
            }
        }
    }
}

/// Walk `graph`, reporting every structural and reference problem found.
#[must_use]
pub fn validate(graph: &ElementGraph) -> Vec<ValidationError> {
    debug!(elements = graph.len(), "validating element graph");
    let ctx = Context::build(graph);
    let mut errors = Vec::new();

    for element in graph {
        match element.as_ref() {
            Element::Object(object) => validate_object(object, &ctx, &mut errors),
            Element::Primitive(primitive) => {
                for (key, type_ref) in &primitive.annotation_types {
                    if !type_ref.is_resolved() {
                        errors.push(ValidationError::UnresolvedReference {
                            elem_id: primitive.elem_id.clone(),
                            message: format!("annotation type '{key}' does not resolve"),
                        });
                    }
                    if !primitive.annotations.contains_key(key) {
                        errors.push(ValidationError::InvalidValueType {
                            elem_id: primitive.elem_id.clone(),
                            message: format!("missing required annotation '{key}'"),
                        });
                    }
                }
            }
            Element::Instance(instance) => {
                if !instance.r#type.is_resolved() {
                    errors.push(ValidationError::UnresolvedReference {
                        elem_id: instance.elem_id.clone(),
                        message: "instance type does not resolve".to_string(),
                    });
                }
                if let Some(object) = instance.r#type.resolved().and_then(|e| e.as_object()) {
                    for (name, field) in &object.fields {
                        let present = instance.value.contains_key(name);
                        if !present && is_required(field.annotations.get(REQUIRED_ANNOTATION)) {
                            errors.push(ValidationError::MissingRequiredField {
                                elem_id: instance.elem_id.clone(),
                                message: format!("required field '{name}' is missing"),
                            });
                        }
                    }
                }
                for (name, value) in &instance.value {
                    let expected = instance
                        .r#type
                        .resolved()
                        .and_then(|e| e.as_object())
                        .and_then(|o| o.fields.get(name))
                        .and_then(|f| f.r#type.resolved());
                    validate_value(value, expected, &instance.elem_id, &ctx, &mut errors);
                }
                for value in instance.annotations.values() {
                    validate_value(value, None, &instance.elem_id, &ctx, &mut errors);
                }
            }
            Element::Variable(_) | Element::List(_) => {}
        }
    }

    debug!(errors = errors.len(), "validation complete");
    errors
}

fn is_required(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

fn validate_object(object: &ObjectType, ctx: &Context<'_>, errors: &mut Vec<ValidationError>) {
    for (name, field) in &object.fields {
        if !field.r#type.is_resolved() {
            errors.push(ValidationError::UnresolvedReference {
                elem_id: ElemId::for_field(
                    object.elem_id.adapter(),
                    object.elem_id.type_name(),
                    name.clone(),
                ),
                message: format!("field '{name}' type does not resolve"),
            });
        }
        for value in field.annotations.values() {
            validate_value(value, None, &object.elem_id, ctx, errors);
        }
    }
    for (key, type_ref) in &object.annotation_types {
        if !type_ref.is_resolved() {
            errors.push(ValidationError::UnresolvedReference {
                elem_id: object.elem_id.clone(),
                message: format!("annotation type '{key}' does not resolve"),
            });
        }
        if !object.annotations.contains_key(key) {
            errors.push(ValidationError::InvalidValueType {
                elem_id: object.elem_id.clone(),
                message: format!("missing required annotation '{key}'"),
            });
        }
    }
    for value in object.annotations.values() {
        validate_value(value, None, &object.elem_id, ctx, errors);
    }
}

/// Visit every primitive leaf of `value` exactly once, checking it against
/// `expected_type` (when known) and resolving any `ReferenceExpression`
/// found along the way.
fn validate_value(
    value: &Value,
    expected_type: Option<&Arc<Element>>,
    elem_id: &ElemId,
    ctx: &Context<'_>,
    errors: &mut Vec<ValidationError>,
) {
    match value {
        Value::Reference(reference) => {
            match ctx.resolve_root(reference) {
                None => errors.push(ValidationError::UnresolvedReference {
                    elem_id: elem_id.clone(),
                    message: format!("reference '{}' does not resolve", reference.full_path()),
                }),
                Some(root) => {
                    if ctx.variable_cycle_from(root) {
                        errors.push(ValidationError::CircularReference {
                            elem_id: elem_id.clone(),
                            message: format!("reference '{}' is circular", reference.full_path()),
                        });
                    }
                }
            }
        }
        Value::List(items) => {
            let inner_type = expected_type.and_then(|t| match t.as_ref() {
                Element::List(list) => list.inner.resolved(),
                _ => None,
            });
            if expected_type.is_some() && !matches!(expected_type.map(Arc::as_ref), Some(Element::List(_))) {
                errors.push(ValidationError::InvalidValueType {
                    elem_id: elem_id.clone(),
                    message: "expected a list-typed value".to_string(),
                });
            }
            for item in items {
                validate_value(item, inner_type, elem_id, ctx, errors);
            }
        }
        Value::Map(map) => {
            let field_types: Option<&BTreeMap<String, crate::element::Field>> =
                expected_type.and_then(|t| match t.as_ref() {
                    Element::Object(object) => Some(&object.fields),
                    _ => None,
                });
            if expected_type.is_some()
                && !matches!(expected_type.map(Arc::as_ref), Some(Element::Object(_)))
            {
                errors.push(ValidationError::InvalidValueType {
                    elem_id: elem_id.clone(),
                    message: "expected an object-typed value".to_string(),
                });
            }
            for (key, nested) in map {
                let nested_expected = field_types
                    .and_then(|fields| fields.get(key))
                    .and_then(|f| f.r#type.resolved());
                validate_value(nested, nested_expected, elem_id, ctx, errors);
            }
        }
        scalar => {
            if let Some(expected) = expected_type {
                if let Element::Primitive(primitive) = expected.as_ref() {
                    if !scalar_matches_primitive(scalar, primitive.primitive) {
                        errors.push(ValidationError::InvalidValueType {
                            elem_id: elem_id.clone(),
                            message: format!(
                                "expected a {:?} value but found {}",
                                primitive.primitive,
                                scalar.kind_name()
                            ),
                        });
                    }
                }
            }
        }
    }
}

fn scalar_matches_primitive(value: &Value, primitive: Primitive) -> bool {
    match (value, primitive) {
        (Value::Null, _) => true,
        (Value::String(_), Primitive::String)
        | (Value::Number(_), Primitive::Number)
        | (Value::Bool(_), Primitive::Boolean) => true,
        _ => false,
    }
}
