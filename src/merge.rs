//! The identity-keyed fold from a flat element sequence to a merged sequence
//! plus an ordered error list (§4.1).
//!
//! Grouping is always by [`ElemId`] first, never by input position, so the
//! result is independent of the permutation of the input (I1). Within a
//! group, contributions are sorted by a canonical key derived from their own
//! content before folding, so "first encountered" is a property of the data,
//! not of arrival order.

use std::collections::BTreeMap;

use tracing::debug;

use crate::elem_id::ElemId;
use crate::element::{
    is_update_marker_type, Element, Field, InstanceElement, ObjectType, PrimitiveType, Variable,
    DEFAULT_ANNOTATION,
};
use crate::error::MergeError;
use crate::value::Value;

/// Output of a merge pass: the deduplicated elements plus every failure
/// encountered. Errors never prevent merging of unrelated `ElemId` groups.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub merged: Vec<Element>,
    pub errors: Vec<MergeError>,
}

/// A stable, content-derived key used to order group members independently
/// of input position, so duplicate-handling ("kept with whichever value was
/// first encountered, deterministically") does not depend on arrival order.
fn canonical_key(element: &Element) -> String {
    format!("{element:?}")
}

fn sorted_by_canonical_key(mut elements: Vec<Element>) -> Vec<Element> {
    elements.sort_by(|a, b| canonical_key(a).cmp(&canonical_key(b)));
    elements
}

/// Merge an unordered sequence of elements into a deduplicated graph plus
/// the errors the merge rejected.
#[must_use]
pub fn merge_elements(elements: Vec<Element>) -> MergeOutcome {
    let mut groups: BTreeMap<ElemId, Vec<Element>> = BTreeMap::new();
    let mut passthrough = Vec::new();
    for element in elements {
        match element.elem_id().cloned() {
            Some(id) => groups.entry(id).or_default().push(element),
            None => passthrough.push(element),
        }
    }

    let mut errors = Vec::new();
    let mut merged = Vec::new();

    let mut object_groups = Vec::new();
    let mut primitive_groups = Vec::new();
    let mut instance_groups = Vec::new();
    let mut variable_groups = Vec::new();

    for (id, group) in groups {
        match group.first() {
            Some(Element::Object(_)) => object_groups.push((id, group)),
            Some(Element::Primitive(_)) => primitive_groups.push((id, group)),
            Some(Element::Instance(_)) => instance_groups.push((id, group)),
            Some(Element::Variable(_)) => variable_groups.push((id, group)),
            Some(Element::List(_)) | None => {
                debug!(%id, "ignoring identity-less element in a keyed group");
            }
        }
    }

    let mut type_table: BTreeMap<ElemId, Element> = BTreeMap::new();

    for (id, group) in primitive_groups {
        let primitives: Vec<PrimitiveType> = group
            .into_iter()
            .filter_map(|e| match e {
                Element::Primitive(p) => Some(p),
                _ => None,
            })
            .collect();
        let (kept, mut errs) = merge_primitives(&id, primitives);
        errors.append(&mut errs);
        if let Some(p) = kept {
            type_table.insert(id.clone(), Element::Primitive(p.clone()));
            merged.push(Element::Primitive(p));
        }
    }

    for (id, group) in object_groups {
        let objects: Vec<ObjectType> = group
            .into_iter()
            .filter_map(|e| match e {
                Element::Object(o) => Some(o),
                _ => None,
            })
            .collect();
        let (kept, mut errs) = merge_objects(&id, objects);
        errors.append(&mut errs);
        if let Some(o) = kept {
            type_table.insert(id.clone(), Element::Object(o.clone()));
            merged.push(Element::Object(o));
        }
    }

    for (id, group) in instance_groups {
        let instances: Vec<InstanceElement> = group
            .into_iter()
            .filter_map(|e| match e {
                Element::Instance(i) => Some(i),
                _ => None,
            })
            .collect();
        let (kept, mut errs) = merge_instances(&id, instances, &type_table);
        errors.append(&mut errs);
        if let Some(i) = kept {
            merged.push(Element::Instance(i));
        }
    }

    for (id, group) in variable_groups {
        let variables: Vec<Variable> = group
            .into_iter()
            .filter_map(|e| match e {
                Element::Variable(v) => Some(v),
                _ => None,
            })
            .collect();
        let (kept, mut errs) = merge_variables(&id, variables);
        errors.append(&mut errs);
        if let Some(v) = kept {
            merged.push(Element::Variable(v));
        }
    }

    merged.extend(passthrough);
    MergeOutcome { merged, errors }
}

fn merge_primitives(
    id: &ElemId,
    primitives: Vec<PrimitiveType>,
) -> (Option<PrimitiveType>, Vec<MergeError>) {
    let mut ordered = sorted_by_canonical_key(primitives.into_iter().map(Element::Primitive).collect());
    let mut errors = Vec::new();
    if ordered.len() > 1 {
        errors.push(MergeError::MultiplePrimitiveTypesUnsupported(id.clone()));
    }
    let kept = if ordered.is_empty() {
        None
    } else {
        match ordered.remove(0) {
            Element::Primitive(p) => Some(p),
            _ => unreachable!("group was filtered to primitives"),
        }
    };
    (kept, errors)
}

fn merge_variables(id: &ElemId, variables: Vec<Variable>) -> (Option<Variable>, Vec<MergeError>) {
    let mut ordered = sorted_by_canonical_key(variables.into_iter().map(Element::Variable).collect());
    let mut errors = Vec::new();
    if ordered.len() > 1 {
        errors.push(MergeError::DuplicateVariableName(id.clone()));
    }
    let kept = if ordered.is_empty() {
        None
    } else {
        match ordered.remove(0) {
            Element::Variable(v) => Some(v),
            _ => unreachable!("group was filtered to variables"),
        }
    };
    (kept, errors)
}

/// Is `decl` an update declaration? A declaration with no fields is treated
/// as an update even when it carries only annotations (§9 open question:
/// an empty declaration is ambiguous between "empty base" and "annotation
/// update", resolved here in favour of update, matching the annotation-only
/// update cases in the test scenarios).
fn is_update_declaration(decl: &ObjectType) -> bool {
    decl.fields.is_empty() || decl.fields.values().all(|f| is_update_marker_type(f.r#type.elem_id()))
}

fn merge_objects(id: &ElemId, objects: Vec<ObjectType>) -> (Option<ObjectType>, Vec<MergeError>) {
    let ordered = sorted_by_canonical_key(objects.into_iter().map(Element::Object).collect());
    let objects: Vec<ObjectType> = ordered
        .into_iter()
        .map(|e| match e {
            Element::Object(o) => o,
            _ => unreachable!("group was filtered to objects"),
        })
        .collect();

    let mut errors = Vec::new();
    let mut bases: Vec<&ObjectType> = Vec::new();
    let mut updates: Vec<&ObjectType> = Vec::new();
    for decl in &objects {
        if is_update_declaration(decl) {
            updates.push(decl);
        } else {
            bases.push(decl);
        }
    }

    if bases.len() > 1 {
        errors.push(MergeError::MultipleBaseDefinitions(id.clone()));
        return (None, errors);
    }

    let Some(base) = bases.first() else {
        if updates.is_empty() {
            return (None, errors);
        }
        errors.push(MergeError::NoBaseDefinition(id.clone()));
        return (None, errors);
    };

    let mut fields = base.fields.clone();
    let mut annotations = base.annotations.clone();
    let mut annotation_types = base.annotation_types.clone();
    let is_settings = base.is_settings;

    for update in &updates {
        for (name, update_field) in &update.fields {
            let Some(existing) = fields.get_mut(name) else {
                errors.push(MergeError::NoBaseDefinition(ElemId::for_field(
                    id.adapter(),
                    id.type_name(),
                    name.clone(),
                )));
                continue;
            };
            existing.r#type = update_field.r#type.clone();
            merge_annotation_map(
                &mut existing.annotations,
                &update_field.annotations,
                &existing.parent_id.clone(),
                &mut errors,
                |elem_id, key| MergeError::DuplicateAnnotationFieldDefinition { elem_id, key },
            );
        }
        merge_annotation_map(
            &mut annotations,
            &update.annotations,
            id,
            &mut errors,
            |elem_id, key| MergeError::DuplicateAnnotation { elem_id, key },
        );
        merge_typeref_map(&mut annotation_types, &update.annotation_types, id, &mut errors);
    }

    (
        Some(ObjectType {
            elem_id: id.clone(),
            fields,
            annotations,
            annotation_types,
            is_settings,
        }),
        errors,
    )
}

/// Union `incoming` into `into`, reporting `make_error(elem_id, key)` for
/// every key already present regardless of whether the value matches: the
/// merger's duplicate detection is strict on key identity, not value
/// equality (§8 scenario 3 merges two identical values and still reports a
/// duplicate).
fn merge_annotation_map(
    into: &mut BTreeMap<String, Value>,
    incoming: &BTreeMap<String, Value>,
    elem_id: &ElemId,
    errors: &mut Vec<MergeError>,
    make_error: impl Fn(ElemId, String) -> MergeError,
) {
    for (key, value) in incoming {
        if into.contains_key(key) {
            errors.push(make_error(elem_id.clone(), key.clone()));
        } else {
            into.insert(key.clone(), value.clone());
        }
    }
}

fn merge_typeref_map(
    into: &mut BTreeMap<String, crate::element::TypeRef>,
    incoming: &BTreeMap<String, crate::element::TypeRef>,
    elem_id: &ElemId,
    errors: &mut Vec<MergeError>,
) {
    for (key, value) in incoming {
        if into.contains_key(key) {
            errors.push(MergeError::DuplicateAnnotationType {
                elem_id: elem_id.clone(),
                key: key.clone(),
            });
        } else {
            into.insert(key.clone(), value.clone());
        }
    }
}

fn merge_instances(
    id: &ElemId,
    instances: Vec<InstanceElement>,
    type_table: &BTreeMap<ElemId, Element>,
) -> (Option<InstanceElement>, Vec<MergeError>) {
    let ordered = sorted_by_canonical_key(instances.into_iter().map(Element::Instance).collect());
    let instances: Vec<InstanceElement> = ordered
        .into_iter()
        .map(|e| match e {
            Element::Instance(i) => i,
            _ => unreachable!("group was filtered to instances"),
        })
        .collect();

    let Some(first) = instances.first() else {
        return (None, Vec::new());
    };

    let mut errors = Vec::new();
    let mut value = BTreeMap::new();
    let mut annotations = BTreeMap::new();
    for instance in &instances {
        deep_merge_values(&mut value, &instance.value, id, &mut errors);
        merge_annotation_map(
            &mut annotations,
            &instance.annotations,
            id,
            &mut errors,
            |elem_id, key| MergeError::DuplicateAnnotation { elem_id, key },
        );
    }

    if let Some(Element::Object(object_type)) = type_table.get(first.r#type.elem_id()) {
        inject_defaults(&mut value, object_type, type_table);
    }

    (
        Some(InstanceElement {
            elem_id: id.clone(),
            r#type: first.r#type.clone(),
            value,
            annotations,
        }),
        errors,
    )
}

/// Deep-merge `incoming` into `into`. Nested maps recurse so two
/// declarations can contribute disjoint keys of the same nested object
/// without conflict; any other colliding key (including equal scalars,
/// §8 scenario 3) is a duplicate (§4.1.3).
fn deep_merge_values(
    into: &mut BTreeMap<String, Value>,
    incoming: &BTreeMap<String, Value>,
    elem_id: &ElemId,
    errors: &mut Vec<MergeError>,
) {
    for (key, value) in incoming {
        match into.get_mut(key) {
            None => {
                into.insert(key.clone(), value.clone());
            }
            Some(Value::Map(existing)) if matches!(value, Value::Map(_)) => {
                if let Value::Map(incoming_nested) = value {
                    deep_merge_values(existing, incoming_nested, elem_id, errors);
                }
            }
            Some(_) => {
                errors.push(MergeError::DuplicateInstanceKey {
                    elem_id: elem_id.clone(),
                    key: key.clone(),
                });
            }
        }
    }
}

/// Fill in missing field values from `DEFAULT` annotations (§4.1.4, I4).
/// Present keys, even `null`, are never overwritten. Only reads literal
/// annotation data, so it cannot recurse into a self-referential type.
fn inject_defaults(
    value: &mut BTreeMap<String, Value>,
    object_type: &ObjectType,
    type_table: &BTreeMap<ElemId, Element>,
) {
    for (name, field) in &object_type.fields {
        if value.contains_key(name) {
            continue;
        }
        if let Some(default) = field_default(field, type_table) {
            value.insert(name.clone(), default);
        }
    }
}

/// The field-annotation `DEFAULT` wins over the referenced type's own
/// `DEFAULT` annotation when both are present (I4).
fn field_default(field: &Field, type_table: &BTreeMap<ElemId, Element>) -> Option<Value> {
    if let Some(v) = field.annotations.get(DEFAULT_ANNOTATION) {
        return Some(v.clone());
    }
    match type_table.get(field.r#type.elem_id())? {
        Element::Object(o) => o.annotations.get(DEFAULT_ANNOTATION).cloned(),
        Element::Primitive(p) => p.annotations.get(DEFAULT_ANNOTATION).cloned(),
        _ => None,
    }
}

/// Construct a fresh instance built solely from field-level `DEFAULT`
/// annotations (§4.1.4), ignoring the referenced type's own defaults.
#[must_use]
pub fn create_default_instance_from_type(
    elem_id: ElemId,
    object_type: &ObjectType,
) -> InstanceElement {
    let mut value = BTreeMap::new();
    for (name, field) in &object_type.fields {
        if let Some(default) = field.annotations.get(DEFAULT_ANNOTATION) {
            value.insert(name.clone(), default.clone());
        }
    }
    InstanceElement {
        r#type: crate::element::TypeRef::placeholder(object_type.elem_id.clone()),
        elem_id,
        value,
        annotations: BTreeMap::new(),
    }
}
