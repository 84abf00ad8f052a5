//! Post-merge pass that replaces `TypeRef` placeholders with handles to the
//! merged type they name (§4.2).

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::elem_id::ElemId;
use crate::element::{Element, TypeRef};

/// The merged element graph after reference resolution: every element is
/// shared via `Arc` so a resolved `TypeRef` can point directly at the same
/// allocation the graph itself holds, rather than an independent snapshot.
pub type ElementGraph = Vec<Arc<Element>>;

/// Wrap a freshly merged element sequence and resolve every `TypeRef`
/// reachable from it (§4.2).
#[must_use]
pub fn resolve_references(elements: Vec<Element>) -> ElementGraph {
    debug!(elements = elements.len(), "resolving references");
    let graph: ElementGraph = elements.into_iter().map(Arc::new).collect();
    resolve_graph(&graph);
    graph
}

/// Re-resolve an existing graph in place. Running this twice on the same
/// graph is a no-op (I5): every `TypeRef` slot is a [`std::sync::OnceLock`]
/// that only ever accepts its first `set`, so a second pass finds every slot
/// already populated and changes nothing.
pub fn resolve_graph(graph: &[Arc<Element>]) {
    let table: BTreeMap<ElemId, Arc<Element>> = graph
        .iter()
        .filter_map(|e| e.elem_id().map(|id| (id.clone(), Arc::clone(e))))
        .collect();

    let mut visited = HashSet::new();
    for element in graph {
        resolve_element(element, &table, &mut visited);
    }
    debug!(types = table.len(), visited = visited.len(), "resolved reference graph");
}

fn resolve_element(element: &Arc<Element>, table: &BTreeMap<ElemId, Arc<Element>>, visited: &mut HashSet<ElemId>) {
    if let Some(id) = element.elem_id() {
        if !visited.insert(id.clone()) {
            return;
        }
    }
    match element.as_ref() {
        Element::Object(object) => {
            for field in object.fields.values() {
                resolve_type_ref(&field.r#type, table, visited);
            }
            for type_ref in object.annotation_types.values() {
                resolve_type_ref(type_ref, table, visited);
            }
        }
        Element::Instance(instance) => {
            resolve_type_ref(&instance.r#type, table, visited);
        }
        Element::Primitive(primitive) => {
            for type_ref in primitive.annotation_types.values() {
                resolve_type_ref(type_ref, table, visited);
            }
        }
        Element::List(list) => {
            resolve_type_ref(&list.inner, table, visited);
        }
        Element::Variable(_) => {}
    }
}

fn resolve_type_ref(type_ref: &TypeRef, table: &BTreeMap<ElemId, Arc<Element>>, visited: &mut HashSet<ElemId>) {
    if type_ref.is_resolved() {
        return;
    }
    let Some(target) = table.get(type_ref.elem_id()) else {
        return;
    };
    type_ref.resolve(Arc::clone(target));

    // Recurse into the target's own type references (e.g. a field whose
    // type is itself) so nested placeholders resolve too. `visited` stops
    // self-referential object graphs from recursing forever (§9 "Cycles").
    resolve_element(target, table, visited);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Field, ObjectType, Primitive, PrimitiveType};
    use std::collections::BTreeMap as Map;

    fn text_type() -> Element {
        Element::Primitive(PrimitiveType {
            elem_id: ElemId::for_type("salesforce", "Text"),
            primitive: Primitive::String,
            annotations: Map::new(),
            annotation_types: Map::new(),
        })
    }

    fn account_with_name_field(name_type: ElemId) -> Element {
        let field = Field {
            parent_id: ElemId::for_type("salesforce", "Account"),
            name: "name".into(),
            r#type: TypeRef::placeholder(name_type),
            annotations: Map::new(),
        };
        let mut fields = Map::new();
        fields.insert("name".to_string(), field);
        Element::Object(ObjectType {
            elem_id: ElemId::for_type("salesforce", "Account"),
            fields,
            annotations: Map::new(),
            annotation_types: Map::new(),
            is_settings: false,
        })
    }

    #[test]
    fn resolves_a_field_type_placeholder() {
        let elements = vec![
            account_with_name_field(ElemId::for_type("salesforce", "Text")),
            text_type(),
        ];
        let graph = resolve_references(elements);

        let Element::Object(o) = graph[0].as_ref() else { unreachable!() };
        assert!(o.fields["name"].r#type.is_resolved());
    }

    #[test]
    fn unmatched_placeholder_is_left_unresolved() {
        let elements = vec![account_with_name_field(ElemId::for_type("salesforce", "Missing"))];
        let graph = resolve_references(elements);

        let Element::Object(o) = graph[0].as_ref() else { unreachable!() };
        assert!(!o.fields["name"].r#type.is_resolved());
    }

    #[test]
    fn terminates_on_a_self_referential_type() {
        let elements = vec![account_with_name_field(ElemId::for_type("salesforce", "Account"))];
        let graph = resolve_references(elements);

        let Element::Object(o) = graph[0].as_ref() else { unreachable!() };
        assert!(o.fields["name"].r#type.is_resolved());
    }

    #[test]
    fn resolving_twice_is_a_no_op() {
        let elements = vec![
            account_with_name_field(ElemId::for_type("salesforce", "Text")),
            text_type(),
        ];
        let graph = resolve_references(elements);
        let before = {
            let Element::Object(o) = graph[0].as_ref() else { unreachable!() };
            o.fields["name"].r#type.resolved().map(Arc::as_ptr)
        };
        resolve_graph(&graph);
        let after = {
            let Element::Object(o) = graph[0].as_ref() else { unreachable!() };
            o.fields["name"].r#type.resolved().map(Arc::as_ptr)
        };
        assert_eq!(before, after);
    }
}
