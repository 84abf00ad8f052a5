//! Permutation-invariance and identity properties of the merger (I1, I2),
//! plus its strict duplicate-key handling (§8 scenario 3).

use std::collections::BTreeMap;

use rstest::rstest;
use salto_core::{ElemId, Element, Field, InstanceElement, MergeError, ObjectType, Primitive, PrimitiveType, TypeRef};
use salto_core::merge_elements;
use salto_core::Value;

fn text_type() -> Element {
    Element::Primitive(PrimitiveType {
        elem_id: ElemId::for_type("salesforce", "Text"),
        primitive: Primitive::String,
        annotations: BTreeMap::new(),
        annotation_types: BTreeMap::new(),
    })
}

fn account_type() -> Element {
    let type_id = ElemId::for_type("salesforce", "Account");
    let mut fields = BTreeMap::new();
    fields.insert(
        "name".to_string(),
        Field {
            parent_id: type_id.clone(),
            name: "name".to_string(),
            r#type: TypeRef::placeholder(ElemId::for_type("salesforce", "Text")),
            annotations: BTreeMap::new(),
        },
    );
    Element::Object(ObjectType {
        elem_id: type_id,
        fields,
        annotations: BTreeMap::new(),
        annotation_types: BTreeMap::new(),
        is_settings: false,
    })
}

fn instance_with(key: &str, value: &str) -> Element {
    let mut value_map = BTreeMap::new();
    value_map.insert(key.to_string(), Value::String(value.to_string()));
    Element::Instance(InstanceElement {
        elem_id: ElemId::for_instance("salesforce", "Account", "acme"),
        r#type: TypeRef::placeholder(ElemId::for_type("salesforce", "Account")),
        value: value_map,
        annotations: BTreeMap::new(),
    })
}

#[rstest]
#[case(vec![text_type(), account_type(), instance_with("name", "Acme")])]
#[case(vec![instance_with("name", "Acme"), text_type(), account_type()])]
#[case(vec![account_type(), instance_with("name", "Acme"), text_type()])]
fn merge_result_does_not_depend_on_input_order(#[case] elements: Vec<Element>) {
    let outcome = merge_elements(elements);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.merged.len(), 3);
}

#[test]
fn a_single_element_with_no_peers_merges_to_itself() {
    let outcome = merge_elements(vec![text_type()]);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.merged, vec![text_type()]);
}

#[test]
fn identical_scalar_values_sharing_a_key_still_conflict() {
    let outcome = merge_elements(vec![
        account_type(),
        instance_with("name", "Acme"),
        instance_with("name", "Acme"),
    ]);
    assert_eq!(outcome.errors.len(), 1);
    assert!(matches!(outcome.errors[0], MergeError::DuplicateInstanceKey { .. }));
}

#[test]
fn unrelated_elem_ids_merge_independently_of_a_failing_group() {
    let outcome = merge_elements(vec![
        account_type(),
        instance_with("name", "Acme"),
        instance_with("name", "Acme Corp"),
        text_type(),
    ]);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.merged.iter().any(|e| matches!(e, Element::Primitive(_))));
    assert!(outcome.merged.iter().any(|e| matches!(e, Element::Object(_))));
}
