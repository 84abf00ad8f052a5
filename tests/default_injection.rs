//! Default-value injection precedence (I4): a field's own `DEFAULT`
//! annotation wins over the `DEFAULT` carried by the type it points at, and
//! defaults never overwrite a value the instance already supplies.

use std::collections::BTreeMap;

use salto_core::element::DEFAULT_ANNOTATION;
use salto_core::{
    merge_elements, ElemId, Element, Field, InstanceElement, ObjectType, Primitive, PrimitiveType,
    TypeRef, Value,
};

fn text_type() -> Element {
    Element::Primitive(PrimitiveType {
        elem_id: ElemId::for_type("salesforce", "Text"),
        primitive: Primitive::String,
        annotations: BTreeMap::new(),
        annotation_types: BTreeMap::new(),
    })
}

fn default_string(value: &str) -> BTreeMap<String, Value> {
    let mut annotations = BTreeMap::new();
    annotations.insert(DEFAULT_ANNOTATION.to_string(), Value::String(value.to_string()));
    annotations
}

fn type_with_default(name: &str, default: &str) -> Element {
    let type_id = ElemId::for_type("salesforce", name);
    let mut annotations = BTreeMap::new();
    annotations.insert(DEFAULT_ANNOTATION.to_string(), Value::String(default.to_string()));
    Element::Object(ObjectType {
        elem_id: type_id,
        fields: BTreeMap::new(),
        annotations,
        annotation_types: BTreeMap::new(),
        is_settings: false,
    })
}

#[test]
fn field_level_default_wins_over_type_level_default() {
    let account_id = ElemId::for_type("salesforce", "Account");
    let referenced_type = type_with_default("TypeDefault", "from-type");

    let mut fields = BTreeMap::new();
    fields.insert(
        "tier".to_string(),
        Field {
            parent_id: account_id.clone(),
            name: "tier".to_string(),
            r#type: TypeRef::placeholder(ElemId::for_type("salesforce", "TypeDefault")),
            annotations: default_string("from-field"),
        },
    );
    let account = Element::Object(ObjectType {
        elem_id: account_id.clone(),
        fields,
        annotations: BTreeMap::new(),
        annotation_types: BTreeMap::new(),
        is_settings: false,
    });

    let instance = Element::Instance(InstanceElement {
        elem_id: ElemId::for_instance("salesforce", "Account", "acme"),
        r#type: TypeRef::placeholder(account_id),
        value: BTreeMap::new(),
        annotations: BTreeMap::new(),
    });

    let outcome = merge_elements(vec![referenced_type, account, instance]);
    assert!(outcome.errors.is_empty());
    let merged_instance = outcome.merged.iter().find_map(Element::as_instance).unwrap();
    assert_eq!(merged_instance.value["tier"], Value::String("from-field".to_string()));
}

#[test]
fn type_level_default_fills_a_field_with_no_field_level_default() {
    let account_id = ElemId::for_type("salesforce", "Account");
    let referenced_type = type_with_default("TypeDefault", "from-type");

    let mut fields = BTreeMap::new();
    fields.insert(
        "tier".to_string(),
        Field {
            parent_id: account_id.clone(),
            name: "tier".to_string(),
            r#type: TypeRef::placeholder(ElemId::for_type("salesforce", "TypeDefault")),
            annotations: BTreeMap::new(),
        },
    );
    let account = Element::Object(ObjectType {
        elem_id: account_id.clone(),
        fields,
        annotations: BTreeMap::new(),
        annotation_types: BTreeMap::new(),
        is_settings: false,
    });

    let instance = Element::Instance(InstanceElement {
        elem_id: ElemId::for_instance("salesforce", "Account", "acme"),
        r#type: TypeRef::placeholder(account_id),
        value: BTreeMap::new(),
        annotations: BTreeMap::new(),
    });

    let outcome = merge_elements(vec![referenced_type, account, instance]);
    assert!(outcome.errors.is_empty());
    let merged_instance = outcome.merged.iter().find_map(Element::as_instance).unwrap();
    assert_eq!(merged_instance.value["tier"], Value::String("from-type".to_string()));
}

#[test]
fn a_value_already_present_on_the_instance_is_never_overwritten_by_a_default() {
    let account_id = ElemId::for_type("salesforce", "Account");

    let mut fields = BTreeMap::new();
    fields.insert(
        "tier".to_string(),
        Field {
            parent_id: account_id.clone(),
            name: "tier".to_string(),
            r#type: TypeRef::placeholder(ElemId::for_type("salesforce", "Text")),
            annotations: default_string("gold"),
        },
    );
    let account = Element::Object(ObjectType {
        elem_id: account_id.clone(),
        fields,
        annotations: BTreeMap::new(),
        annotation_types: BTreeMap::new(),
        is_settings: false,
    });

    let mut value = BTreeMap::new();
    value.insert("tier".to_string(), Value::String("platinum".to_string()));
    let instance = Element::Instance(InstanceElement {
        elem_id: ElemId::for_instance("salesforce", "Account", "acme"),
        r#type: TypeRef::placeholder(account_id),
        value,
        annotations: BTreeMap::new(),
    });

    let outcome = merge_elements(vec![text_type(), account, instance]);
    assert!(outcome.errors.is_empty());
    let merged_instance = outcome.merged.iter().find_map(Element::as_instance).unwrap();
    assert_eq!(merged_instance.value["tier"], Value::String("platinum".to_string()));
}
