//! The built-in `saltoConfigType` and the minimal renderer used to bootstrap
//! `salto.config.bp` (§3, §4.4.2 `init`, §4.4.3 step 2).

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::elem_id::ElemId;
use crate::element::{Element, Field, ObjectType, Primitive, PrimitiveType, TypeRef};

const ADAPTER: &str = "salto";
const TEXT_TYPE_NAME: &str = "Text";
const CONFIG_TYPE_NAME: &str = "Config";

/// The builtin scalar every `saltoConfigType` field is typed with. Appended
/// alongside `salto_config_type` wherever the config type itself is, so its
/// field types resolve rather than dangling as placeholders.
#[must_use]
pub fn salto_text_type() -> Element {
    Element::Primitive(PrimitiveType {
        elem_id: ElemId::for_type(ADAPTER, TEXT_TYPE_NAME),
        primitive: Primitive::String,
        annotations: BTreeMap::new(),
        annotation_types: BTreeMap::new(),
    })
}

/// The workspace config object type: `{ uid: Text, name: Text }`.
#[must_use]
pub fn salto_config_type() -> Element {
    let type_id = ElemId::for_type(ADAPTER, CONFIG_TYPE_NAME);
    let text_id = ElemId::for_type(ADAPTER, TEXT_TYPE_NAME);
    let mut fields = BTreeMap::new();
    for name in ["uid", "name"] {
        fields.insert(
            name.to_string(),
            Field {
                parent_id: type_id.clone(),
                name: name.to_string(),
                r#type: TypeRef::placeholder(text_id.clone()),
                annotations: BTreeMap::new(),
            },
        );
    }
    Element::Object(ObjectType {
        elem_id: type_id,
        fields,
        annotations: BTreeMap::new(),
        annotation_types: BTreeMap::new(),
        is_settings: true,
    })
}

/// The ElemID of the single config instance an initialised workspace writes.
#[must_use]
pub fn config_instance_id() -> ElemId {
    ElemId::for_instance(ADAPTER, CONFIG_TYPE_NAME, "_config")
}

/// Render the minimal `salto.config.bp` buffer for a freshly initialised
/// workspace. The real blueprint dumper is out of scope; this is the one
/// point the core manufactures blueprint text itself, since bootstrapping
/// has no prior buffer to splice into.
#[must_use]
pub fn render(name: &str, uid: &Uuid) -> String {
    format!(
        "salto.Config salto._config {{\n  uid = \"{uid}\"\n  name = \"{name}\"\n}}\n"
    )
}
