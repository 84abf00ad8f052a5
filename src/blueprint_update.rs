//! Structured edit helpers consumed by `update_blueprints` (§6.4, §4.4.2).
//!
//! The real text-splicing implementation lives in the out-of-scope parser
//! package; this module only defines the seam and a structural (non-textual)
//! test double.

use crate::elem_id::ElemId;
use crate::source::{SourceMap, SourceRange};
use crate::value::Value;

/// What a detailed change does to the element it targets.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeAction {
    Add,
    Modify,
    Remove,
}

/// A structured add/modify/remove targeting an ElemID, with before/after
/// payloads (absent for adds/removes as appropriate).
#[derive(Clone, Debug, PartialEq)]
pub struct DetailedChange {
    pub elem_id: ElemId,
    pub action: ChangeAction,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// A change paired with the source range it should be spliced into.
#[derive(Clone, Debug, PartialEq)]
pub struct LocatedChange {
    pub change: DetailedChange,
    pub location: SourceRange,
}

/// Failure to splice a set of changes into a buffer.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("failed to update blueprint data for '{filename}': {reason}")]
pub struct BlueprintUpdateError {
    pub filename: String,
    pub reason: String,
}

/// The workspace treats both operations as pure (§6.4).
pub trait BlueprintUpdater: Send + Sync {
    fn change_locations(&self, change: &DetailedChange, source_map: &SourceMap) -> Vec<LocatedChange>;

    fn update_blueprint_data(
        &self,
        buffer: &str,
        changes: &[LocatedChange],
    ) -> Result<String, BlueprintUpdateError>;
}

/// A structural test double: locates a change at every source range
/// currently recorded for its ElemID's full name, and "applies" changes by
/// appending a marker line per change rather than splicing real blueprint
/// syntax (which only the out-of-scope parser package knows how to render).
#[derive(Default)]
pub struct StructuralBlueprintUpdater;

impl BlueprintUpdater for StructuralBlueprintUpdater {
    fn change_locations(&self, change: &DetailedChange, source_map: &SourceMap) -> Vec<LocatedChange> {
        source_map
            .get(&change.elem_id.full_name())
            .into_iter()
            .flatten()
            .map(|range| LocatedChange {
                change: change.clone(),
                location: range.clone(),
            })
            .collect()
    }

    fn update_blueprint_data(
        &self,
        buffer: &str,
        changes: &[LocatedChange],
    ) -> Result<String, BlueprintUpdateError> {
        let mut updated = buffer.to_owned();
        for located in changes {
            let marker = match located.change.action {
                ChangeAction::Add => format!("# added {}\n", located.change.elem_id.full_name()),
                ChangeAction::Modify => format!("# modified {}\n", located.change.elem_id.full_name()),
                ChangeAction::Remove => format!("# removed {}\n", located.change.elem_id.full_name()),
            };
            updated.push_str(&marker);
        }
        Ok(updated)
    }
}
