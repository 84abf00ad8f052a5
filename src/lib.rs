//! Element merge, reference resolution, validation and workspace state for
//! Salto-style infrastructure blueprints.
//!
//! Data flow: parsed blueprints feed the [`merge`] module, whose output is
//! resolved by [`resolver`], then checked by [`validator`]; [`workspace`]
//! owns the resulting state and mediates edits.

pub mod blueprint_update;
pub mod cache;
pub mod elem_id;
pub mod element;
pub mod error;
pub mod file;
pub mod merge;
pub mod parser;
pub mod resolver;
pub mod source;
pub mod validator;
pub mod value;
pub mod workspace;

pub use elem_id::{ElemId, IdType};
pub use element::{Element, Field, InstanceElement, ListType, ObjectType, Primitive, PrimitiveType, TypeRef, Variable};
pub use error::{MergeError, Severity, ValidationError, WorkspaceError, WorkspaceErrorCause, WorkspaceInitError, WorkspaceIoError};
pub use merge::{merge_elements, MergeOutcome};
pub use resolver::{resolve_references, ElementGraph};
pub use validator::validate;
pub use value::{ReferenceExpression, Value};
pub use workspace::{create_workspace_state, Workspace, WorkspaceErrors, WorkspaceState};
