//! The editable patch: surfaces holding nodes, nodes holding controls, and
//! the wires and exposures between controls.
//!
//! The builder reads this model and writes compile metadata back into it.
mod project;
mod types;

pub use project::Project;
pub use types::{
    key_id, CompileMeta, Control, ControlKey, CustomNode, GroupPortal, Node, NodeKey, NodeKind, PortalType,
    RootPortal, Surface, SurfaceKey,
};

#[cfg(test)]
mod tests;
