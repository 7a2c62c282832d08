use std::sync::Arc;

use slotmap::{new_key_type, Key};

use crate::ast::Block;
use crate::codegen::CompiledBlock;
use crate::common::{ControlType, WireType};
use crate::error::CompileError;
use crate::values::NumValue;

new_key_type! { pub struct SurfaceKey; }
new_key_type! { pub struct NodeKey; }
new_key_type! { pub struct ControlKey; }

/// Stable numeric id for a model handle, as handed to the linker.
pub fn key_id(key: impl Key) -> u64 {
    key.data().as_ffi()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PortalType {
    Input,
    Output,
    Automation,
}

/// What the last compile learned about a control.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileMeta {
    /// Slot of the control in its node's generated code.
    pub index: usize,
    pub written_to: bool,
    pub read_from: bool,
}

#[derive(Clone, Debug)]
pub struct Control {
    pub name: String,
    pub node: NodeKey,
    pub kind: ControlType,
    pub connections: Vec<ControlKey>,
    /// Counterpart on the enclosing group node, set once this control is exposed.
    pub exposer: Option<ControlKey>,
    /// For controls on a group node: the inner control they expose.
    pub exposing: Option<ControlKey>,
    pub value: NumValue,
    pub compile_meta: CompileMeta,
}

impl Control {
    pub fn new(name: impl Into<String>, node: NodeKey, kind: ControlType) -> Self {
        Self {
            name: name.into(),
            node,
            kind,
            connections: Vec::new(),
            exposer: None,
            exposing: None,
            value: NumValue::default(),
            compile_meta: CompileMeta::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CustomNode {
    pub block: Block,
    /// Output of the last successful compile. Kept when a later compile fails.
    pub compiled: Option<Arc<CompiledBlock>>,
    /// Whether the current block compiled.
    pub valid: bool,
    pub error: Option<CompileError>,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Custom(CustomNode),
    Group { inner: SurfaceKey },
    Portal(PortalType),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub surface: SurfaceKey,
    pub kind: NodeKind,
    pub controls: Vec<ControlKey>,
    /// Position of this node in its surface's module, assigned by the last build.
    pub compile_index: Option<usize>,
}

impl Node {
    pub fn custom(&self) -> Option<&CustomNode> {
        match &self.kind {
            NodeKind::Custom(custom) => Some(custom),
            _ => None,
        }
    }

    /// A custom node whose current block failed to compile.
    pub fn is_invalid_custom(&self) -> bool {
        matches!(&self.kind, NodeKind::Custom(custom) if !custom.valid)
    }
}

/// A socket of the root surface, in the order the root module declares them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootPortal {
    pub id: u64,
    pub portal_type: PortalType,
    pub wire: WireType,
    pub node_name: String,
}

/// A socket of a group surface, as seen from the surface that contains the group node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupPortal {
    /// Group node controls exposing members of this socket.
    pub external_controls: Vec<ControlKey>,
    pub written: bool,
    pub read: bool,
    pub is_extractor: bool,
}

#[derive(Clone, Debug)]
pub struct Surface {
    pub name: String,
    /// The group node this surface lives in; `None` for the root.
    pub group_node: Option<NodeKey>,
    pub nodes: Vec<NodeKey>,
    pub portals: Vec<GroupPortal>,
    pub root_portals: Vec<RootPortal>,
}

impl Surface {
    pub fn new(name: impl Into<String>, group_node: Option<NodeKey>) -> Self {
        Self {
            name: name.into(),
            group_node,
            nodes: Vec::new(),
            portals: Vec::new(),
            root_portals: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.group_node.is_none()
    }
}
