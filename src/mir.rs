//! Module description handed to the linker.
//!
//! One build produces a `Transaction`: a `SurfaceMir` per surface listing its
//! value groups and how each node's sockets map onto them, the compiled
//! custom node blocks, and the socket list of the root surface.

use std::sync::Arc;

use crate::codegen::CompiledBlock;
use crate::values::{NumValue, Type};

#[derive(Clone, Debug, PartialEq)]
pub enum ConstantValue {
    Num(NumValue),
}

/// Where a value group's storage comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueGroupSource {
    /// Private storage, zero-initialized.
    None,
    /// Storage provided from outside the surface through socket `n`.
    Socket(usize),
    /// Private storage initialized with a constant.
    Default(ConstantValue),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValueGroupMir {
    pub ty: Type,
    pub source: ValueGroupSource,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ValueSocketMir {
    pub group: usize,
    pub written: bool,
    pub read: bool,
    pub is_extractor: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeMirKind {
    /// A custom node running the block with this id.
    Custom(u64),
    /// A group node instantiating the surface with this id.
    Group(u64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeMir {
    pub kind: NodeMirKind,
    pub sockets: Vec<ValueSocketMir>,
}

impl NodeMir {
    pub fn add_value_socket(&mut self, group: usize, written: bool, read: bool, is_extractor: bool) {
        self.sockets.push(ValueSocketMir {
            group,
            written,
            read,
            is_extractor,
        });
    }

    /// Value group index per socket, in socket order.
    pub fn socket_groups(&self) -> Vec<usize> {
        self.sockets.iter().map(|socket| socket.group).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceMir {
    pub id: u64,
    pub name: String,
    pub groups: Vec<ValueGroupMir>,
    pub nodes: Vec<NodeMir>,
}

impl SurfaceMir {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            groups: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn add_value_group(&mut self, ty: Type, source: ValueGroupSource) -> usize {
        self.groups.push(ValueGroupMir { ty, source });
        self.groups.len() - 1
    }

    pub fn add_custom_node(&mut self, block: u64) -> &mut NodeMir {
        self.add_node(NodeMirKind::Custom(block))
    }

    pub fn add_group_node(&mut self, surface: u64) -> &mut NodeMir {
        self.add_node(NodeMirKind::Group(surface))
    }

    fn add_node(&mut self, kind: NodeMirKind) -> &mut NodeMir {
        let index = self.nodes.len();
        self.nodes.push(NodeMir {
            kind,
            sockets: Vec::new(),
        });
        &mut self.nodes[index]
    }

    /// Number of groups sourced from sockets.
    pub fn socket_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|group| matches!(group.source, ValueGroupSource::Socket(_)))
            .count()
    }
}

/// External interface of the whole patch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RootMir {
    pub sockets: Vec<Type>,
}

impl RootMir {
    pub fn add_socket(&mut self, ty: Type) -> usize {
        self.sockets.push(ty);
        self.sockets.len() - 1
    }
}

#[derive(Clone, Debug)]
pub struct BlockMir {
    pub id: u64,
    pub block: Arc<CompiledBlock>,
}

#[derive(Clone, Debug, Default)]
pub struct Transaction {
    pub surfaces: Vec<SurfaceMir>,
    pub blocks: Vec<BlockMir>,
    pub root: Option<RootMir>,
}

impl Transaction {
    pub fn surface(&self, id: u64) -> Option<&SurfaceMir> {
        self.surfaces.iter().find(|surface| surface.id == id)
    }

    pub fn block(&self, id: u64) -> Option<&BlockMir> {
        self.blocks.iter().find(|block| block.id == id)
    }
}
