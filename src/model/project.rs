use slotmap::SlotMap;
use tracing::trace;

use crate::ast::Block;
use crate::common::{ControlType, WireType};
use crate::error::ModelError;
use crate::values::NumValue;

use super::types::*;

/// A patch: every surface, node and control, addressed by stable handles.
///
/// Surfaces nest through group nodes. The root surface always exists; group
/// surfaces are created and removed together with their group node.
#[derive(Clone, Debug)]
pub struct Project {
    surfaces: SlotMap<SurfaceKey, Surface>,
    nodes: SlotMap<NodeKey, Node>,
    controls: SlotMap<ControlKey, Control>,
    root: SurfaceKey,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    pub fn new() -> Self {
        let mut surfaces = SlotMap::with_key();
        let root = surfaces.insert(Surface::new("root", None));
        Self {
            surfaces,
            nodes: SlotMap::with_key(),
            controls: SlotMap::with_key(),
            root,
        }
    }

    pub fn root(&self) -> SurfaceKey {
        self.root
    }

    pub fn surface(&self, key: SurfaceKey) -> Option<&Surface> {
        self.surfaces.get(key)
    }

    pub fn surface_mut(&mut self, key: SurfaceKey) -> Option<&mut Surface> {
        self.surfaces.get_mut(key)
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    pub fn control(&self, key: ControlKey) -> Option<&Control> {
        self.controls.get(key)
    }

    pub fn control_mut(&mut self, key: ControlKey) -> Option<&mut Control> {
        self.controls.get_mut(key)
    }

    pub fn controls(&self) -> impl Iterator<Item = (ControlKey, &Control)> {
        self.controls.iter()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn insert_node(&mut self, surface: SurfaceKey, name: &str, kind: NodeKind) -> Result<NodeKey, ModelError> {
        if !self.surfaces.contains_key(surface) {
            return Err(ModelError::Missing("surface"));
        }
        let key = self.nodes.insert(Node {
            name: name.to_owned(),
            surface,
            kind,
            controls: Vec::new(),
            compile_index: None,
        });
        if let Some(surface) = self.surfaces.get_mut(surface) {
            surface.nodes.push(key);
        }
        Ok(key)
    }

    pub fn add_custom_node(&mut self, surface: SurfaceKey, name: &str, block: Block) -> Result<NodeKey, ModelError> {
        self.insert_node(
            surface,
            name,
            NodeKind::Custom(CustomNode {
                block,
                ..Default::default()
            }),
        )
    }

    /// Adds a group node and the surface nested inside it.
    pub fn add_group_node(&mut self, surface: SurfaceKey, name: &str) -> Result<(NodeKey, SurfaceKey), ModelError> {
        if !self.surfaces.contains_key(surface) {
            return Err(ModelError::Missing("surface"));
        }
        let inner = self.surfaces.insert(Surface::new(name, None));
        let node = self.insert_node(surface, name, NodeKind::Group { inner })?;
        if let Some(inner) = self.surfaces.get_mut(inner) {
            inner.group_node = Some(node);
        }
        Ok((node, inner))
    }

    /// Adds a portal node with its single portal control.
    pub fn add_portal_node(
        &mut self,
        surface: SurfaceKey,
        name: &str,
        portal_type: PortalType,
        wire: WireType,
    ) -> Result<(NodeKey, ControlKey), ModelError> {
        let node = self.insert_node(surface, name, NodeKind::Portal(portal_type))?;
        let kind = match wire {
            WireType::Num => ControlType::NumPortal,
            WireType::Midi => ControlType::MidiPortal,
        };
        let control = self.add_control(node, name, kind)?;
        Ok((node, control))
    }

    pub fn set_block(&mut self, node: NodeKey, block: Block) -> Result<(), ModelError> {
        match self.nodes.get_mut(node).map(|node| &mut node.kind) {
            Some(NodeKind::Custom(custom)) => {
                custom.block = block;
                Ok(())
            }
            _ => Err(ModelError::Missing("custom node")),
        }
    }

    /// Removes a node with its controls. Removing a group node removes its
    /// whole nested surface.
    pub fn remove_node(&mut self, key: NodeKey) -> bool {
        let Some(node) = self.nodes.remove(key) else {
            return false;
        };

        if let NodeKind::Group { inner } = node.kind {
            let inner_nodes = self
                .surfaces
                .get(inner)
                .map(|surface| surface.nodes.clone())
                .unwrap_or_default();
            for inner_node in inner_nodes {
                self.remove_node(inner_node);
            }
            self.surfaces.remove(inner);
        }

        for control in node.controls {
            self.remove_control(control);
        }

        if let Some(surface) = self.surfaces.get_mut(node.surface) {
            surface.nodes.retain(|&n| n != key);
        }
        true
    }

    // ========================================================================
    // Controls
    // ========================================================================

    pub fn add_control(&mut self, node: NodeKey, name: &str, kind: ControlType) -> Result<ControlKey, ModelError> {
        if !self.nodes.contains_key(node) {
            return Err(ModelError::Missing("node"));
        }
        let key = self.controls.insert(Control::new(name, node, kind));
        if let Some(node) = self.nodes.get_mut(node) {
            node.controls.push(key);
        }
        Ok(key)
    }

    pub fn find_control(&self, node: NodeKey, name: &str, kind: ControlType) -> Option<ControlKey> {
        self.nodes.get(node)?.controls.iter().copied().find(|&key| {
            self.controls
                .get(key)
                .is_some_and(|control| control.name == name && control.kind == kind)
        })
    }

    /// The control named `name` of kind `kind` on `node`, created if missing.
    pub fn ensure_control(&mut self, node: NodeKey, name: &str, kind: ControlType) -> Result<ControlKey, ModelError> {
        match self.find_control(node, name, kind) {
            Some(key) => Ok(key),
            None => self.add_control(node, name, kind),
        }
    }

    pub fn set_value(&mut self, control: ControlKey, value: NumValue) -> Result<(), ModelError> {
        let control = self.controls.get_mut(control).ok_or(ModelError::Missing("control"))?;
        control.value = value;
        Ok(())
    }

    fn remove_control(&mut self, key: ControlKey) {
        let Some(control) = self.controls.remove(key) else {
            return;
        };
        for peer in &control.connections {
            if let Some(peer) = self.controls.get_mut(*peer) {
                peer.connections.retain(|&c| c != key);
            }
        }
        if let Some(inner) = control.exposing.and_then(|inner| self.controls.get_mut(inner)) {
            inner.exposer = None;
        }
        if let Some(outer) = control.exposer {
            let group_node = self.controls.get(outer).map(|outer| outer.node);
            if let Some(node) = group_node.and_then(|node| self.nodes.get_mut(node)) {
                node.controls.retain(|&c| c != outer);
            }
            self.remove_control(outer);
        }
        if let Some(node) = self.nodes.get_mut(control.node) {
            node.controls.retain(|&c| c != key);
        }
    }

    fn control_surface(&self, key: ControlKey) -> Option<SurfaceKey> {
        let control = self.controls.get(key)?;
        Some(self.nodes.get(control.node)?.surface)
    }

    /// Wires two controls on the same surface. Both must carry the same kind
    /// of signal.
    pub fn connect(&mut self, a: ControlKey, b: ControlKey) -> Result<(), ModelError> {
        let (Some(left), Some(right)) = (self.controls.get(a), self.controls.get(b)) else {
            return Err(ModelError::Missing("control"));
        };
        if left.kind.wire_type() != right.kind.wire_type() {
            return Err(ModelError::MismatchedControls {
                from: left.kind.to_string(),
                to: right.kind.to_string(),
            });
        }
        if self.control_surface(a) != self.control_surface(b) {
            return Err(ModelError::DifferentSurfaces);
        }
        if a == b || left.connections.contains(&b) {
            return Ok(());
        }

        trace!(?a, ?b, "connect");
        if let Some(left) = self.controls.get_mut(a) {
            left.connections.push(b);
        }
        if let Some(right) = self.controls.get_mut(b) {
            right.connections.push(a);
        }
        Ok(())
    }

    pub fn disconnect(&mut self, a: ControlKey, b: ControlKey) -> bool {
        let mut removed = false;
        if let Some(left) = self.controls.get_mut(a) {
            let before = left.connections.len();
            left.connections.retain(|&c| c != b);
            removed = left.connections.len() != before;
        }
        if let Some(right) = self.controls.get_mut(b) {
            right.connections.retain(|&c| c != a);
        }
        removed
    }

    /// Makes a control inside a group visible on the group node. Returns the
    /// control created on the group node.
    pub fn expose(&mut self, key: ControlKey) -> Result<ControlKey, ModelError> {
        let control = self.controls.get(key).ok_or(ModelError::Missing("control"))?;
        if control.exposer.is_some() {
            return Err(ModelError::AlreadyExposed);
        }
        let (name, kind) = (control.name.clone(), control.kind);
        let group_node = self
            .control_surface(key)
            .and_then(|surface| self.surfaces.get(surface))
            .and_then(|surface| surface.group_node)
            .ok_or(ModelError::NotInGroup)?;

        let outer_kind = match kind {
            ControlType::NumPortal => ControlType::Number,
            ControlType::MidiPortal => ControlType::Midi,
            other => other,
        };
        let outer = self.add_control(group_node, &name, outer_kind)?;
        if let Some(outer) = self.controls.get_mut(outer) {
            outer.exposing = Some(key);
        }
        if let Some(inner) = self.controls.get_mut(key) {
            inner.exposer = Some(outer);
        }
        Ok(outer)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Every surface, nested surfaces before the surface containing them.
    pub fn surfaces_inner_first(&self) -> Vec<SurfaceKey> {
        let mut order = Vec::with_capacity(self.surfaces.len());
        self.visit_surface(self.root, &mut order);
        order
    }

    fn visit_surface(&self, key: SurfaceKey, order: &mut Vec<SurfaceKey>) {
        let Some(surface) = self.surfaces.get(key) else {
            return;
        };
        for node in &surface.nodes {
            if let Some(NodeKind::Group { inner }) = self.nodes.get(*node).map(|node| &node.kind) {
                self.visit_surface(*inner, order);
            }
        }
        order.push(key);
    }
}
