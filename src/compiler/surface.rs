/// Value-group builder for one surface.
///
/// Connected controls are unioned into value groups, groups crossing into
/// nested group surfaces are merged through their portals, and every group is
/// classified as a socket, a constant default or private storage. Finally each
/// node's controls are wired to their group indices.
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use tracing::{debug, trace};

use crate::common::ControlType;
use crate::error::BuildError;
use crate::mir::{ConstantValue, RootMir, SurfaceMir, ValueGroupSource};
use crate::model::{key_id, Control, ControlKey, GroupPortal, NodeKey, NodeKind, Project, RootPortal, SurfaceKey};
use crate::values::Type;

new_key_type! { pub struct GroupKey; }

#[derive(Clone, Debug, Default)]
pub struct ValueGroup {
    pub controls: Vec<ControlKey>,
}

/// Groups addressed by stable handles, plus the group of every control.
/// Merging redirects the members of one group to the other.
#[derive(Debug, Default)]
pub struct GroupTable {
    groups: SlotMap<GroupKey, ValueGroup>,
    membership: SecondaryMap<ControlKey, GroupKey>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The group of `control`, creating a singleton group if it has none.
    pub fn insert(&mut self, control: ControlKey) -> GroupKey {
        if let Some(&group) = self.membership.get(control) {
            return group;
        }
        let group = self.groups.insert(ValueGroup {
            controls: vec![control],
        });
        self.membership.insert(control, group);
        group
    }

    /// Puts `a` and `b` into the same group, keeping the group of `a`.
    pub fn union(&mut self, a: ControlKey, b: ControlKey) {
        let target = self.insert(a);
        let source = self.insert(b);
        if target == source {
            return;
        }
        let Some(merged) = self.groups.remove(source) else {
            return;
        };
        trace!(?target, ?source, members = merged.controls.len(), "merge value groups");
        for &control in &merged.controls {
            self.membership.insert(control, target);
        }
        if let Some(group) = self.groups.get_mut(target) {
            group.controls.extend(merged.controls);
        }
    }

    pub fn group_of(&self, control: ControlKey) -> Option<GroupKey> {
        self.membership.get(control).copied()
    }

    pub fn members(&self, group: GroupKey) -> &[ControlKey] {
        self.groups
            .get(group)
            .map(|group| group.controls.as_slice())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupKey, &ValueGroup)> {
        self.groups.iter()
    }
}

fn lookup_control(project: &Project, key: ControlKey) -> Result<&Control, BuildError> {
    project
        .control(key)
        .ok_or_else(|| BuildError::invariant(format!("control {:?} vanished during build", key)))
}

fn node_controls(project: &Project, key: NodeKey) -> Result<Vec<ControlKey>, BuildError> {
    project
        .node(key)
        .map(|node| node.controls.clone())
        .ok_or_else(|| BuildError::invariant(format!("node {:?} vanished during build", key)))
}

/// Whether a control belongs to a node that takes part in grouping.
fn participates(project: &Project, key: ControlKey) -> bool {
    project
        .control(key)
        .and_then(|control| project.node(control.node))
        .is_some_and(|node| !node.is_invalid_custom())
}

/// Nodes of `surface` taking part in this build. Custom nodes whose block
/// failed to compile are left out together with their controls.
pub fn live_nodes(project: &Project, surface: SurfaceKey) -> Result<Vec<NodeKey>, BuildError> {
    let surface = project
        .surface(surface)
        .ok_or_else(|| BuildError::invariant("surface vanished during build"))?;
    Ok(surface
        .nodes
        .iter()
        .copied()
        .filter(|&node| project.node(node).is_some_and(|node| !node.is_invalid_custom()))
        .collect())
}

/// Union phase: one group per connected component of the live controls.
pub fn union_connections(project: &Project, nodes: &[NodeKey], table: &mut GroupTable) -> Result<(), BuildError> {
    for &node in nodes {
        for control in node_controls(project, node)? {
            table.insert(control);
            for &peer in &lookup_control(project, control)?.connections {
                if participates(project, peer) {
                    table.union(control, peer);
                }
            }
        }
    }
    Ok(())
}

/// Cross-boundary phase: the group node controls exposing one inner socket
/// share a group. Also records on those controls whether the inner surface
/// writes or reads the socket.
fn merge_group_portals(project: &mut Project, nodes: &[NodeKey], table: &mut GroupTable) -> Result<(), BuildError> {
    for &node in nodes {
        let inner = match project.node(node).map(|node| &node.kind) {
            Some(NodeKind::Group { inner }) => *inner,
            _ => continue,
        };
        let portals = project
            .surface(inner)
            .map(|surface| surface.portals.clone())
            .ok_or_else(|| BuildError::invariant("group surface vanished during build"))?;

        for (index, portal) in portals.iter().enumerate() {
            let Some((&target, rest)) = portal.external_controls.split_first() else {
                return Err(BuildError::invariant("group portal without external controls"));
            };
            table.insert(target);
            for &other in rest {
                table.union(target, other);
            }
            for &external in &portal.external_controls {
                if let Some(control) = project.control_mut(external) {
                    control.compile_meta.index = index;
                    control.compile_meta.written_to |= portal.written;
                    control.compile_meta.read_from |= portal.read;
                }
            }
        }
    }
    Ok(())
}

/// What the classification phase hands back to the model.
#[derive(Debug, Default)]
struct SurfacePortals {
    root: Vec<RootPortal>,
    group: Vec<GroupPortal>,
}

fn portal_of(project: &Project, control: &Control) -> Option<RootPortal> {
    if !control.kind.is_portal() {
        return None;
    }
    let node = project.node(control.node)?;
    match node.kind {
        NodeKind::Portal(portal_type) => Some(RootPortal {
            id: key_id(control.node),
            portal_type,
            wire: control.kind.wire_type(),
            node_name: node.name.clone(),
        }),
        _ => None,
    }
}

/// Classification phase. Groups get indices in the order their first
/// control appears walking the surface's nodes.
fn classify_groups(
    project: &Project,
    nodes: &[NodeKey],
    table: &GroupTable,
    is_root: bool,
    mir: &mut SurfaceMir,
    root: &mut RootMir,
    portals: &mut SurfacePortals,
) -> Result<SecondaryMap<GroupKey, usize>, BuildError> {
    let mut indices = SecondaryMap::new();

    for &node in nodes {
        for control in node_controls(project, node)? {
            let group = table
                .group_of(control)
                .ok_or_else(|| BuildError::invariant("control has no value group"))?;
            if indices.contains_key(group) {
                continue;
            }

            let members = table
                .members(group)
                .iter()
                .map(|&key| lookup_control(project, key))
                .collect::<Result<Vec<_>, _>>()?;
            let first = members
                .first()
                .ok_or_else(|| BuildError::invariant("empty value group"))?;

            let kind = members
                .iter()
                .map(|member| member.kind)
                .find(|kind| kind.is_extract())
                .unwrap_or(first.kind);
            let ty = Type::of_control(kind);
            let written = members.iter().any(|member| member.compile_meta.written_to);

            let root_portal = if is_root {
                members.iter().find_map(|member| portal_of(project, member))
            } else {
                None
            };

            let source = if let Some(portal) = root_portal {
                portals.root.push(portal);
                ValueGroupSource::Socket(root.add_socket(ty.clone()))
            } else if members.iter().any(|member| member.exposer.is_some()) {
                portals.group.push(GroupPortal {
                    external_controls: members.iter().filter_map(|member| member.exposer).collect(),
                    written,
                    read: members.iter().any(|member| member.compile_meta.read_from),
                    is_extractor: members.iter().any(|member| member.kind.is_extract()),
                });
                ValueGroupSource::Socket(portals.group.len() - 1)
            } else if kind == ControlType::Number && !written && first.value.is_constant_default() {
                ValueGroupSource::Default(ConstantValue::Num(first.value))
            } else {
                ValueGroupSource::None
            };

            indices.insert(group, mir.add_value_group(ty, source));
        }
    }

    Ok(indices)
}

/// Wiring phase: one socket record per control of every live custom node
/// and per portal of every group node.
fn wire_nodes(
    project: &mut Project,
    nodes: &[NodeKey],
    table: &GroupTable,
    indices: &SecondaryMap<GroupKey, usize>,
    mir: &mut SurfaceMir,
) -> Result<(), BuildError> {
    let group_index = |control: ControlKey| -> Result<usize, BuildError> {
        table
            .group_of(control)
            .and_then(|group| indices.get(group).copied())
            .ok_or_else(|| BuildError::invariant(format!("value group of {:?} has no index", control)))
    };

    let mut compile_indices = Vec::with_capacity(nodes.len());
    for &node_key in nodes {
        let node = project
            .node(node_key)
            .ok_or_else(|| BuildError::invariant("node vanished during build"))?;

        match &node.kind {
            NodeKind::Custom(_) => {
                let mut controls = node
                    .controls
                    .iter()
                    .map(|&key| lookup_control(project, key).map(|control| (key, control)))
                    .collect::<Result<Vec<_>, _>>()?;
                controls.sort_by_key(|(_, control)| control.compile_meta.index);

                compile_indices.push((node_key, mir.nodes.len()));
                let mir_node = mir.add_custom_node(key_id(node_key));
                for (key, control) in controls {
                    let meta = control.compile_meta;
                    mir_node.add_value_socket(group_index(key)?, meta.written_to, meta.read_from, control.kind.is_extract());
                }
            }
            NodeKind::Group { inner } => {
                let portals = &project
                    .surface(*inner)
                    .ok_or_else(|| BuildError::invariant("group surface vanished during build"))?
                    .portals;

                compile_indices.push((node_key, mir.nodes.len()));
                let mir_node = mir.add_group_node(key_id(*inner));
                for portal in portals {
                    let target = portal
                        .external_controls
                        .first()
                        .ok_or_else(|| BuildError::invariant("group portal without external controls"))?;
                    mir_node.add_value_socket(group_index(*target)?, portal.written, portal.read, portal.is_extractor);
                }
            }
            NodeKind::Portal(_) => {}
        }
    }

    for (node, index) in compile_indices {
        if let Some(node) = project.node_mut(node) {
            node.compile_index = Some(index);
        }
    }
    Ok(())
}

/// Builds the module description of one surface and writes its portal
/// metadata back to the model. Nested surfaces must already be built.
pub fn build_surface(project: &mut Project, key: SurfaceKey, root: &mut RootMir) -> Result<SurfaceMir, BuildError> {
    let (is_root, name) = project
        .surface(key)
        .map(|surface| (surface.is_root(), surface.name.clone()))
        .ok_or_else(|| BuildError::invariant("surface vanished during build"))?;
    let nodes = live_nodes(project, key)?;

    let mut table = GroupTable::new();
    union_connections(project, &nodes, &mut table)?;
    merge_group_portals(project, &nodes, &mut table)?;

    let mut mir = SurfaceMir::new(key_id(key), name);
    let mut portals = SurfacePortals::default();
    let indices = classify_groups(project, &nodes, &table, is_root, &mut mir, root, &mut portals)?;
    wire_nodes(project, &nodes, &table, &indices, &mut mir)?;

    debug!(
        surface = %mir.name,
        groups = mir.groups.len(),
        nodes = mir.nodes.len(),
        sockets = mir.socket_count(),
        "built surface"
    );

    if let Some(surface) = project.surface_mut(key) {
        if is_root {
            surface.root_portals = portals.root;
        } else {
            surface.portals = portals.group;
        }
    }
    Ok(mir)
}
