use std::sync::Arc;

use tracing::warn;

use crate::codegen::{compile_block, CompiledBlock, Registry};
use crate::error::BuildError;
use crate::mir::BlockMir;
use crate::model::{key_id, CompileMeta, NodeKey, NodeKind, Project};

/// Clears every control's compile metadata and every node's compile index.
pub fn reset_compile_meta(project: &mut Project) {
    let controls: Vec<_> = project.controls().map(|(key, _)| key).collect();
    for key in controls {
        if let Some(control) = project.control_mut(key) {
            control.compile_meta = CompileMeta::default();
        }
    }
    let nodes: Vec<_> = project.nodes().map(|(key, _)| key).collect();
    for key in nodes {
        if let Some(node) = project.node_mut(key) {
            node.compile_index = None;
        }
    }
}

/// Compiles every custom node of the project.
///
/// A node that fails keeps its last good block and is marked invalid so the
/// builder leaves it out; the failure is logged and does not stop the pass.
pub fn compile_custom_nodes(registry: &Registry, project: &mut Project) -> Result<Vec<BlockMir>, BuildError> {
    let custom_nodes: Vec<(NodeKey, String)> = project
        .nodes()
        .filter_map(|(key, node)| node.custom().map(|_| (key, node.name.clone())))
        .collect();

    let mut blocks = Vec::with_capacity(custom_nodes.len());
    for (key, name) in custom_nodes {
        let block = match project.node(key).and_then(|node| node.custom()) {
            Some(custom) => custom.block.clone(),
            None => continue,
        };

        match compile_block(registry, &name, &block) {
            Ok(compiled) => {
                apply_block_controls(project, key, &compiled)?;
                let compiled = Arc::new(compiled);
                set_custom_state(project, key, |custom| {
                    custom.compiled = Some(Arc::clone(&compiled));
                    custom.valid = true;
                    custom.error = None;
                });
                blocks.push(BlockMir {
                    id: key_id(key),
                    block: compiled,
                });
            }
            Err(err) => {
                warn!(node = %name, range = %err.range, "custom node failed to compile: {}", err.kind);
                set_custom_state(project, key, |custom| {
                    custom.valid = false;
                    custom.error = Some(err);
                });
            }
        }
    }
    Ok(blocks)
}

fn set_custom_state(project: &mut Project, key: NodeKey, update: impl FnOnce(&mut crate::model::CustomNode)) {
    if let Some(NodeKind::Custom(custom)) = project.node_mut(key).map(|node| &mut node.kind) {
        update(custom);
    }
}

/// Creates the controls a block references and records how it uses them.
/// Controls the block no longer references keep slots after all referenced
/// ones and count as neither read nor written.
fn apply_block_controls(project: &mut Project, node: NodeKey, compiled: &CompiledBlock) -> Result<(), BuildError> {
    let mut referenced = Vec::with_capacity(compiled.controls.len());
    for control in &compiled.controls {
        let key = project
            .ensure_control(node, &control.name, control.kind)
            .map_err(|err| BuildError::invariant(err.to_string()))?;
        if let Some(model) = project.control_mut(key) {
            model.compile_meta = CompileMeta {
                index: control.index,
                written_to: control.direction.is_written(),
                read_from: control.direction.is_read(),
            };
        }
        referenced.push(key);
    }

    let stale: Vec<_> = project
        .node(node)
        .map(|node| node.controls.clone())
        .unwrap_or_default()
        .into_iter()
        .filter(|key| !referenced.contains(key))
        .collect();
    for (offset, key) in stale.into_iter().enumerate() {
        if let Some(model) = project.control_mut(key) {
            model.compile_meta = CompileMeta {
                index: compiled.controls.len() + offset,
                written_to: false,
                read_from: false,
            };
        }
    }
    Ok(())
}
