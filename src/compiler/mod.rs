/// Full rebuild of a project into a `Transaction`.
///
/// A build resets compile metadata, compiles every custom node, then runs the
/// value-group builder over every surface with nested surfaces first, so a
/// group node always sees the portals of the surface it contains.
mod block;
mod surface;

pub use block::{compile_custom_nodes, reset_compile_meta};
pub use surface::{build_surface, live_nodes, union_connections, GroupKey, GroupTable, ValueGroup};

use std::sync::Arc;

use tracing::debug;

use crate::codegen::Registry;
use crate::error::BuildError;
use crate::mir::{RootMir, Transaction};
use crate::model::Project;


#[derive(Clone, Debug)]
pub struct Compiler {
    registry: Arc<Registry>,
}

impl Compiler {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn build(&self, project: &mut Project) -> Result<Transaction, BuildError> {
        reset_compile_meta(project);
        let blocks = compile_custom_nodes(&self.registry, project)?;

        let mut root = RootMir::default();
        let mut surfaces = Vec::new();
        for surface in project.surfaces_inner_first() {
            surfaces.push(build_surface(project, surface, &mut root)?);
        }

        debug!(
            surfaces = surfaces.len(),
            blocks = blocks.len(),
            root_sockets = root.sockets.len(),
            "build finished"
        );

        Ok(Transaction {
            surfaces,
            blocks,
            root: Some(root),
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Arc::new(Registry::standard()))
    }
}
