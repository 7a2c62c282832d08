use tracing::debug;

use crate::ast::Block;
use crate::common::ControlType;
use crate::error::CompileResult;

use super::generator::ExpressionGenerator;
use super::ir::Function;
use super::registry::Registry;
use super::scope::{Scope, ScopeControl};

/// A control a compiled block touches.
pub type BlockControl = ScopeControl;

/// Generated code for one custom node, plus the controls it references in
/// the order their slots were assigned.
#[derive(Clone, Debug)]
pub struct CompiledBlock {
    pub function: Function,
    pub controls: Vec<BlockControl>,
}

impl CompiledBlock {
    pub fn control(&self, name: &str, kind: ControlType) -> Option<&BlockControl> {
        self.controls
            .iter()
            .find(|control| control.name == name && control.kind == kind)
    }
}

/// Generates every statement of `block` into a fresh function and scope.
pub fn compile_block(registry: &Registry, name: &str, block: &Block) -> CompileResult<CompiledBlock> {
    let generator = ExpressionGenerator::new(registry);
    let mut function = Function::new(name);
    let mut scope = Scope::new();

    for statement in &block.statements {
        generator.generate(statement, &mut function, &mut scope)?;
    }

    debug!(
        block = name,
        insts = function.insts().len(),
        controls = scope.controls().len(),
        "compiled block"
    );

    Ok(CompiledBlock {
        function,
        controls: scope.into_controls(),
    })
}
