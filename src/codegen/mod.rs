/// Code generation for custom node bodies.
///
/// The registry holds every operator, function, converter and control kind the
/// language knows about. The expression generator walks a block's AST against a
/// scope and emits IR into a `Function`; the interpreter runs that IR one
/// sample at a time.
pub mod block;
pub mod controls;
pub mod converters;
pub mod functions;
pub mod generator;
pub mod interpreter;
pub mod ir;
pub mod operators;
pub mod registry;
pub mod scope;

pub use block::{compile_block, BlockControl, CompiledBlock};
pub use controls::ControlDescriptor;
pub use converters::Converter;
pub use functions::{Builtin, CallContext, Parameter, Signature};
pub use generator::ExpressionGenerator;
pub use interpreter::{Interpreter, NumSample, Slot, Storage};
pub use ir::{Function, Inst, Reg};
pub use operators::{ActiveMode, Operator};
pub use registry::{Registry, RegistryBuilder};
pub use scope::{Scope, ScopeControl};

#[cfg(test)]
mod tests;

/// Sample rate and tempo that time-based conversions run against.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeBase {
    pub sample_rate: f32,
    pub bpm: f32,
}

impl TimeBase {
    pub fn new(sample_rate: f32, bpm: f32) -> Self {
        Self { sample_rate, bpm }
    }

    #[inline]
    pub fn beats_per_second(&self) -> f32 {
        self.bpm / 60.0
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            bpm: 120.0,
        }
    }
}
