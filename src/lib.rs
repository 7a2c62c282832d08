//! Graph-to-IR builder and expression code generator for the Maxim audio
//! patching language.
//!
//! A [`model::Project`] holds the patch being edited. [`compiler::Compiler`]
//! turns it into a [`mir::Transaction`]: every custom node's expression block
//! is generated into IR by [`codegen`], and the controls of every surface are
//! merged into value groups describing the storage the linked module needs.

pub mod ast;
pub mod codegen;
pub mod common;
pub mod compiler;
pub mod error;
pub mod mir;
pub mod model;
pub mod runtime;
pub mod values;

pub use codegen::{compile_block, CompiledBlock, Registry, RegistryBuilder, TimeBase};
pub use compiler::Compiler;
pub use error::{BuildError, CompileError, ErrorKind, ModelError};
pub use mir::Transaction;
pub use model::Project;
pub use runtime::DeploySlot;
