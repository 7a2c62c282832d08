use std::collections::HashMap;

use tracing::{debug, trace};

use crate::common::{ControlType, OperatorType};
use crate::error::{CompileError, CompileResult, ErrorKind, SourceRange};
use crate::values::{FormType, Num, Tuple, Type, Value};

use super::controls::{standard_controls, ControlDescriptor};
use super::converters::Converter;
use super::functions::{standard_functions, Builtin, CallContext};
use super::ir::Function;
use super::operators::{standard_operators, Operator};

type OperatorKey = (OperatorType, Type, Type);

/// Collects operators, functions, converters and control kinds, then freezes
/// them into a `Registry`.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    operators: HashMap<OperatorKey, Box<dyn Operator>>,
    functions: HashMap<String, Vec<Box<dyn Builtin>>>,
    converters: HashMap<FormType, Converter>,
    controls: HashMap<ControlType, ControlDescriptor>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operator, replacing any earlier one for the same operand types.
    pub fn operator(mut self, operator: Box<dyn Operator>) -> Self {
        let key = (operator.kind(), operator.left_type(), operator.right_type());
        self.operators.insert(key, operator);
        self
    }

    /// Adds an overload. Overloads of one name are tried in registration order.
    pub fn function(mut self, function: Box<dyn Builtin>) -> Self {
        self.functions
            .entry(function.name().to_owned())
            .or_default()
            .push(function);
        self
    }

    pub fn converter(mut self, to: FormType) -> Self {
        self.converters.insert(to, Converter::new(to));
        self
    }

    pub fn control(mut self, descriptor: ControlDescriptor) -> Self {
        self.controls.insert(descriptor.kind(), descriptor);
        self
    }

    /// Adds every built-in operator, function, converter and control kind.
    pub fn with_standard_library(self) -> Self {
        let builder = standard_operators()
            .into_iter()
            .fold(self, |builder, op| builder.operator(op));
        let builder = standard_functions()
            .into_iter()
            .fold(builder, |builder, function| builder.function(function));
        let builder = [
            FormType::Linear,
            FormType::Control,
            FormType::Frequency,
            FormType::Note,
            FormType::Db,
            FormType::Seconds,
            FormType::Beats,
            FormType::Samples,
        ]
        .into_iter()
        .fold(builder, |builder, form| builder.converter(form));
        standard_controls()
            .into_iter()
            .fold(builder, |builder, descriptor| builder.control(descriptor))
    }

    pub fn build(self) -> Registry {
        debug!(
            operators = self.operators.len(),
            functions = self.functions.len(),
            converters = self.converters.len(),
            controls = self.controls.len(),
            "registry built"
        );
        Registry {
            operators: self.operators,
            functions: self.functions,
            converters: self.converters,
            controls: self.controls,
        }
    }
}

/// Lookup tables for everything custom node code can call. Immutable once
/// built and shared between compiles.
#[derive(Debug)]
pub struct Registry {
    operators: HashMap<OperatorKey, Box<dyn Operator>>,
    functions: HashMap<String, Vec<Box<dyn Builtin>>>,
    converters: HashMap<FormType, Converter>,
    controls: HashMap<ControlType, ControlDescriptor>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// The registry with the full standard library.
    pub fn standard() -> Self {
        RegistryBuilder::new().with_standard_library().build()
    }

    // ========================================================================
    // Operators
    // ========================================================================

    pub fn get_operator(&self, kind: OperatorType, left: &Type, right: &Type) -> Option<&dyn Operator> {
        self.operators
            .get(&(kind, left.clone(), right.clone()))
            .map(Box::as_ref)
    }

    pub fn always_get_operator(
        &self,
        kind: OperatorType,
        left: &Type,
        right: &Type,
        range: SourceRange,
    ) -> CompileResult<&dyn Operator> {
        self.get_operator(kind, left, right)
            .ok_or_else(|| CompileError::unsupported_operator(range))
    }

    /// Applies an operator, distributing it piecewise over tuples.
    ///
    /// Two tuples must have the same number of items and combine item by
    /// item; a tuple and a non-tuple combine by pairing every item with the
    /// non-tuple. Non-tuple operands go straight to the registered operator.
    pub fn call_operator(
        &self,
        kind: OperatorType,
        function: &mut Function,
        left: Value,
        right: Value,
        range: SourceRange,
    ) -> CompileResult<Value> {
        let items = match (left, right) {
            (Value::Tuple(left), Value::Tuple(right)) => {
                if left.len() != right.len() {
                    return Err(CompileError::arity(kind.verb(), left.len(), right.len(), range));
                }
                left.items
                    .into_iter()
                    .zip(right.items)
                    .map(|(l, r)| self.call_operator(kind, function, l, r, range))
                    .collect::<CompileResult<Vec<_>>>()?
            }
            (Value::Tuple(left), right) => left
                .items
                .into_iter()
                .map(|l| self.call_operator(kind, function, l, right.clone(), range))
                .collect::<CompileResult<Vec<_>>>()?,
            (left, Value::Tuple(right)) => right
                .items
                .into_iter()
                .map(|r| self.call_operator(kind, function, left.clone(), r, range))
                .collect::<CompileResult<Vec<_>>>()?,
            (left, right) => {
                let operator = self.always_get_operator(kind, &left.ty(), &right.ty(), range)?;
                return operator.call(function, left, right, range);
            }
        };
        Ok(Value::Tuple(Tuple::new(items, range)))
    }

    // ========================================================================
    // Functions
    // ========================================================================

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// The first overload accepting `types`, or the first registered overload
    /// so that its own checks can report the mismatch.
    pub fn get_function(&self, name: &str, types: &[Type]) -> Option<&dyn Builtin> {
        let overloads = self.functions.get(name)?;
        let chosen = overloads
            .iter()
            .find(|overload| overload.accepts(types))
            .or_else(|| {
                trace!(name, "no overload accepts the arguments, using the first");
                overloads.first()
            })?;
        Some(&**chosen)
    }

    pub fn call_function(
        &self,
        name: &str,
        function: &mut Function,
        args: Vec<Value>,
        range: SourceRange,
    ) -> CompileResult<Value> {
        let types: Vec<Type> = args.iter().map(Value::ty).collect();
        let builtin = self
            .get_function(name, &types)
            .ok_or_else(|| CompileError::new(ErrorKind::UnknownFunction(name.to_owned()), range))?;
        let mut ctx = CallContext {
            function,
            registry: self,
            range,
        };
        builtin.call(&mut ctx, args)
    }

    // ========================================================================
    // Converters and controls
    // ========================================================================

    pub fn get_converter(&self, to: FormType) -> Option<&Converter> {
        self.converters.get(&to)
    }

    pub fn call_converter(
        &self,
        to: FormType,
        function: &mut Function,
        value: &Num,
        range: SourceRange,
    ) -> CompileResult<Num> {
        let converter = self
            .get_converter(to)
            .ok_or_else(|| CompileError::new(ErrorKind::NoConverter(to.to_string()), range))?;
        Ok(converter.call(function, value, range))
    }

    pub fn get_control(&self, kind: ControlType) -> Option<&ControlDescriptor> {
        self.controls.get(&kind)
    }
}
