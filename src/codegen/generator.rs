use arrayvec::ArrayVec;

use crate::ast::{AssignOp, Assignable, AssignableKind, ControlRef, ExprKind, Expression, FormTarget, LValue, PostfixOp, UnaryOp};
use crate::common::{ControlDirection, OperatorType};
use crate::error::{CompileError, CompileResult, ErrorKind, SourceRange};
use crate::values::{FormType, Num, NumValue, Tuple, Type, Value, MAX_FORM_PARAMS};

use super::controls::ControlDescriptor;
use super::ir::{FloatOp, Function, Predicate};
use super::registry::Registry;
use super::scope::Scope;

/// Turns expression trees into IR.
///
/// Each call to [`generate`](Self::generate) emits the code for one expression
/// into `function` and returns the value it produces. Variable bindings and
/// referenced controls accumulate in `scope`. The first error aborts the
/// expression; nothing is recovered locally.
#[derive(Copy, Clone, Debug)]
pub struct ExpressionGenerator<'r> {
    registry: &'r Registry,
}

impl<'r> ExpressionGenerator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn generate(&self, expr: &Expression, function: &mut Function, scope: &mut Scope) -> CompileResult<Value> {
        let range = expr.range;
        match &expr.kind {
            ExprKind::Note(note) => Ok(self.literal(function, NumValue::splat(*note, FormType::Note), range)),
            ExprKind::Number(value) => Ok(self.literal(function, NumValue::splat(*value, FormType::Linear), range)),
            ExprKind::Tuple(items) => self.generate_tuple(items, function, scope, range),
            ExprKind::Call { name, args } => self.generate_call(name, args, function, scope, range),
            ExprKind::Cast {
                expr,
                target,
                convert,
            } => self.generate_cast(expr, target, *convert, function, scope, range),
            ExprKind::Control(control) => self.generate_control(control, function, scope, range),
            ExprKind::Variable(name) => self.generate_variable(name, scope, range),
            ExprKind::Math { op, left, right } => self.generate_math(*op, left, right, function, scope, range),
            ExprKind::Unary { op, expr } => self.generate_unary(*op, expr, function, scope, range),
            ExprKind::Assign { op, left, right } => self.generate_assign(*op, left, right, function, scope, range),
            ExprKind::Postfix { op, left } => self.generate_postfix(*op, left, function, scope, range),
        }
    }

    /// Hook for evaluating constant numbers at compile time. Values pass
    /// through unchanged; the IR is left for the backend to fold.
    pub fn fold_constant(&self, num: Num) -> Num {
        num
    }

    fn literal(&self, function: &mut Function, value: NumValue, range: SourceRange) -> Value {
        Value::Num(function.const_num(value, range))
    }

    fn generate_tuple(
        &self,
        items: &[Expression],
        function: &mut Function,
        scope: &mut Scope,
        range: SourceRange,
    ) -> CompileResult<Value> {
        let items = items
            .iter()
            .map(|item| self.generate(item, function, scope))
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(Value::Tuple(Tuple::new(items, range)))
    }

    fn generate_call(
        &self,
        name: &str,
        args: &[Expression],
        function: &mut Function,
        scope: &mut Scope,
        range: SourceRange,
    ) -> CompileResult<Value> {
        if !self.registry.has_function(name) {
            return Err(CompileError::new(ErrorKind::UnknownFunction(name.to_owned()), range));
        }
        let args = args
            .iter()
            .map(|arg| -> CompileResult<Value> { Ok(self.generate(arg, function, scope)?.with_range(arg.range)) })
            .collect::<CompileResult<Vec<_>>>()?;
        self.registry.call_function(name, function, args, range)
    }

    fn generate_cast(
        &self,
        expr: &Expression,
        target: &FormTarget,
        convert: bool,
        function: &mut Function,
        scope: &mut Scope,
        range: SourceRange,
    ) -> CompileResult<Value> {
        if convert {
            return Err(CompileError::reserved("converting casts", range));
        }

        let base = self.generate(expr, function, scope)?.into_num()?;

        if target.args.len() > MAX_FORM_PARAMS {
            let span = match (target.args.first(), target.args.last()) {
                (Some(first), Some(last)) => first.range.to(last.range),
                _ => target.range,
            };
            return Err(CompileError::new(ErrorKind::TooManyFormParams(MAX_FORM_PARAMS), span));
        }

        let mut is_const = base.is_const;
        let mut params = ArrayVec::new();
        for arg in &target.args {
            let param = self.generate(arg, function, scope)?.into_num()?;
            is_const &= param.is_const;
            params.push(param.vec);
        }

        Ok(Value::Num(Num {
            vec: base.vec,
            form: function.build_form(target.form, params),
            active: base.active,
            is_const,
            range,
        }))
    }

    fn control_descriptor(&self, control: &ControlRef, range: SourceRange) -> CompileResult<&'r ControlDescriptor> {
        self.registry
            .get_control(control.kind)
            .ok_or_else(|| CompileError::type_mismatch("control", control.kind, range))
    }

    fn generate_control(
        &self,
        control: &ControlRef,
        function: &mut Function,
        scope: &mut Scope,
        range: SourceRange,
    ) -> CompileResult<Value> {
        let descriptor = self.control_descriptor(control, range)?;
        let slot = scope.get_control(&control.name, control.kind);
        slot.direction |= ControlDirection::Input;
        let index = slot.index;
        descriptor.read_property(function, index, &control.prop, range)
    }

    fn generate_variable(&self, name: &str, scope: &Scope, range: SourceRange) -> CompileResult<Value> {
        scope
            .find_value(name)
            .cloned()
            .map(|value| value.with_range(range))
            .ok_or_else(|| CompileError::new(ErrorKind::UnsetVariable(name.to_owned()), range))
    }

    fn generate_math(
        &self,
        op: OperatorType,
        left: &Expression,
        right: &Expression,
        function: &mut Function,
        scope: &mut Scope,
        range: SourceRange,
    ) -> CompileResult<Value> {
        let left = self.generate(left, function, scope)?.into_num()?;
        let right = self.generate(right, function, scope)?.into_num()?;
        let operator = self.registry.always_get_operator(op, &Type::Num, &Type::Num, range)?;
        let result = operator.call(function, left.into(), right.into(), range)?.into_num()?;
        Ok(Value::Num(self.fold_constant(result)))
    }

    fn generate_unary(
        &self,
        op: UnaryOp,
        expr: &Expression,
        function: &mut Function,
        scope: &mut Scope,
        range: SourceRange,
    ) -> CompileResult<Value> {
        let num = self.generate(expr, function, scope)?.into_num()?;
        let vec = match op {
            UnaryOp::Positive => num.vec,
            UnaryOp::Negative => {
                let minus_one = function.const_vec([-1.0; 2]);
                function.float(FloatOp::Mul, num.vec, minus_one)
            }
            UnaryOp::Not => {
                let zero = function.const_vec([0.0; 2]);
                let mask = function.compare(Predicate::Eq, num.vec, zero);
                function.mask_to_vec(mask)
            }
        };
        Ok(Value::Num(self.fold_constant(Num {
            vec,
            form: num.form,
            active: num.active,
            is_const: num.is_const,
            range,
        })))
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    fn generate_assign(
        &self,
        op: AssignOp,
        left: &LValue,
        right: &Expression,
        function: &mut Function,
        scope: &mut Scope,
        range: SourceRange,
    ) -> CompileResult<Value> {
        let value = self.generate(right, function, scope)?;

        if !left.is_tuple() {
            let target = left
                .targets
                .first()
                .ok_or_else(|| CompileError::arity("assign", 1, 0, range))?;
            self.assign(op, target, value.clone(), function, scope)?;
            return Ok(value);
        }

        let targets = &left.targets;
        match value.clone().into_tuple() {
            Ok(tuple) => {
                if tuple.len() != targets.len() {
                    return Err(CompileError::arity("assign", tuple.len(), targets.len(), range));
                }
                for (target, item) in targets.iter().zip(tuple.items) {
                    self.assign(op, target, item, function, scope)?;
                }
            }
            Err(single) => {
                for target in targets {
                    self.assign(op, target, single.clone(), function, scope)?;
                }
            }
        }
        Ok(value)
    }

    /// Stores `value` into one target. Compound operators first combine the
    /// target's current number with `value`, which must also be a number.
    fn assign(
        &self,
        op: AssignOp,
        target: &Assignable,
        value: Value,
        function: &mut Function,
        scope: &mut Scope,
    ) -> CompileResult<()> {
        let value = match compound_operator(op) {
            Ok(None) => value,
            Ok(Some(kind)) => {
                let current = self.read_target(target, function, scope)?.into_num()?;
                let value = value.into_num()?;
                let operator = self
                    .registry
                    .always_get_operator(kind, &Type::Num, &Type::Num, target.range)?;
                let combined = operator
                    .call(function, current.into(), value.into(), target.range)?
                    .into_num()?;
                Value::Num(self.fold_constant(combined))
            }
            Err(feature) => return Err(CompileError::reserved(feature, target.range)),
        };
        self.write_target(target, value, function, scope)
    }

    fn read_target(&self, target: &Assignable, function: &mut Function, scope: &mut Scope) -> CompileResult<Value> {
        match &target.kind {
            AssignableKind::Variable(name) => self.generate_variable(name, scope, target.range),
            AssignableKind::Control(control) => self.generate_control(control, function, scope, target.range),
        }
    }

    fn write_target(
        &self,
        target: &Assignable,
        value: Value,
        function: &mut Function,
        scope: &mut Scope,
    ) -> CompileResult<()> {
        match &target.kind {
            AssignableKind::Variable(name) => {
                scope.set_value(name.as_str(), value);
                Ok(())
            }
            AssignableKind::Control(control) => {
                let descriptor = self.control_descriptor(control, target.range)?;
                let slot = scope.get_control(&control.name, control.kind);
                slot.direction |= ControlDirection::Output;
                let index = slot.index;
                descriptor.write_property(function, index, &control.prop, &value, target.range)
            }
        }
    }

    fn generate_postfix(
        &self,
        op: PostfixOp,
        left: &LValue,
        function: &mut Function,
        scope: &mut Scope,
        range: SourceRange,
    ) -> CompileResult<Value> {
        let kind = match op {
            PostfixOp::Increment => OperatorType::Add,
            PostfixOp::Decrement => OperatorType::Subtract,
        };
        let operator = self.registry.always_get_operator(kind, &Type::Num, &Type::Num, range)?;

        let mut is_const = true;
        let mut items = Vec::with_capacity(left.targets.len());
        for target in &left.targets {
            let current = self.read_target(target, function, scope)?.into_num()?;
            is_const &= current.is_const;

            let one = function.const_num(NumValue::splat(1.0, FormType::Linear), target.range);
            let updated = operator
                .call(function, current.into(), one.into(), target.range)?
                .into_num()?;
            let updated = Value::Num(self.fold_constant(updated));

            self.write_target(target, updated.clone(), function, scope)?;
            items.push(updated);
        }

        Ok(Value::Tuple(Tuple {
            items,
            is_const,
            range,
        }))
    }
}

/// The operator a compound assignment combines with, `None` for plain
/// assignment, or the name of the reserved feature.
fn compound_operator(op: AssignOp) -> Result<Option<OperatorType>, &'static str> {
    match op {
        AssignOp::Assign => Ok(None),
        AssignOp::Add => Ok(Some(OperatorType::Add)),
        AssignOp::Subtract => Ok(Some(OperatorType::Subtract)),
        AssignOp::Multiply => Ok(Some(OperatorType::Multiply)),
        AssignOp::Divide => Ok(Some(OperatorType::Divide)),
        AssignOp::Modulo => Ok(Some(OperatorType::Modulo)),
        AssignOp::Power => Err("power assignment"),
    }
}
