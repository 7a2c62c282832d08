use std::fmt;

use crate::common::OperatorType;
use crate::error::{CompileResult, SourceRange};
use crate::values::{Num, Type, Value};

use super::ir::{BoolOp, FloatOp, Function, Intrinsic, IntOp, Predicate, Reg};

/// How the active flags of the operands combine into the result's flag.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActiveMode {
    AnyInput,
    AllInputs,
    FirstInput,
}

impl ActiveMode {
    pub fn combine(self, left: bool, right: bool) -> bool {
        match self {
            ActiveMode::AnyInput => left || right,
            ActiveMode::AllInputs => left && right,
            ActiveMode::FirstInput => left,
        }
    }

    pub fn emit(self, function: &mut Function, left: Reg, right: Reg) -> Reg {
        match self {
            ActiveMode::AnyInput => function.flag(BoolOp::Or, left, right),
            ActiveMode::AllInputs => function.flag(BoolOp::And, left, right),
            ActiveMode::FirstInput => left,
        }
    }
}

/// A binary operation between two values of fixed types.
pub trait Operator: Send + Sync + fmt::Debug {
    fn kind(&self) -> OperatorType;

    fn left_type(&self) -> Type;

    fn right_type(&self) -> Type;

    fn active_mode(&self) -> ActiveMode;

    fn call(
        &self,
        function: &mut Function,
        left: Value,
        right: Value,
        range: SourceRange,
    ) -> CompileResult<Value>;
}

/// Operators between two numbers. The result always takes the left operand's form.
pub trait NumOperator: Send + Sync + fmt::Debug {
    fn kind(&self) -> OperatorType;

    fn active_mode(&self) -> ActiveMode;

    /// Emits the result lanes and active flag.
    fn generate(&self, function: &mut Function, left: &Num, right: &Num) -> (Reg, Reg);
}

impl<T: NumOperator> Operator for T {
    fn kind(&self) -> OperatorType {
        NumOperator::kind(self)
    }

    fn left_type(&self) -> Type {
        Type::Num
    }

    fn right_type(&self) -> Type {
        Type::Num
    }

    fn active_mode(&self) -> ActiveMode {
        NumOperator::active_mode(self)
    }

    fn call(
        &self,
        function: &mut Function,
        left: Value,
        right: Value,
        range: SourceRange,
    ) -> CompileResult<Value> {
        let left = left.into_num()?;
        let right = right.into_num()?;
        let (vec, active) = self.generate(function, &left, &right);
        Ok(Value::Num(Num {
            vec,
            form: left.form,
            active,
            is_const: left.is_const && right.is_const,
            range,
        }))
    }
}

// ============================================================================
// Operator families
// ============================================================================

#[derive(Debug)]
pub struct FloatOperator {
    kind: OperatorType,
    mode: ActiveMode,
    op: FloatOp,
}

impl FloatOperator {
    pub fn new(kind: OperatorType, mode: ActiveMode, op: FloatOp) -> Self {
        Self { kind, mode, op }
    }
}

impl NumOperator for FloatOperator {
    fn kind(&self) -> OperatorType {
        self.kind
    }

    fn active_mode(&self) -> ActiveMode {
        self.mode
    }

    fn generate(&self, function: &mut Function, left: &Num, right: &Num) -> (Reg, Reg) {
        let vec = function.float(self.op, left.vec, right.vec);
        let active = self.mode.emit(function, left.active, right.active);
        (vec, active)
    }
}

#[derive(Debug)]
pub struct IntrinsicOperator {
    kind: OperatorType,
    mode: ActiveMode,
    func: Intrinsic,
}

impl IntrinsicOperator {
    pub fn new(kind: OperatorType, mode: ActiveMode, func: Intrinsic) -> Self {
        Self { kind, mode, func }
    }
}

impl NumOperator for IntrinsicOperator {
    fn kind(&self) -> OperatorType {
        self.kind
    }

    fn active_mode(&self) -> ActiveMode {
        self.mode
    }

    fn generate(&self, function: &mut Function, left: &Num, right: &Num) -> (Reg, Reg) {
        let vec = function.intrinsic(self.func, &[left.vec, right.vec]);
        let active = self.mode.emit(function, left.active, right.active);
        (vec, active)
    }
}

#[derive(Debug)]
pub struct IntOperator {
    kind: OperatorType,
    mode: ActiveMode,
    op: IntOp,
    signed: bool,
}

impl IntOperator {
    pub fn new(kind: OperatorType, mode: ActiveMode, op: IntOp, signed: bool) -> Self {
        Self {
            kind,
            mode,
            op,
            signed,
        }
    }
}

impl NumOperator for IntOperator {
    fn kind(&self) -> OperatorType {
        self.kind
    }

    fn active_mode(&self) -> ActiveMode {
        self.mode
    }

    fn generate(&self, function: &mut Function, left: &Num, right: &Num) -> (Reg, Reg) {
        let vec = function.int(self.op, self.signed, left.vec, right.vec);
        let active = self.mode.emit(function, left.active, right.active);
        (vec, active)
    }
}

#[derive(Debug)]
pub struct ComparisonOperator {
    kind: OperatorType,
    mode: ActiveMode,
    pred: Predicate,
}

impl ComparisonOperator {
    pub fn new(kind: OperatorType, mode: ActiveMode, pred: Predicate) -> Self {
        Self { kind, mode, pred }
    }
}

impl NumOperator for ComparisonOperator {
    fn kind(&self) -> OperatorType {
        self.kind
    }

    fn active_mode(&self) -> ActiveMode {
        self.mode
    }

    fn generate(&self, function: &mut Function, left: &Num, right: &Num) -> (Reg, Reg) {
        let mask = function.compare(self.pred, left.vec, right.vec);
        let vec = function.mask_to_vec(mask);
        let active = self.mode.emit(function, left.active, right.active);
        (vec, active)
    }
}

/// Treats nonzero lanes as true. The result is only active where the
/// combined flag is set and the operation itself yields true.
#[derive(Debug)]
pub struct LogicalOperator {
    kind: OperatorType,
    mode: ActiveMode,
    op: BoolOp,
}

impl LogicalOperator {
    pub fn new(kind: OperatorType, mode: ActiveMode, op: BoolOp) -> Self {
        Self { kind, mode, op }
    }
}

impl NumOperator for LogicalOperator {
    fn kind(&self) -> OperatorType {
        self.kind
    }

    fn active_mode(&self) -> ActiveMode {
        self.mode
    }

    fn generate(&self, function: &mut Function, left: &Num, right: &Num) -> (Reg, Reg) {
        let left_mask = function.truthy(left.vec);
        let right_mask = function.truthy(right.vec);
        let mask = function.mask(self.op, left_mask, right_mask);
        let combined = self.mode.emit(function, left.active, right.active);
        let any = function.any_lane(mask);
        let active = function.flag(BoolOp::And, combined, any);
        (function.mask_to_vec(mask), active)
    }
}

/// The built-in operator table. Every operator works on two numbers; tuples
/// are handled piecewise by the registry.
pub fn standard_operators() -> Vec<Box<dyn Operator>> {
    use ActiveMode::*;
    use OperatorType as Op;

    vec![
        Box::new(FloatOperator::new(Op::Add, AnyInput, FloatOp::Add)),
        Box::new(FloatOperator::new(Op::Subtract, AnyInput, FloatOp::Sub)),
        Box::new(FloatOperator::new(Op::Multiply, AllInputs, FloatOp::Mul)),
        Box::new(FloatOperator::new(Op::Divide, AllInputs, FloatOp::Div)),
        Box::new(FloatOperator::new(Op::Modulo, AllInputs, FloatOp::Rem)),
        Box::new(IntrinsicOperator::new(Op::Power, FirstInput, Intrinsic::Pow)),
        Box::new(IntOperator::new(Op::BitwiseAnd, AnyInput, IntOp::And, true)),
        Box::new(IntOperator::new(Op::BitwiseOr, AnyInput, IntOp::Or, true)),
        Box::new(IntOperator::new(Op::BitwiseXor, AnyInput, IntOp::Xor, true)),
        Box::new(LogicalOperator::new(Op::LogicalAnd, AllInputs, BoolOp::And)),
        Box::new(LogicalOperator::new(Op::LogicalOr, AnyInput, BoolOp::Or)),
        Box::new(ComparisonOperator::new(Op::LogicalEqual, AnyInput, Predicate::Eq)),
        Box::new(ComparisonOperator::new(Op::LogicalNotEqual, AnyInput, Predicate::Ne)),
        Box::new(ComparisonOperator::new(Op::LogicalGt, AnyInput, Predicate::Gt)),
        Box::new(ComparisonOperator::new(Op::LogicalLt, AnyInput, Predicate::Lt)),
        Box::new(ComparisonOperator::new(Op::LogicalGte, AnyInput, Predicate::Ge)),
        Box::new(ComparisonOperator::new(Op::LogicalLte, AnyInput, Predicate::Le)),
    ]
}
