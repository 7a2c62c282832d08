//! The parsed expression language.
//!
//! Parsing source text is done elsewhere; the compiler consumes these trees.
//! The constructor helpers build nodes with undefined source ranges, which is
//! what hosts without a parser (and tests) need.

use crate::common::{ControlType, OperatorType};
use crate::error::SourceRange;
use crate::values::FormType;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Positive,
    Negative,
    Not,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PostfixOp {
    Increment,
    Decrement,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

/// `name:kind.prop`, e.g. `:freq.value` reads the `value` of the number control `freq`.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlRef {
    pub name: String,
    pub kind: ControlType,
    pub prop: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AssignableKind {
    Variable(String),
    Control(ControlRef),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assignable {
    pub kind: AssignableKind,
    pub range: SourceRange,
}

/// Left-hand side of an assignment or postfix expression; more than one
/// target makes it a destructuring tuple target.
#[derive(Clone, Debug, PartialEq)]
pub struct LValue {
    pub targets: Vec<Assignable>,
    pub range: SourceRange,
}

impl LValue {
    pub fn is_tuple(&self) -> bool {
        self.targets.len() > 1
    }
}

/// Target of a cast: `expr::form(args...)`.
#[derive(Clone, Debug, PartialEq)]
pub struct FormTarget {
    pub form: FormType,
    pub args: Vec<Expression>,
    pub range: SourceRange,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Note(f32),
    Number(f32),
    Tuple(Vec<Expression>),
    Call {
        name: String,
        args: Vec<Expression>,
    },
    Cast {
        expr: Box<Expression>,
        target: FormTarget,
        convert: bool,
    },
    Control(ControlRef),
    Variable(String),
    Math {
        op: OperatorType,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expression>,
    },
    Assign {
        op: AssignOp,
        left: LValue,
        right: Box<Expression>,
    },
    Postfix {
        op: PostfixOp,
        left: LValue,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    pub kind: ExprKind,
    pub range: SourceRange,
}

/// The statements of a custom node, in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    pub statements: Vec<Expression>,
}

impl Block {
    pub fn new(statements: Vec<Expression>) -> Self {
        Self { statements }
    }
}

impl From<Vec<Expression>> for Block {
    fn from(statements: Vec<Expression>) -> Self {
        Block::new(statements)
    }
}

impl Assignable {
    pub fn variable(name: &str) -> Self {
        Self {
            kind: AssignableKind::Variable(name.to_owned()),
            range: SourceRange::UNDEFINED,
        }
    }

    pub fn control(name: &str, kind: ControlType, prop: &str) -> Self {
        Self {
            kind: AssignableKind::Control(ControlRef {
                name: name.to_owned(),
                kind,
                prop: prop.to_owned(),
            }),
            range: SourceRange::UNDEFINED,
        }
    }
}

impl From<Assignable> for LValue {
    fn from(target: Assignable) -> Self {
        let range = target.range;
        LValue {
            targets: vec![target],
            range,
        }
    }
}

impl From<Vec<Assignable>> for LValue {
    fn from(targets: Vec<Assignable>) -> Self {
        let range = match (targets.first(), targets.last()) {
            (Some(first), Some(last)) => first.range.to(last.range),
            _ => SourceRange::UNDEFINED,
        };
        LValue { targets, range }
    }
}

impl Expression {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            range: SourceRange::UNDEFINED,
        }
    }

    pub fn at(mut self, range: SourceRange) -> Self {
        self.range = range;
        self
    }

    pub fn number(value: f32) -> Self {
        Self::new(ExprKind::Number(value))
    }

    pub fn note(note: f32) -> Self {
        Self::new(ExprKind::Note(note))
    }

    pub fn tuple(items: Vec<Expression>) -> Self {
        Self::new(ExprKind::Tuple(items))
    }

    pub fn variable(name: &str) -> Self {
        Self::new(ExprKind::Variable(name.to_owned()))
    }

    pub fn control(name: &str, kind: ControlType, prop: &str) -> Self {
        Self::new(ExprKind::Control(ControlRef {
            name: name.to_owned(),
            kind,
            prop: prop.to_owned(),
        }))
    }

    pub fn call(name: &str, args: Vec<Expression>) -> Self {
        Self::new(ExprKind::Call {
            name: name.to_owned(),
            args,
        })
    }

    pub fn cast(expr: Expression, form: FormType, args: Vec<Expression>) -> Self {
        Self::new(ExprKind::Cast {
            expr: Box::new(expr),
            target: FormTarget {
                form,
                args,
                range: SourceRange::UNDEFINED,
            },
            convert: false,
        })
    }

    pub fn math(op: OperatorType, left: Expression, right: Expression) -> Self {
        Self::new(ExprKind::Math {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(op: UnaryOp, expr: Expression) -> Self {
        Self::new(ExprKind::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    pub fn assign(op: AssignOp, left: impl Into<LValue>, right: Expression) -> Self {
        Self::new(ExprKind::Assign {
            op,
            left: left.into(),
            right: Box::new(right),
        })
    }

    pub fn postfix(op: PostfixOp, left: impl Into<LValue>) -> Self {
        Self::new(ExprKind::Postfix {
            op,
            left: left.into(),
        })
    }
}
