use std::fmt;

use thiserror::Error;

/// A line/column position in the source text of a custom node.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourcePos {
    pub line: i32,
    pub column: i32,
}

impl SourcePos {
    /// Position used for values synthesized by the compiler that have no source text.
    pub const UNDEFINED: SourcePos = SourcePos {
        line: -1,
        column: -1,
    };

    pub const fn new(line: i32, column: i32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceRange {
    pub start: SourcePos,
    pub end: SourcePos,
}

impl SourceRange {
    pub const UNDEFINED: SourceRange = SourceRange {
        start: SourcePos::UNDEFINED,
        end: SourcePos::UNDEFINED,
    };

    pub const fn new(start: SourcePos, end: SourcePos) -> Self {
        Self { start, end }
    }

    /// Range covering both `self` and `other`.
    pub fn to(self, other: SourceRange) -> Self {
        Self {
            start: self.start,
            end: other.end,
        }
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("expected a {expected} here, found a {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("`{0}` is not a valid function")]
    UnknownFunction(String),

    #[error("the variable `{0}` hasn't been set yet")]
    UnsetVariable(String),

    #[error("`{0}` isn't a valid property here")]
    InvalidProperty(String),

    #[error("you're trying to {verb} {left} values to {right} ones")]
    ArityMismatch {
        verb: &'static str,
        left: usize,
        right: usize,
    },

    #[error("`{function}` takes {expected} arguments, found {found}")]
    ArgumentCount {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("this operator doesn't work on these types of values")]
    UnsupportedOperator,

    #[error("only {0} form parameters are allowed here")]
    TooManyFormParams(usize),

    #[error("there is no way to convert values to the {0} form")]
    NoConverter(String),

    #[error("{0} is not supported")]
    Reserved(&'static str),
}

/// A user-facing compile failure pointing at the offending source span.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} ({range})")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub range: SourceRange,
}

impl CompileError {
    pub fn new(kind: ErrorKind, range: SourceRange) -> Self {
        Self { kind, range }
    }

    pub fn type_mismatch(expected: impl fmt::Display, found: impl fmt::Display, range: SourceRange) -> Self {
        Self::new(
            ErrorKind::TypeMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            },
            range,
        )
    }

    pub fn arity(verb: &'static str, left: usize, right: usize, range: SourceRange) -> Self {
        Self::new(ErrorKind::ArityMismatch { verb, left, right }, range)
    }

    pub fn unsupported_operator(range: SourceRange) -> Self {
        Self::new(ErrorKind::UnsupportedOperator, range)
    }

    pub fn reserved(feature: &'static str, range: SourceRange) -> Self {
        Self::new(ErrorKind::Reserved(feature), range)
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// Broken assumptions inside the value-group builder. These are not caused by
/// user code and abort the whole build.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl BuildError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}

/// Rejected edits to the graph model.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("cannot connect a {from} control to a {to} control")]
    MismatchedControls { from: String, to: String },

    #[error("controls on different surfaces cannot be connected")]
    DifferentSurfaces,

    #[error("only controls inside a group can be exposed")]
    NotInGroup,

    #[error("the control is already exposed")]
    AlreadyExposed,

    #[error("no such {0}")]
    Missing(&'static str),
}

/// Faults raised while interpreting generated code.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("register r{0} read before it was written")]
    Unassigned(u32),

    #[error("register r{reg} holds {found}, expected {expected}")]
    SlotKind {
        reg: u32,
        expected: &'static str,
        found: &'static str,
    },

    #[error("control slot {0} is not bound")]
    UnboundControl(usize),

    #[error("control slot {index} holds {found}, expected {expected}")]
    StorageKind {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
}

pub type CompileResult<T> = Result<T, CompileError>;
