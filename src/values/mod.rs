//! Types and values flowing through the code generator.
//!
//! A `Value` is a compile-time handle: its numbers live in registers of the
//! function being generated, so copying a `Value` never copies runtime data.

mod form;
mod midi;
mod num;

use std::fmt;

pub use form::{Form, FormType, MAX_FORM_PARAMS};
pub use midi::{MidiData, MidiEvent, MidiEventType, MAX_MIDI_EVENTS};
pub use num::NumValue;

use crate::codegen::ir::Reg;
use crate::common::ControlType;
use crate::error::{CompileError, CompileResult, SourceRange};

/// Element count of extract arrays.
pub const ARRAY_SIZE: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Num,
    Midi,
    Tuple(Vec<Type>),
    Array(Box<Type>),
}

impl Type {
    pub fn array_of(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    /// Storage type of a value group whose controls are of kind `control`.
    pub fn of_control(control: ControlType) -> Self {
        match control {
            ControlType::Number | ControlType::NumPortal | ControlType::Graph => Type::Num,
            ControlType::Midi | ControlType::MidiPortal => Type::Midi,
            ControlType::NumExtract => Type::array_of(Type::Num),
            ControlType::MidiExtract => Type::array_of(Type::Midi),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Num => f.write_str("num"),
            Type::Midi => f.write_str("midi"),
            Type::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
            Type::Array(element) => write!(f, "{}[]", element),
        }
    }
}

/// A numeric value: lanes, form and active flag, each in its own register.
#[derive(Clone, Debug, PartialEq)]
pub struct Num {
    pub vec: Reg,
    pub form: Reg,
    pub active: Reg,
    pub is_const: bool,
    pub range: SourceRange,
}

impl Num {
    /// Same form and active flag, new lanes.
    pub fn with_vec(&self, vec: Reg, is_const: bool) -> Num {
        Num {
            vec,
            form: self.form,
            active: self.active,
            is_const,
            range: SourceRange::UNDEFINED,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Midi {
    pub reg: Reg,
    pub is_const: bool,
    pub range: SourceRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tuple {
    pub items: Vec<Value>,
    pub is_const: bool,
    pub range: SourceRange,
}

impl Tuple {
    /// Builds a tuple that is constant only if every item is.
    pub fn new(items: Vec<Value>, range: SourceRange) -> Self {
        let is_const = items.iter().all(Value::is_const);
        Self {
            items,
            is_const,
            range,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Array {
    pub element: Type,
    pub reg: Reg,
    pub is_const: bool,
    pub range: SourceRange,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Num(Num),
    Midi(Midi),
    Tuple(Tuple),
    Array(Array),
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::Num(_) => Type::Num,
            Value::Midi(_) => Type::Midi,
            Value::Tuple(tuple) => Type::Tuple(tuple.items.iter().map(Value::ty).collect()),
            Value::Array(array) => Type::array_of(array.element.clone()),
        }
    }

    pub fn is_const(&self) -> bool {
        match self {
            Value::Num(num) => num.is_const,
            Value::Midi(midi) => midi.is_const,
            Value::Tuple(tuple) => tuple.is_const,
            Value::Array(array) => array.is_const,
        }
    }

    pub fn range(&self) -> SourceRange {
        match self {
            Value::Num(num) => num.range,
            Value::Midi(midi) => midi.range,
            Value::Tuple(tuple) => tuple.range,
            Value::Array(array) => array.range,
        }
    }

    pub fn with_range(mut self, range: SourceRange) -> Self {
        match &mut self {
            Value::Num(num) => num.range = range,
            Value::Midi(midi) => midi.range = range,
            Value::Tuple(tuple) => tuple.range = range,
            Value::Array(array) => array.range = range,
        }
        self
    }

    pub fn into_num(self) -> CompileResult<Num> {
        match self {
            Value::Num(num) => Ok(num),
            other => Err(CompileError::type_mismatch(Type::Num, other.ty(), other.range())),
        }
    }

    pub fn as_num(&self) -> CompileResult<&Num> {
        match self {
            Value::Num(num) => Ok(num),
            other => Err(CompileError::type_mismatch(Type::Num, other.ty(), other.range())),
        }
    }

    pub fn into_tuple(self) -> Result<Tuple, Value> {
        match self {
            Value::Tuple(tuple) => Ok(tuple),
            other => Err(other),
        }
    }

    /// Fails with a type mismatch unless this value has exactly type `expected`.
    pub fn expect_type(&self, expected: &Type) -> CompileResult<()> {
        let found = self.ty();
        if &found == expected {
            Ok(())
        } else {
            Err(CompileError::type_mismatch(expected, found, self.range()))
        }
    }
}

impl From<Num> for Value {
    fn from(num: Num) -> Self {
        Value::Num(num)
    }
}

impl From<Midi> for Value {
    fn from(midi: Midi) -> Self {
        Value::Midi(midi)
    }
}

impl From<Tuple> for Value {
    fn from(tuple: Tuple) -> Self {
        Value::Tuple(tuple)
    }
}
