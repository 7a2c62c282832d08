//! Enumerations shared by the expression language, the code generator and the graph model.

use std::fmt;
use std::ops::BitOrAssign;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ControlType {
    Number,
    Midi,
    NumExtract,
    MidiExtract,
    NumPortal,
    MidiPortal,
    Graph,
}

impl ControlType {
    pub fn is_extract(self) -> bool {
        matches!(self, ControlType::NumExtract | ControlType::MidiExtract)
    }

    pub fn is_portal(self) -> bool {
        matches!(self, ControlType::NumPortal | ControlType::MidiPortal)
    }

    /// Controls can only be wired to controls that carry the same kind of signal.
    pub fn wire_type(self) -> WireType {
        match self {
            ControlType::Midi | ControlType::MidiExtract | ControlType::MidiPortal => WireType::Midi,
            _ => WireType::Num,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlType::Number => "num",
            ControlType::Midi => "midi",
            ControlType::NumExtract => "numextract",
            ControlType::MidiExtract => "midiextract",
            ControlType::NumPortal => "numportal",
            ControlType::MidiPortal => "midiportal",
            ControlType::Graph => "graph",
        }
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WireType {
    Num,
    Midi,
}

/// How a custom node's code uses one of its controls. Reads and writes
/// accumulate over a compile into `Bidirectional`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ControlDirection {
    #[default]
    None,
    Input,
    Output,
    Bidirectional,
}

impl ControlDirection {
    pub fn is_read(self) -> bool {
        matches!(self, ControlDirection::Input | ControlDirection::Bidirectional)
    }

    pub fn is_written(self) -> bool {
        matches!(self, ControlDirection::Output | ControlDirection::Bidirectional)
    }
}

impl BitOrAssign for ControlDirection {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = match (*self, rhs) {
            (a, ControlDirection::None) => a,
            (ControlDirection::None, b) => b,
            (a, b) if a == b => a,
            _ => ControlDirection::Bidirectional,
        };
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OperatorType {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    LogicalAnd,
    LogicalOr,
    LogicalEqual,
    LogicalNotEqual,
    LogicalGt,
    LogicalLt,
    LogicalGte,
    LogicalLte,
}

impl OperatorType {
    /// The operation as a verb, for error messages.
    pub fn verb(self) -> &'static str {
        match self {
            OperatorType::Add => "add",
            OperatorType::Subtract => "subtract",
            OperatorType::Multiply => "multiply",
            OperatorType::Divide => "divide",
            OperatorType::Modulo => "modulo",
            OperatorType::Power => "power",
            OperatorType::BitwiseAnd => "bitwise AND",
            OperatorType::BitwiseOr => "bitwise OR",
            OperatorType::BitwiseXor => "bitwise XOR",
            OperatorType::LogicalAnd => "logical AND",
            OperatorType::LogicalOr => "logical OR",
            OperatorType::LogicalEqual => "compare",
            OperatorType::LogicalNotEqual => "compare",
            OperatorType::LogicalGt => "compare",
            OperatorType::LogicalLt => "compare",
            OperatorType::LogicalGte => "compare",
            OperatorType::LogicalLte => "compare",
        }
    }
}
