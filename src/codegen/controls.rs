use crate::common::ControlType;
use crate::error::{CompileError, CompileResult, ErrorKind, SourceRange};
use crate::values::{Array, Midi, Num, Type, Value};

use super::ir::{ControlField, Function};

/// Name of the one property every control kind exposes.
pub const VALUE_PROPERTY: &str = "value";

/// How code reads and writes the properties of one control kind.
#[derive(Clone, Debug)]
pub struct ControlDescriptor {
    kind: ControlType,
    value_type: Type,
}

impl ControlDescriptor {
    pub fn new(kind: ControlType, value_type: Type) -> Self {
        Self { kind, value_type }
    }

    pub fn kind(&self) -> ControlType {
        self.kind
    }

    pub fn value_type(&self) -> &Type {
        &self.value_type
    }

    pub fn property_type(&self, prop: &str) -> Option<&Type> {
        (prop == VALUE_PROPERTY).then_some(&self.value_type)
    }

    /// Emits a read of `prop` from the control bound to slot `index`.
    pub fn read_property(
        &self,
        function: &mut Function,
        index: usize,
        prop: &str,
        range: SourceRange,
    ) -> CompileResult<Value> {
        let ty = self
            .property_type(prop)
            .ok_or_else(|| CompileError::new(ErrorKind::InvalidProperty(prop.to_owned()), range))?;

        Ok(match ty {
            Type::Num => Value::Num(Num {
                vec: function.read_control(index, ControlField::Lanes),
                form: function.read_control(index, ControlField::Form),
                active: function.read_control(index, ControlField::Active),
                is_const: false,
                range,
            }),
            Type::Midi => Value::Midi(Midi {
                reg: function.read_control(index, ControlField::Midi),
                is_const: false,
                range,
            }),
            Type::Array(element) => Value::Array(Array {
                element: (**element).clone(),
                reg: function.read_control(index, ControlField::Array),
                is_const: false,
                range,
            }),
            Type::Tuple(_) => return Err(CompileError::type_mismatch(ty, "control", range)),
        })
    }

    /// Emits a write of `value` into `prop` of the control bound to slot `index`.
    pub fn write_property(
        &self,
        function: &mut Function,
        index: usize,
        prop: &str,
        value: &Value,
        range: SourceRange,
    ) -> CompileResult<()> {
        let ty = self
            .property_type(prop)
            .ok_or_else(|| CompileError::new(ErrorKind::InvalidProperty(prop.to_owned()), range))?;
        value.expect_type(ty)?;

        match value {
            Value::Num(num) => {
                function.write_control(index, ControlField::Lanes, num.vec);
                function.write_control(index, ControlField::Form, num.form);
                function.write_control(index, ControlField::Active, num.active);
            }
            Value::Midi(midi) => function.write_control(index, ControlField::Midi, midi.reg),
            Value::Array(array) => function.write_control(index, ControlField::Array, array.reg),
            Value::Tuple(_) => return Err(CompileError::type_mismatch(ty, value.ty(), value.range())),
        }
        Ok(())
    }
}

/// Descriptors for the control kinds custom node code can reference.
pub fn standard_controls() -> Vec<ControlDescriptor> {
    vec![
        ControlDescriptor::new(ControlType::Number, Type::Num),
        ControlDescriptor::new(ControlType::Midi, Type::Midi),
        ControlDescriptor::new(ControlType::NumExtract, Type::array_of(Type::Num)),
        ControlDescriptor::new(ControlType::MidiExtract, Type::array_of(Type::Midi)),
    ]
}
