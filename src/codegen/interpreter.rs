/// Reference interpreter for generated functions.
///
/// Runs a function's instruction list once per sample against a set of
/// control storages. Used to check generated code and to drive the node graph
/// without a native backend.
use crate::error::ExecError;
use crate::values::{Form, MidiData, Num, NumValue, Type, ARRAY_SIZE};

use super::ir::{ControlField, Function, Inst, IntOp, Lanes, Reg};
use super::TimeBase;

/// One sample of a numeric value.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct NumSample {
    pub lanes: Lanes,
    pub form: Form,
    pub active: bool,
}

impl From<NumValue> for NumSample {
    fn from(value: NumValue) -> Self {
        Self {
            lanes: value.lanes(),
            form: Form::new(value.form),
            active: false,
        }
    }
}

/// Runtime storage behind a control slot or value group.
#[derive(Clone, Debug, PartialEq)]
pub enum Storage {
    Num(NumSample),
    Midi(MidiData),
    Array(Vec<Storage>),
}

impl Storage {
    /// Zeroed storage for a value of type `ty`.
    pub fn for_type(ty: &Type) -> Self {
        match ty {
            Type::Num | Type::Tuple(_) => Storage::Num(NumSample::default()),
            Type::Midi => Storage::Midi(MidiData::default()),
            Type::Array(element) => Storage::Array(vec![Storage::for_type(element); ARRAY_SIZE]),
        }
    }

    pub fn as_num(&self) -> Option<&NumSample> {
        match self {
            Storage::Num(num) => Some(num),
            _ => None,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Storage::Num(_) => "num",
            Storage::Midi(_) => "midi",
            Storage::Array(_) => "array",
        }
    }
}

impl From<NumValue> for Storage {
    fn from(value: NumValue) -> Self {
        Storage::Num(value.into())
    }
}

/// Contents of a register.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    Vec(Lanes),
    Mask([bool; 2]),
    Flag(bool),
    Form(Form),
    Midi(MidiData),
    Array(Vec<Storage>),
}

impl Slot {
    fn kind_name(&self) -> &'static str {
        match self {
            Slot::Vec(_) => "vec",
            Slot::Mask(_) => "mask",
            Slot::Flag(_) => "flag",
            Slot::Form(_) => "form",
            Slot::Midi(_) => "midi",
            Slot::Array(_) => "array",
        }
    }
}

macro_rules! slot_getter {
    ($name:ident, $variant:ident, $ty:ty, $expected:literal) => {
        fn $name(&self, reg: Reg) -> Result<$ty, ExecError> {
            match self.get(reg)? {
                Slot::$variant(value) => Ok(value.clone()),
                other => Err(ExecError::SlotKind {
                    reg: reg.0,
                    expected: $expected,
                    found: other.kind_name(),
                }),
            }
        }
    };
}

#[derive(Clone, Debug, Default)]
pub struct Interpreter {
    regs: Vec<Option<Slot>>,
    state: Vec<Lanes>,
}

impl Interpreter {
    pub fn new(function: &Function) -> Self {
        Self {
            regs: vec![None; function.reg_count()],
            state: vec![[0.0; 2]; function.state_count()],
        }
    }

    /// Clears registers and oscillator phases.
    pub fn reset(&mut self) {
        self.regs.iter_mut().for_each(|reg| *reg = None);
        self.state.iter_mut().for_each(|lanes| *lanes = [0.0; 2]);
    }

    pub fn slot(&self, reg: Reg) -> Option<&Slot> {
        self.regs.get(reg.0 as usize).and_then(Option::as_ref)
    }

    /// The sample a numeric value held after the last run.
    pub fn read_num(&self, num: &Num) -> Result<NumSample, ExecError> {
        Ok(NumSample {
            lanes: self.vec(num.vec)?,
            form: self.form(num.form)?,
            active: self.flag(num.active)?,
        })
    }

    /// Runs one sample with control slot `i` bound to `controls[i]`.
    pub fn run(&mut self, function: &Function, controls: &mut [Storage], time: &TimeBase) -> Result<(), ExecError> {
        self.execute(function, controls, None, time)
    }

    /// Runs one sample with control slot `i` bound to `groups[sockets[i]]`.
    pub fn run_bound(
        &mut self,
        function: &Function,
        groups: &mut [Storage],
        sockets: &[usize],
        time: &TimeBase,
    ) -> Result<(), ExecError> {
        self.execute(function, groups, Some(sockets), time)
    }

    fn execute(
        &mut self,
        function: &Function,
        storage: &mut [Storage],
        sockets: Option<&[usize]>,
        time: &TimeBase,
    ) -> Result<(), ExecError> {
        if self.regs.len() < function.reg_count() {
            self.regs.resize(function.reg_count(), None);
        }
        if self.state.len() < function.state_count() {
            self.state.resize(function.state_count(), [0.0; 2]);
        }

        for inst in function.insts() {
            match inst {
                Inst::ConstVec { dst, value } => self.set(*dst, Slot::Vec(*value)),
                Inst::ConstFlag { dst, value } => self.set(*dst, Slot::Flag(*value)),
                Inst::ConstForm { dst, form } => self.set(*dst, Slot::Form(*form)),
                Inst::BuildForm { dst, ty, params } => {
                    let mut values = [0.0; crate::values::MAX_FORM_PARAMS];
                    for (value, param) in values.iter_mut().zip(params) {
                        *value = self.vec(*param)?[0];
                    }
                    self.set(*dst, Slot::Form(Form::with_params(*ty, &values[..params.len()])));
                }
                Inst::Float { dst, op, lhs, rhs } => {
                    let (a, b) = (self.vec(*lhs)?, self.vec(*rhs)?);
                    self.set(*dst, Slot::Vec([op.apply(a[0], b[0]), op.apply(a[1], b[1])]));
                }
                Inst::Int {
                    dst,
                    op,
                    signed,
                    lhs,
                    rhs,
                } => {
                    let (a, b) = (self.vec(*lhs)?, self.vec(*rhs)?);
                    let lane = |x: f32, y: f32| int_op(*op, *signed, x, y);
                    self.set(*dst, Slot::Vec([lane(a[0], b[0]), lane(a[1], b[1])]));
                }
                Inst::Compare { dst, pred, lhs, rhs } => {
                    let (a, b) = (self.vec(*lhs)?, self.vec(*rhs)?);
                    self.set(*dst, Slot::Mask([pred.test(a[0], b[0]), pred.test(a[1], b[1])]));
                }
                Inst::Truthy { dst, src } => {
                    let a = self.vec(*src)?;
                    self.set(*dst, Slot::Mask([a[0] != 0.0, a[1] != 0.0]));
                }
                Inst::Mask { dst, op, lhs, rhs } => {
                    let (a, b) = (self.mask(*lhs)?, self.mask(*rhs)?);
                    self.set(*dst, Slot::Mask([op.apply(a[0], b[0]), op.apply(a[1], b[1])]));
                }
                Inst::MaskToVec { dst, src } => {
                    let m = self.mask(*src)?;
                    self.set(*dst, Slot::Vec(m.map(|lane| if lane { 1.0 } else { 0.0 })));
                }
                Inst::AnyLane { dst, src } => {
                    let m = self.mask(*src)?;
                    self.set(*dst, Slot::Flag(m[0] || m[1]));
                }
                Inst::Flag { dst, op, lhs, rhs } => {
                    let value = op.apply(self.flag(*lhs)?, self.flag(*rhs)?);
                    self.set(*dst, Slot::Flag(value));
                }
                Inst::FlagToVec { dst, src } => {
                    let value = if self.flag(*src)? { 1.0 } else { 0.0 };
                    self.set(*dst, Slot::Vec([value; 2]));
                }
                Inst::Intrinsic { dst, func, args } => {
                    let a = match args.first() {
                        Some(reg) => self.vec(*reg)?,
                        None => [0.0; 2],
                    };
                    let b = match args.get(1) {
                        Some(reg) => self.vec(*reg)?,
                        None => [0.0; 2],
                    };
                    self.set(*dst, Slot::Vec([func.apply(a[0], b[0]), func.apply(a[1], b[1])]));
                }
                Inst::Shuffle { dst, src, lanes } => {
                    let a = self.vec(*src)?;
                    self.set(*dst, Slot::Vec([a[lanes[0] as usize & 1], a[lanes[1] as usize & 1]]));
                }
                Inst::Combine { dst, left, right } => {
                    let (a, b) = (self.vec(*left)?, self.vec(*right)?);
                    self.set(*dst, Slot::Vec([a[0], b[1]]));
                }
                Inst::Convert {
                    dst,
                    src,
                    form,
                    table,
                } => {
                    let a = self.vec(*src)?;
                    let from = self.form(*form)?.ty;
                    let lanes = a.map(|lane| table.apply(from, lane, time));
                    self.set(*dst, Slot::Vec(lanes));
                }
                Inst::Phasor { dst, freq, state } => {
                    let f = self.vec(*freq)?;
                    let phase = self.state[*state];
                    for (lane, freq) in self.state[*state].iter_mut().zip(f) {
                        *lane = (*lane + freq / time.sample_rate).rem_euclid(1.0);
                    }
                    self.set(*dst, Slot::Vec(phase));
                }
                Inst::Wave { dst, phase, shape } => {
                    let p = self.vec(*phase)?;
                    self.set(*dst, Slot::Vec(p.map(|lane| shape.sample(lane))));
                }
                Inst::ReadControl {
                    dst,
                    control,
                    field,
                } => {
                    let target = resolve(storage, sockets, *control)?;
                    let slot = read_field(target, *control, *field)?;
                    self.set(*dst, slot);
                }
                Inst::WriteControl {
                    control,
                    field,
                    src,
                } => {
                    let value = self.get(*src)?.clone();
                    let target = resolve(storage, sockets, *control)?;
                    write_field(target, *control, *field, value, *src)?;
                }
            }
        }
        Ok(())
    }

    fn set(&mut self, reg: Reg, slot: Slot) {
        if let Some(entry) = self.regs.get_mut(reg.0 as usize) {
            *entry = Some(slot);
        }
    }

    fn get(&self, reg: Reg) -> Result<&Slot, ExecError> {
        self.slot(reg).ok_or(ExecError::Unassigned(reg.0))
    }

    slot_getter!(vec, Vec, Lanes, "vec");
    slot_getter!(mask, Mask, [bool; 2], "mask");
    slot_getter!(flag, Flag, bool, "flag");
    slot_getter!(form, Form, Form, "form");
}

fn int_op(op: IntOp, signed: bool, a: f32, b: f32) -> f32 {
    if signed {
        let (a, b) = (a as i32, b as i32);
        (match op {
            IntOp::And => a & b,
            IntOp::Or => a | b,
            IntOp::Xor => a ^ b,
        }) as f32
    } else {
        let (a, b) = (a as u32, b as u32);
        (match op {
            IntOp::And => a & b,
            IntOp::Or => a | b,
            IntOp::Xor => a ^ b,
        }) as f32
    }
}

fn resolve<'s>(storage: &'s mut [Storage], sockets: Option<&[usize]>, control: usize) -> Result<&'s mut Storage, ExecError> {
    let index = match sockets {
        Some(sockets) => *sockets.get(control).ok_or(ExecError::UnboundControl(control))?,
        None => control,
    };
    storage.get_mut(index).ok_or(ExecError::UnboundControl(control))
}

fn storage_kind(index: usize, expected: &'static str, found: &Storage) -> ExecError {
    ExecError::StorageKind {
        index,
        expected,
        found: found.kind_name(),
    }
}

fn read_field(storage: &Storage, index: usize, field: ControlField) -> Result<Slot, ExecError> {
    match (field, storage) {
        (ControlField::Lanes, Storage::Num(num)) => Ok(Slot::Vec(num.lanes)),
        (ControlField::Form, Storage::Num(num)) => Ok(Slot::Form(num.form)),
        (ControlField::Active, Storage::Num(num)) => Ok(Slot::Flag(num.active)),
        (ControlField::Midi, Storage::Midi(midi)) => Ok(Slot::Midi(midi.clone())),
        (ControlField::Array, Storage::Array(items)) => Ok(Slot::Array(items.clone())),
        (ControlField::Midi, other) => Err(storage_kind(index, "midi", other)),
        (ControlField::Array, other) => Err(storage_kind(index, "array", other)),
        (_, other) => Err(storage_kind(index, "num", other)),
    }
}

fn write_field(storage: &mut Storage, index: usize, field: ControlField, value: Slot, src: Reg) -> Result<(), ExecError> {
    let mismatch = |expected: &'static str, found: &Slot| ExecError::SlotKind {
        reg: src.0,
        expected,
        found: found.kind_name(),
    };
    match (field, storage) {
        (ControlField::Lanes, Storage::Num(num)) => match value {
            Slot::Vec(lanes) => num.lanes = lanes,
            other => return Err(mismatch("vec", &other)),
        },
        (ControlField::Form, Storage::Num(num)) => match value {
            Slot::Form(form) => num.form = form,
            other => return Err(mismatch("form", &other)),
        },
        (ControlField::Active, Storage::Num(num)) => match value {
            Slot::Flag(active) => num.active = active,
            other => return Err(mismatch("flag", &other)),
        },
        (ControlField::Midi, Storage::Midi(midi)) => match value {
            Slot::Midi(data) => *midi = data,
            other => return Err(mismatch("midi", &other)),
        },
        (ControlField::Array, Storage::Array(items)) => match value {
            Slot::Array(data) => *items = data,
            other => return Err(mismatch("array", &other)),
        },
        (ControlField::Midi, other) => return Err(storage_kind(index, "midi", other)),
        (ControlField::Array, other) => return Err(storage_kind(index, "array", other)),
        (_, other) => return Err(storage_kind(index, "num", other)),
    }
    Ok(())
}
