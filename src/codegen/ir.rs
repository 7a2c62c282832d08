/// Intermediate representation produced by the expression generator.
///
/// Each generated function is a straight-line list of instructions over
/// single-assignment registers. Registers hold 2-lane f32 vectors, lane masks,
/// active flags, forms, MIDI data or arrays. The linker (or the reference
/// interpreter) binds control indices to value-group storage.
use std::fmt;

use arrayvec::ArrayVec;

use crate::error::SourceRange;
use crate::values::{Form, FormType, Num, NumValue, MAX_FORM_PARAMS};

use super::TimeBase;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reg(pub u32);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

pub type Lanes = [f32; 2];

/// Per-lane conversion from one form to another.
pub type LaneFn = fn(f32, &TimeBase) -> f32;

/// Conversions into one destination form, indexed by source form.
#[derive(Copy, Clone)]
pub struct ConversionTable(pub [LaneFn; FormType::COUNT]);

impl ConversionTable {
    #[inline]
    pub fn apply(&self, from: FormType, value: f32, time: &TimeBase) -> f32 {
        (self.0[from.index()])(value, time)
    }
}

impl fmt::Debug for ConversionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConversionTable")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl FloatOp {
    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            FloatOp::Add => a + b,
            FloatOp::Sub => a - b,
            FloatOp::Mul => a * b,
            FloatOp::Div => a / b,
            FloatOp::Rem => a % b,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntOp {
    And,
    Or,
    Xor,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Predicate {
    /// Ordered comparison: false whenever either side is NaN.
    #[inline]
    pub fn test(self, a: f32, b: f32) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        match self {
            Predicate::Eq => a == b,
            Predicate::Ne => a != b,
            Predicate::Gt => a > b,
            Predicate::Lt => a < b,
            Predicate::Ge => a >= b,
            Predicate::Le => a <= b,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    #[inline]
    pub fn apply(self, a: bool, b: bool) -> bool {
        match self {
            BoolOp::And => a && b,
            BoolOp::Or => a || b,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Intrinsic {
    Sin,
    Cos,
    Tan,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Log,
    Log2,
    Log10,
    Exp,
    Min,
    Max,
    Pow,
}

impl Intrinsic {
    pub fn arity(self) -> usize {
        match self {
            Intrinsic::Min | Intrinsic::Max | Intrinsic::Pow => 2,
            _ => 1,
        }
    }

    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Intrinsic::Sin => a.sin(),
            Intrinsic::Cos => a.cos(),
            Intrinsic::Tan => a.tan(),
            Intrinsic::Sqrt => a.sqrt(),
            Intrinsic::Abs => a.abs(),
            Intrinsic::Floor => a.floor(),
            Intrinsic::Ceil => a.ceil(),
            Intrinsic::Log => a.ln(),
            Intrinsic::Log2 => a.log2(),
            Intrinsic::Log10 => a.log10(),
            Intrinsic::Exp => a.exp(),
            Intrinsic::Min => a.min(b),
            Intrinsic::Max => a.max(b),
            Intrinsic::Pow => a.powf(b),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    Triangle,
    Ramp,
}

impl Waveform {
    /// Sample of the waveform at `phase` in [0, 1).
    #[inline]
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * std::f32::consts::TAU).sin(),
            Waveform::Saw => 1.0 - 2.0 * phase,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Ramp => 2.0 * phase - 1.0,
        }
    }
}

/// Part of a control's storage an instruction reads or writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ControlField {
    Lanes,
    Form,
    Active,
    Midi,
    Array,
}

#[derive(Clone, Debug)]
pub enum Inst {
    ConstVec {
        dst: Reg,
        value: Lanes,
    },
    ConstFlag {
        dst: Reg,
        value: bool,
    },
    ConstForm {
        dst: Reg,
        form: Form,
    },
    /// Form whose parameters are the left lanes of `params`.
    BuildForm {
        dst: Reg,
        ty: FormType,
        params: ArrayVec<Reg, MAX_FORM_PARAMS>,
    },
    Float {
        dst: Reg,
        op: FloatOp,
        lhs: Reg,
        rhs: Reg,
    },
    /// Truncates both sides to 32-bit integers, operates, converts back.
    Int {
        dst: Reg,
        op: IntOp,
        signed: bool,
        lhs: Reg,
        rhs: Reg,
    },
    Compare {
        dst: Reg,
        pred: Predicate,
        lhs: Reg,
        rhs: Reg,
    },
    /// Lane mask of `src != 0`.
    Truthy {
        dst: Reg,
        src: Reg,
    },
    Mask {
        dst: Reg,
        op: BoolOp,
        lhs: Reg,
        rhs: Reg,
    },
    MaskToVec {
        dst: Reg,
        src: Reg,
    },
    /// Flag set when any lane of the mask is set.
    AnyLane {
        dst: Reg,
        src: Reg,
    },
    Flag {
        dst: Reg,
        op: BoolOp,
        lhs: Reg,
        rhs: Reg,
    },
    FlagToVec {
        dst: Reg,
        src: Reg,
    },
    Intrinsic {
        dst: Reg,
        func: Intrinsic,
        args: ArrayVec<Reg, 2>,
    },
    Shuffle {
        dst: Reg,
        src: Reg,
        lanes: [u8; 2],
    },
    /// Left lane of `left`, right lane of `right`.
    Combine {
        dst: Reg,
        left: Reg,
        right: Reg,
    },
    Convert {
        dst: Reg,
        src: Reg,
        form: Reg,
        table: ConversionTable,
    },
    /// Advances a per-lane phase accumulator kept in state slot `state`.
    Phasor {
        dst: Reg,
        freq: Reg,
        state: usize,
    },
    Wave {
        dst: Reg,
        phase: Reg,
        shape: Waveform,
    },
    ReadControl {
        dst: Reg,
        control: usize,
        field: ControlField,
    },
    WriteControl {
        control: usize,
        field: ControlField,
        src: Reg,
    },
}

/// A function being generated: the instruction list plus its register,
/// state and control counts.
#[derive(Clone, Debug, Default)]
pub struct Function {
    name: String,
    insts: Vec<Inst>,
    reg_count: u32,
    state_count: usize,
    control_count: usize,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }

    pub fn reg_count(&self) -> usize {
        self.reg_count as usize
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    pub fn control_count(&self) -> usize {
        self.control_count
    }

    pub fn alloc_reg(&mut self) -> Reg {
        let reg = Reg(self.reg_count);
        self.reg_count += 1;
        reg
    }

    pub fn alloc_state(&mut self) -> usize {
        let slot = self.state_count;
        self.state_count += 1;
        slot
    }

    pub fn push(&mut self, inst: Inst) {
        if let Inst::ReadControl { control, .. } | Inst::WriteControl { control, .. } = &inst {
            self.control_count = self.control_count.max(control + 1);
        }
        self.insts.push(inst);
    }

    fn emit(&mut self, build: impl FnOnce(Reg) -> Inst) -> Reg {
        let dst = self.alloc_reg();
        self.push(build(dst));
        dst
    }

    // ========================================================================
    // Emit helpers
    // ========================================================================

    pub fn const_vec(&mut self, value: Lanes) -> Reg {
        self.emit(|dst| Inst::ConstVec { dst, value })
    }

    pub fn const_flag(&mut self, value: bool) -> Reg {
        self.emit(|dst| Inst::ConstFlag { dst, value })
    }

    pub fn const_form(&mut self, form: Form) -> Reg {
        self.emit(|dst| Inst::ConstForm { dst, form })
    }

    pub fn build_form(&mut self, ty: FormType, params: ArrayVec<Reg, MAX_FORM_PARAMS>) -> Reg {
        self.emit(|dst| Inst::BuildForm { dst, ty, params })
    }

    pub fn float(&mut self, op: FloatOp, lhs: Reg, rhs: Reg) -> Reg {
        self.emit(|dst| Inst::Float { dst, op, lhs, rhs })
    }

    pub fn int(&mut self, op: IntOp, signed: bool, lhs: Reg, rhs: Reg) -> Reg {
        self.emit(|dst| Inst::Int {
            dst,
            op,
            signed,
            lhs,
            rhs,
        })
    }

    pub fn compare(&mut self, pred: Predicate, lhs: Reg, rhs: Reg) -> Reg {
        self.emit(|dst| Inst::Compare { dst, pred, lhs, rhs })
    }

    pub fn truthy(&mut self, src: Reg) -> Reg {
        self.emit(|dst| Inst::Truthy { dst, src })
    }

    pub fn mask(&mut self, op: BoolOp, lhs: Reg, rhs: Reg) -> Reg {
        self.emit(|dst| Inst::Mask { dst, op, lhs, rhs })
    }

    pub fn mask_to_vec(&mut self, src: Reg) -> Reg {
        self.emit(|dst| Inst::MaskToVec { dst, src })
    }

    pub fn any_lane(&mut self, src: Reg) -> Reg {
        self.emit(|dst| Inst::AnyLane { dst, src })
    }

    pub fn flag(&mut self, op: BoolOp, lhs: Reg, rhs: Reg) -> Reg {
        self.emit(|dst| Inst::Flag { dst, op, lhs, rhs })
    }

    pub fn flag_to_vec(&mut self, src: Reg) -> Reg {
        self.emit(|dst| Inst::FlagToVec { dst, src })
    }

    pub fn intrinsic(&mut self, func: Intrinsic, args: &[Reg]) -> Reg {
        let args = args.iter().copied().take(2).collect();
        self.emit(|dst| Inst::Intrinsic { dst, func, args })
    }

    pub fn shuffle(&mut self, src: Reg, lanes: [u8; 2]) -> Reg {
        self.emit(|dst| Inst::Shuffle { dst, src, lanes })
    }

    pub fn combine(&mut self, left: Reg, right: Reg) -> Reg {
        self.emit(|dst| Inst::Combine { dst, left, right })
    }

    pub fn convert(&mut self, src: Reg, form: Reg, table: ConversionTable) -> Reg {
        self.emit(|dst| Inst::Convert {
            dst,
            src,
            form,
            table,
        })
    }

    pub fn phasor(&mut self, freq: Reg) -> Reg {
        let state = self.alloc_state();
        self.emit(|dst| Inst::Phasor { dst, freq, state })
    }

    pub fn wave(&mut self, phase: Reg, shape: Waveform) -> Reg {
        self.emit(|dst| Inst::Wave { dst, phase, shape })
    }

    pub fn read_control(&mut self, control: usize, field: ControlField) -> Reg {
        self.emit(|dst| Inst::ReadControl {
            dst,
            control,
            field,
        })
    }

    pub fn write_control(&mut self, control: usize, field: ControlField, src: Reg) {
        self.push(Inst::WriteControl {
            control,
            field,
            src,
        });
    }

    /// Inactive constant number.
    pub fn const_num(&mut self, value: NumValue, range: SourceRange) -> Num {
        Num {
            vec: self.const_vec(value.lanes()),
            form: self.const_form(Form::new(value.form)),
            active: self.const_flag(false),
            is_const: true,
            range,
        }
    }
}
