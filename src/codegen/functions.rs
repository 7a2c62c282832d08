use std::fmt;

use crate::error::{CompileError, CompileResult, ErrorKind, SourceRange};
use crate::values::{Form, FormType, Num, Type, Value};

use super::ir::{BoolOp, Function, Intrinsic, Reg, Waveform};
use super::operators::ActiveMode;
use super::registry::Registry;

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub ty: Type,
    /// Numbers passed here are converted to this form before the call.
    pub form: Option<FormType>,
}

impl Parameter {
    pub fn num() -> Self {
        Self {
            ty: Type::Num,
            form: None,
        }
    }

    pub fn num_in(form: FormType) -> Self {
        Self {
            ty: Type::Num,
            form: Some(form),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    pub params: Vec<Parameter>,
    /// Parameter repeated for any trailing arguments.
    pub vararg: Option<Parameter>,
    pub returns: Type,
}

impl Signature {
    pub fn new(params: Vec<Parameter>, returns: Type) -> Self {
        Self {
            params,
            vararg: None,
            returns,
        }
    }

    pub fn variadic(params: Vec<Parameter>, vararg: Parameter, returns: Type) -> Self {
        Self {
            params,
            vararg: Some(vararg),
            returns,
        }
    }

    pub fn parameter(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index).or(self.vararg.as_ref())
    }

    pub fn accepts(&self, types: &[Type]) -> bool {
        if types.len() < self.params.len() || (self.vararg.is_none() && types.len() > self.params.len()) {
            return false;
        }
        types
            .iter()
            .enumerate()
            .all(|(i, ty)| self.parameter(i).is_some_and(|param| &param.ty == ty))
    }

    fn arity_text(&self) -> String {
        match self.vararg {
            Some(_) => format!("at least {}", self.params.len()),
            None => self.params.len().to_string(),
        }
    }
}

/// What a builtin needs while emitting code for one call.
pub struct CallContext<'a> {
    pub function: &'a mut Function,
    pub registry: &'a Registry,
    pub range: SourceRange,
}

/// A named, typed function callable from custom node code.
pub trait Builtin: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn signature(&self) -> &Signature;

    /// Emits the body. Arguments have already been checked and converted.
    fn generate(&self, ctx: &mut CallContext<'_>, args: Vec<Value>) -> CompileResult<Value>;

    fn accepts(&self, types: &[Type]) -> bool {
        self.signature().accepts(types)
    }

    /// Checks argument count and types, converts form-constrained numbers,
    /// then emits the body.
    fn call(&self, ctx: &mut CallContext<'_>, args: Vec<Value>) -> CompileResult<Value> {
        let signature = self.signature();
        let count_ok = args.len() >= signature.params.len()
            && (signature.vararg.is_some() || args.len() == signature.params.len());
        if !count_ok {
            return Err(CompileError::new(
                ErrorKind::ArgumentCount {
                    function: self.name().to_owned(),
                    expected: signature.arity_text(),
                    found: args.len(),
                },
                ctx.range,
            ));
        }

        let mut checked = Vec::with_capacity(args.len());
        for (i, arg) in args.into_iter().enumerate() {
            let param = signature
                .parameter(i)
                .ok_or_else(|| CompileError::unsupported_operator(ctx.range))?;
            arg.expect_type(&param.ty)?;
            let arg = match (param.form, arg) {
                (Some(form), Value::Num(num)) => {
                    let range = num.range;
                    Value::Num(ctx.registry.call_converter(form, ctx.function, &num, range)?)
                }
                (_, arg) => arg,
            };
            checked.push(arg);
        }

        self.generate(ctx, checked)
    }
}

fn nums(args: Vec<Value>) -> CompileResult<Vec<Num>> {
    args.into_iter().map(Value::into_num).collect()
}

fn combine_active(function: &mut Function, nums: &[Num], mode: ActiveMode) -> Option<Reg> {
    let (first, rest) = nums.split_first()?;
    Some(
        rest.iter()
            .fold(first.active, |acc, num| mode.emit(function, acc, num.active)),
    )
}

// ============================================================================
// Math
// ============================================================================

/// One- or two-argument math intrinsic applied lane-wise. The result keeps the
/// first argument's form.
#[derive(Debug)]
pub struct IntrinsicFunction {
    name: &'static str,
    func: Intrinsic,
    signature: Signature,
}

impl IntrinsicFunction {
    pub fn new(name: &'static str, func: Intrinsic) -> Self {
        let params = vec![Parameter::num(); func.arity()];
        Self {
            name,
            func,
            signature: Signature::new(params, Type::Num),
        }
    }
}

impl Builtin for IntrinsicFunction {
    fn name(&self) -> &str {
        self.name
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn generate(&self, ctx: &mut CallContext<'_>, args: Vec<Value>) -> CompileResult<Value> {
        let args = nums(args)?;
        let regs: Vec<_> = args.iter().map(|num| num.vec).collect();
        let vec = ctx.function.intrinsic(self.func, &regs);
        let active = combine_active(ctx.function, &args, ActiveMode::AnyInput)
            .ok_or_else(|| CompileError::unsupported_operator(ctx.range))?;
        let first = &args[0];
        Ok(Value::Num(Num {
            vec,
            form: first.form,
            active,
            is_const: args.iter().all(|num| num.is_const),
            range: ctx.range,
        }))
    }
}

/// `min(a, b, ...)` / `max(a, b, ...)`: folds a two-argument intrinsic over
/// any number of arguments.
#[derive(Debug)]
pub struct FoldFunction {
    name: &'static str,
    func: Intrinsic,
    signature: Signature,
}

impl FoldFunction {
    pub fn new(name: &'static str, func: Intrinsic) -> Self {
        Self {
            name,
            func,
            signature: Signature::variadic(vec![Parameter::num()], Parameter::num(), Type::Num),
        }
    }
}

impl Builtin for FoldFunction {
    fn name(&self) -> &str {
        self.name
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn generate(&self, ctx: &mut CallContext<'_>, args: Vec<Value>) -> CompileResult<Value> {
        let args = nums(args)?;
        let (first, rest) = args
            .split_first()
            .ok_or_else(|| CompileError::unsupported_operator(ctx.range))?;
        let mut vec = first.vec;
        for num in rest {
            vec = ctx.function.intrinsic(self.func, &[vec, num.vec]);
        }
        let active = combine_active(ctx.function, &args, ActiveMode::AnyInput).unwrap_or(first.active);
        Ok(Value::Num(Num {
            vec,
            form: first.form,
            active,
            is_const: args.iter().all(|num| num.is_const),
            range: ctx.range,
        }))
    }
}

/// `clamp(x, min, max)`
#[derive(Debug)]
pub struct ClampFunction {
    signature: Signature,
}

impl ClampFunction {
    pub fn new() -> Self {
        Self {
            signature: Signature::new(vec![Parameter::num(); 3], Type::Num),
        }
    }
}

impl Builtin for ClampFunction {
    fn name(&self) -> &str {
        "clamp"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn generate(&self, ctx: &mut CallContext<'_>, args: Vec<Value>) -> CompileResult<Value> {
        let args = nums(args)?;
        let [x, lo, hi] = args.as_slice() else {
            return Err(CompileError::unsupported_operator(ctx.range));
        };
        let upper = ctx.function.intrinsic(Intrinsic::Min, &[x.vec, hi.vec]);
        let vec = ctx.function.intrinsic(Intrinsic::Max, &[upper, lo.vec]);
        Ok(Value::Num(Num {
            vec,
            form: x.form,
            active: x.active,
            is_const: x.is_const && lo.is_const && hi.is_const,
            range: ctx.range,
        }))
    }
}

// ============================================================================
// Lanes and flags
// ============================================================================

/// Rearranges the two lanes: `left(x)`, `right(x)` and `swap(x)`.
#[derive(Debug)]
pub struct ShuffleFunction {
    name: &'static str,
    lanes: [u8; 2],
    signature: Signature,
}

impl ShuffleFunction {
    pub fn new(name: &'static str, lanes: [u8; 2]) -> Self {
        Self {
            name,
            lanes,
            signature: Signature::new(vec![Parameter::num()], Type::Num),
        }
    }
}

impl Builtin for ShuffleFunction {
    fn name(&self) -> &str {
        self.name
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn generate(&self, ctx: &mut CallContext<'_>, args: Vec<Value>) -> CompileResult<Value> {
        let x = nums(args)?
            .pop()
            .ok_or_else(|| CompileError::unsupported_operator(ctx.range))?;
        let vec = ctx.function.shuffle(x.vec, self.lanes);
        Ok(Value::Num(Num {
            range: ctx.range,
            ..x.with_vec(vec, x.is_const)
        }))
    }
}

/// `combine(l, r)`: left lane of `l`, right lane of `r`.
#[derive(Debug)]
pub struct CombineFunction {
    signature: Signature,
}

impl CombineFunction {
    pub fn new() -> Self {
        Self {
            signature: Signature::new(vec![Parameter::num(); 2], Type::Num),
        }
    }
}

impl Builtin for CombineFunction {
    fn name(&self) -> &str {
        "combine"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn generate(&self, ctx: &mut CallContext<'_>, args: Vec<Value>) -> CompileResult<Value> {
        let args = nums(args)?;
        let [left, right] = args.as_slice() else {
            return Err(CompileError::unsupported_operator(ctx.range));
        };
        let vec = ctx.function.combine(left.vec, right.vec);
        let active = ctx.function.flag(BoolOp::Or, left.active, right.active);
        Ok(Value::Num(Num {
            vec,
            form: left.form,
            active,
            is_const: left.is_const && right.is_const,
            range: ctx.range,
        }))
    }
}

/// `active(x)`: 1 when `x` is active, 0 otherwise.
#[derive(Debug)]
pub struct ActiveFunction {
    signature: Signature,
}

impl ActiveFunction {
    pub fn new() -> Self {
        Self {
            signature: Signature::new(vec![Parameter::num()], Type::Num),
        }
    }
}

impl Builtin for ActiveFunction {
    fn name(&self) -> &str {
        "active"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn generate(&self, ctx: &mut CallContext<'_>, args: Vec<Value>) -> CompileResult<Value> {
        let x = nums(args)?
            .pop()
            .ok_or_else(|| CompileError::unsupported_operator(ctx.range))?;
        let vec = ctx.function.flag_to_vec(x.active);
        let form = ctx.function.const_form(Form::new(FormType::Linear));
        Ok(Value::Num(Num {
            vec,
            form,
            active: x.active,
            is_const: x.is_const,
            range: ctx.range,
        }))
    }
}

/// `with_active(x, a)`: `x` with its active flag replaced by whether any lane
/// of `a` is nonzero.
#[derive(Debug)]
pub struct WithActiveFunction {
    signature: Signature,
}

impl WithActiveFunction {
    pub fn new() -> Self {
        Self {
            signature: Signature::new(vec![Parameter::num(); 2], Type::Num),
        }
    }
}

impl Builtin for WithActiveFunction {
    fn name(&self) -> &str {
        "with_active"
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn generate(&self, ctx: &mut CallContext<'_>, args: Vec<Value>) -> CompileResult<Value> {
        let args = nums(args)?;
        let [x, gate] = args.as_slice() else {
            return Err(CompileError::unsupported_operator(ctx.range));
        };
        let mask = ctx.function.truthy(gate.vec);
        let active = ctx.function.any_lane(mask);
        Ok(Value::Num(Num {
            vec: x.vec,
            form: x.form,
            active,
            is_const: x.is_const && gate.is_const,
            range: ctx.range,
        }))
    }
}

// ============================================================================
// Oscillators
// ============================================================================

/// Free-running oscillator. The frequency argument is converted to the
/// frequency form; the output is in the oscillator form.
#[derive(Debug)]
pub struct OscillatorFunction {
    name: &'static str,
    shape: Waveform,
    signature: Signature,
}

impl OscillatorFunction {
    pub fn new(name: &'static str, shape: Waveform) -> Self {
        Self {
            name,
            shape,
            signature: Signature::new(vec![Parameter::num_in(FormType::Frequency)], Type::Num),
        }
    }
}

impl Builtin for OscillatorFunction {
    fn name(&self) -> &str {
        self.name
    }

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn generate(&self, ctx: &mut CallContext<'_>, args: Vec<Value>) -> CompileResult<Value> {
        let freq = nums(args)?
            .pop()
            .ok_or_else(|| CompileError::unsupported_operator(ctx.range))?;
        let phase = ctx.function.phasor(freq.vec);
        let vec = ctx.function.wave(phase, self.shape);
        let form = ctx.function.const_form(Form::new(FormType::Oscillator));
        Ok(Value::Num(Num {
            vec,
            form,
            active: freq.active,
            is_const: false,
            range: ctx.range,
        }))
    }
}

/// Every builtin function, in registration order.
pub fn standard_functions() -> Vec<Box<dyn Builtin>> {
    let mut functions: Vec<Box<dyn Builtin>> = vec![
        Box::new(IntrinsicFunction::new("sin", Intrinsic::Sin)),
        Box::new(IntrinsicFunction::new("cos", Intrinsic::Cos)),
        Box::new(IntrinsicFunction::new("tan", Intrinsic::Tan)),
        Box::new(IntrinsicFunction::new("sqrt", Intrinsic::Sqrt)),
        Box::new(IntrinsicFunction::new("abs", Intrinsic::Abs)),
        Box::new(IntrinsicFunction::new("floor", Intrinsic::Floor)),
        Box::new(IntrinsicFunction::new("ceil", Intrinsic::Ceil)),
        Box::new(IntrinsicFunction::new("log", Intrinsic::Log)),
        Box::new(IntrinsicFunction::new("log2", Intrinsic::Log2)),
        Box::new(IntrinsicFunction::new("log10", Intrinsic::Log10)),
        Box::new(IntrinsicFunction::new("exp", Intrinsic::Exp)),
        Box::new(IntrinsicFunction::new("pow", Intrinsic::Pow)),
        Box::new(FoldFunction::new("min", Intrinsic::Min)),
        Box::new(FoldFunction::new("max", Intrinsic::Max)),
        Box::new(ClampFunction::new()),
        Box::new(ShuffleFunction::new("left", [0, 0])),
        Box::new(ShuffleFunction::new("right", [1, 1])),
        Box::new(ShuffleFunction::new("swap", [1, 0])),
        Box::new(CombineFunction::new()),
        Box::new(ActiveFunction::new()),
        Box::new(WithActiveFunction::new()),
    ];

    for (name, shape) in [
        ("sinosc", Waveform::Sine),
        ("sawosc", Waveform::Saw),
        ("sqrosc", Waveform::Square),
        ("triosc", Waveform::Triangle),
        ("rmposc", Waveform::Ramp),
    ] {
        functions.push(Box::new(OscillatorFunction::new(name, shape)));
    }

    functions
}
