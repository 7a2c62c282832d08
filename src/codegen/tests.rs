use float_cmp::assert_approx_eq;

use super::*;
use crate::ast::{AssignOp, Assignable, Expression, PostfixOp, UnaryOp};
use crate::common::{ControlDirection, ControlType, OperatorType};
use crate::error::{CompileResult, ErrorKind, SourceRange};
use crate::values::{Form, FormType, Num, NumValue, Tuple, Type, Value};

/// A registry, a function and a scope to generate expressions into.
struct Harness {
    registry: Registry,
    function: Function,
    scope: Scope,
}

impl Harness {
    fn new() -> Self {
        Self {
            registry: Registry::standard(),
            function: Function::new("test"),
            scope: Scope::new(),
        }
    }

    fn eval(&mut self, expr: Expression) -> CompileResult<Value> {
        ExpressionGenerator::new(&self.registry).generate(&expr, &mut self.function, &mut self.scope)
    }

    fn error(&mut self, expr: Expression) -> ErrorKind {
        self.eval(expr).expect_err("expression should not compile").kind
    }

    fn storage(&self) -> Vec<Storage> {
        self.scope
            .controls()
            .iter()
            .map(|control| Storage::for_type(&Type::of_control(control.kind)))
            .collect()
    }

    fn sample(&self, num: &Num) -> NumSample {
        let mut storage = self.storage();
        self.sample_with(num, &mut storage)
    }

    fn sample_with(&self, num: &Num, storage: &mut [Storage]) -> NumSample {
        let mut interpreter = Interpreter::new(&self.function);
        interpreter
            .run(&self.function, storage, &TimeBase::default())
            .expect("generated code should run");
        interpreter.read_num(num).expect("value should be assigned")
    }

    fn variable(&self, name: &str) -> Num {
        self.scope
            .find_value(name)
            .and_then(|value| value.as_num().ok())
            .cloned()
            .expect("variable should hold a number")
    }
}

fn set(name: &str, value: Expression) -> Expression {
    Expression::assign(AssignOp::Assign, Assignable::variable(name), value)
}

fn var(name: &str) -> Expression {
    Expression::variable(name)
}

fn num(value: f32) -> Expression {
    Expression::number(value)
}

fn math(op: OperatorType, left: Expression, right: Expression) -> Expression {
    Expression::math(op, left, right)
}

fn tuple_items(value: &Value) -> &[Value] {
    match value {
        Value::Tuple(tuple) => &tuple.items,
        other => panic!("expected a tuple, got {:?}", other.ty()),
    }
}

fn constant(function: &mut Function, value: f32, active: bool) -> Num {
    Num {
        vec: function.const_vec([value; 2]),
        form: function.const_form(Form::new(FormType::Linear)),
        active: function.const_flag(active),
        is_const: true,
        range: SourceRange::UNDEFINED,
    }
}

// ============================================================================
// Literals and arithmetic
// ============================================================================

#[test]
fn test_literals_are_inactive_constants() {
    let mut h = Harness::new();
    let note = h.eval(Expression::note(60.0)).unwrap().into_num().unwrap();
    let number = h.eval(num(0.5)).unwrap().into_num().unwrap();

    assert!(note.is_const && number.is_const);

    let note = h.sample(&note);
    assert_eq!(note.form.ty, FormType::Note);
    assert_eq!(note.lanes, [60.0, 60.0]);
    assert!(!note.active);

    let number = h.sample(&number);
    assert_eq!(number.form.ty, FormType::Linear);
    assert_eq!(number.lanes, [0.5, 0.5]);
}

#[test]
fn test_math_keeps_left_form() {
    let mut h = Harness::new();
    h.eval(set("pitch", Expression::note(60.0))).unwrap();
    let sum = h
        .eval(math(OperatorType::Add, var("pitch"), num(12.0)))
        .unwrap()
        .into_num()
        .unwrap();
    let negated = h
        .eval(Expression::unary(UnaryOp::Negative, var("pitch")))
        .unwrap()
        .into_num()
        .unwrap();

    let sum = h.sample(&sum);
    assert_eq!(sum.form.ty, FormType::Note);
    assert_approx_eq!(f32, sum.lanes[0], 72.0, epsilon = 1e-6);

    let negated = h.sample(&negated);
    assert_eq!(negated.form.ty, FormType::Note);
    assert_approx_eq!(f32, negated.lanes[1], -60.0, epsilon = 1e-6);
}

#[test]
fn test_unary_not_and_comparisons() {
    let mut h = Harness::new();
    let not_zero = h
        .eval(Expression::unary(UnaryOp::Not, num(0.0)))
        .unwrap()
        .into_num()
        .unwrap();
    let not_two = h
        .eval(Expression::unary(UnaryOp::Not, num(2.0)))
        .unwrap()
        .into_num()
        .unwrap();
    let greater = h
        .eval(math(OperatorType::LogicalGt, num(3.0), num(2.0)))
        .unwrap()
        .into_num()
        .unwrap();

    assert_eq!(h.sample(&not_zero).lanes, [1.0, 1.0]);
    assert_eq!(h.sample(&not_two).lanes, [0.0, 0.0]);
    assert_eq!(h.sample(&greater).lanes, [1.0, 1.0]);
}

#[test]
fn test_bitwise_operators_round_trip_through_integers() {
    let mut h = Harness::new();
    let and = h
        .eval(math(OperatorType::BitwiseAnd, num(6.0), num(3.0)))
        .unwrap()
        .into_num()
        .unwrap();
    let xor = h
        .eval(math(OperatorType::BitwiseXor, num(6.7), num(3.0)))
        .unwrap()
        .into_num()
        .unwrap();

    assert_eq!(h.sample(&and).lanes, [2.0, 2.0]);
    assert_eq!(h.sample(&xor).lanes, [5.0, 5.0]);
}

#[test]
fn test_math_rejects_tuples() {
    let mut h = Harness::new();
    let kind = h.error(math(
        OperatorType::Add,
        Expression::tuple(vec![num(1.0), num(2.0)]),
        num(1.0),
    ));
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));
}

// ============================================================================
// Active flags
// ============================================================================

fn active_of(kind: OperatorType, left: bool, right: bool) -> bool {
    let registry = Registry::standard();
    let mut function = Function::new("active");
    let l = constant(&mut function, 2.0, left);
    let r = constant(&mut function, 3.0, right);
    let operator = registry.get_operator(kind, &Type::Num, &Type::Num).unwrap();
    let out = operator
        .call(&mut function, l.into(), r.into(), SourceRange::UNDEFINED)
        .unwrap()
        .into_num()
        .unwrap();

    let mut interpreter = Interpreter::new(&function);
    interpreter.run(&function, &mut [], &TimeBase::default()).unwrap();
    interpreter.read_num(&out).unwrap().active
}

#[test]
fn test_active_mode_combination() {
    // multiply needs all inputs active, add any of them
    assert!(!active_of(OperatorType::Multiply, true, false));
    assert!(active_of(OperatorType::Add, true, false));
    assert!(active_of(OperatorType::Add, false, true));

    // power follows its first operand
    assert!(active_of(OperatorType::Power, true, false));
    assert!(active_of(OperatorType::Power, true, true));
    assert!(!active_of(OperatorType::Power, false, true));
}

#[test]
fn test_active_mode_table() {
    let registry = Registry::standard();
    let mode = |kind| {
        registry
            .get_operator(kind, &Type::Num, &Type::Num)
            .map(|op| op.active_mode())
    };
    assert_eq!(mode(OperatorType::Subtract), Some(ActiveMode::AnyInput));
    assert_eq!(mode(OperatorType::Divide), Some(ActiveMode::AllInputs));
    assert_eq!(mode(OperatorType::Modulo), Some(ActiveMode::AllInputs));
    assert_eq!(mode(OperatorType::LogicalAnd), Some(ActiveMode::AllInputs));
    assert_eq!(mode(OperatorType::LogicalOr), Some(ActiveMode::AnyInput));
    assert!(registry
        .get_operator(OperatorType::Add, &Type::Midi, &Type::Num)
        .is_none());
}

#[test]
fn test_logical_result_gates_active() {
    let registry = Registry::standard();
    let mut function = Function::new("logic");
    let one = constant(&mut function, 1.0, true);
    let zero = constant(&mut function, 0.0, true);
    let and = registry
        .call_operator(
            OperatorType::LogicalAnd,
            &mut function,
            one.clone().into(),
            zero.clone().into(),
            SourceRange::UNDEFINED,
        )
        .unwrap()
        .into_num()
        .unwrap();
    let or = registry
        .call_operator(
            OperatorType::LogicalOr,
            &mut function,
            one.into(),
            zero.into(),
            SourceRange::UNDEFINED,
        )
        .unwrap()
        .into_num()
        .unwrap();

    let mut interpreter = Interpreter::new(&function);
    interpreter.run(&function, &mut [], &TimeBase::default()).unwrap();

    let and = interpreter.read_num(&and).unwrap();
    assert_eq!(and.lanes, [0.0, 0.0]);
    assert!(!and.active);

    let or = interpreter.read_num(&or).unwrap();
    assert_eq!(or.lanes, [1.0, 1.0]);
    assert!(or.active);
}

// ============================================================================
// Piecewise tuples
// ============================================================================

#[test]
fn test_tuple_scalar_broadcast() {
    let registry = Registry::standard();
    let mut function = Function::new("piecewise");
    let items = (1..=3)
        .map(|i| Value::Num(constant(&mut function, i as f32, false)))
        .collect();
    let tuple = Value::Tuple(Tuple::new(items, SourceRange::UNDEFINED));
    let ten = Value::Num(constant(&mut function, 10.0, false));

    let sum = registry
        .call_operator(OperatorType::Add, &mut function, tuple.clone(), ten.clone(), SourceRange::UNDEFINED)
        .unwrap();
    let diff = registry
        .call_operator(OperatorType::Subtract, &mut function, ten, tuple, SourceRange::UNDEFINED)
        .unwrap();

    let mut interpreter = Interpreter::new(&function);
    interpreter.run(&function, &mut [], &TimeBase::default()).unwrap();

    let lanes = |value: &Value| -> Vec<f32> {
        tuple_items(value)
            .iter()
            .map(|item| interpreter.read_num(item.as_num().unwrap()).unwrap().lanes[0])
            .collect()
    };
    assert_eq!(lanes(&sum), vec![11.0, 12.0, 13.0]);
    assert_eq!(lanes(&diff), vec![9.0, 8.0, 7.0]);
}

#[test]
fn test_tuple_arity_mismatch_names_both_sizes() {
    let registry = Registry::standard();
    let mut function = Function::new("piecewise");
    let pair = (0..2)
        .map(|i| Value::Num(constant(&mut function, i as f32, false)))
        .collect();
    let triple = (0..3)
        .map(|i| Value::Num(constant(&mut function, i as f32, false)))
        .collect();

    let err = registry
        .call_operator(
            OperatorType::Multiply,
            &mut function,
            Value::Tuple(Tuple::new(pair, SourceRange::UNDEFINED)),
            Value::Tuple(Tuple::new(triple, SourceRange::UNDEFINED)),
            SourceRange::UNDEFINED,
        )
        .unwrap_err();

    assert_eq!(
        err.kind,
        ErrorKind::ArityMismatch {
            verb: "multiply",
            left: 2,
            right: 3
        }
    );
    assert!(err.message().contains("multiply 2 values to 3"));
}

// ============================================================================
// Assignment
// ============================================================================

#[test]
fn test_tuple_assign_destructures() {
    let mut h = Harness::new();
    let targets = vec![Assignable::variable("a"), Assignable::variable("b")];
    h.eval(Expression::assign(
        AssignOp::Assign,
        targets,
        Expression::tuple(vec![num(1.0), num(2.0)]),
    ))
    .unwrap();

    assert_eq!(h.sample(&h.variable("a")).lanes, [1.0, 1.0]);
    assert_eq!(h.sample(&h.variable("b")).lanes, [2.0, 2.0]);
}

#[test]
fn test_tuple_assign_arity_mismatch() {
    let mut h = Harness::new();
    let targets = vec![
        Assignable::variable("a"),
        Assignable::variable("b"),
        Assignable::variable("c"),
    ];
    let kind = h.error(Expression::assign(
        AssignOp::Assign,
        targets,
        Expression::tuple(vec![num(1.0), num(2.0)]),
    ));
    assert!(matches!(kind, ErrorKind::ArityMismatch { left: 2, right: 3, .. }));
}

#[test]
fn test_scalar_assign_broadcasts_to_every_target() {
    let mut h = Harness::new();
    let targets = vec![
        Assignable::variable("a"),
        Assignable::variable("b"),
        Assignable::variable("c"),
    ];
    let result = h
        .eval(Expression::assign(AssignOp::Assign, targets, num(4.0)))
        .unwrap()
        .into_num()
        .unwrap();

    assert_eq!(h.sample(&result).lanes, [4.0, 4.0]);
    for name in ["a", "b", "c"] {
        assert_eq!(h.sample(&h.variable(name)).lanes, [4.0, 4.0]);
    }
}

#[test]
fn test_compound_assign() {
    let mut h = Harness::new();
    h.eval(set("a", num(3.0))).unwrap();
    h.eval(Expression::assign(AssignOp::Multiply, Assignable::variable("a"), num(4.0)))
        .unwrap();
    h.eval(Expression::assign(AssignOp::Subtract, Assignable::variable("a"), num(2.0)))
        .unwrap();
    h.eval(Expression::assign(AssignOp::Modulo, Assignable::variable("a"), num(4.0)))
        .unwrap();

    assert_eq!(h.sample(&h.variable("a")).lanes, [2.0, 2.0]);
}

#[test]
fn test_compound_assign_needs_numbers() {
    let mut h = Harness::new();
    h.eval(set("a", num(1.0))).unwrap();
    let kind = h.error(Expression::assign(
        AssignOp::Add,
        Assignable::variable("a"),
        Expression::tuple(vec![num(1.0), num(2.0)]),
    ));
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));

    h.eval(set("t", Expression::tuple(vec![num(1.0), num(2.0)]))).unwrap();
    let kind = h.error(Expression::assign(AssignOp::Add, Assignable::variable("t"), num(1.0)));
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));

    assert_eq!(h.scope.find_value("a").map(Value::ty), Some(Type::Num));
}

#[test]
fn test_assignment_yields_right_hand_value() {
    let mut h = Harness::new();
    let targets = vec![Assignable::variable("p"), Assignable::variable("q")];
    h.eval(set("x", Expression::assign(AssignOp::Assign, targets, num(5.0))))
        .unwrap();
    let x = h.variable("x");

    h.eval(set("a", num(1.0))).unwrap();
    h.eval(set(
        "y",
        Expression::assign(AssignOp::Add, Assignable::variable("a"), num(2.0)),
    ))
    .unwrap();

    assert_eq!(h.sample(&x).lanes, [5.0, 5.0]);
    assert_eq!(h.sample(&h.variable("y")).lanes, [2.0, 2.0]);
    assert_eq!(h.sample(&h.variable("a")).lanes, [3.0, 3.0]);
}

#[test]
fn test_power_assign_is_reserved() {
    let mut h = Harness::new();
    h.eval(set("a", num(3.0))).unwrap();
    let kind = h.error(Expression::assign(AssignOp::Power, Assignable::variable("a"), num(2.0)));
    assert!(matches!(kind, ErrorKind::Reserved(_)));
}

#[test]
fn test_unset_variable() {
    let mut h = Harness::new();
    assert_eq!(h.error(var("nope")), ErrorKind::UnsetVariable("nope".into()));
}

// ============================================================================
// Postfix
// ============================================================================

#[test]
fn test_postfix_increment() {
    let mut h = Harness::new();
    h.eval(set("a", num(2.0))).unwrap();
    let result = h
        .eval(Expression::postfix(PostfixOp::Increment, Assignable::variable("a")))
        .unwrap();

    assert!(result.is_const());
    let items = tuple_items(&result);
    assert_eq!(items.len(), 1);

    let stored = h.sample(&h.variable("a"));
    assert_eq!(stored.lanes, [3.0, 3.0]);
    assert_eq!(stored.form.ty, FormType::Linear);

    let returned = h.sample(items[0].as_num().unwrap());
    assert_eq!(returned.lanes, [3.0, 3.0]);
    assert_eq!(returned.form.ty, FormType::Linear);
}

#[test]
fn test_postfix_decrement_over_several_targets() {
    let mut h = Harness::new();
    h.eval(set("a", num(5.0))).unwrap();
    h.eval(set("b", Expression::note(60.0))).unwrap();
    let result = h
        .eval(Expression::postfix(
            PostfixOp::Decrement,
            vec![Assignable::variable("a"), Assignable::variable("b")],
        ))
        .unwrap();

    assert_eq!(tuple_items(&result).len(), 2);
    assert_eq!(h.sample(&h.variable("a")).lanes, [4.0, 4.0]);
    let b = h.sample(&h.variable("b"));
    assert_eq!(b.lanes, [59.0, 59.0]);
    assert_eq!(b.form.ty, FormType::Note);
}

// ============================================================================
// Casts
// ============================================================================

#[test]
fn test_cast_sets_form_and_params() {
    let mut h = Harness::new();
    let cast = h
        .eval(Expression::cast(num(0.5), FormType::Control, vec![num(2.0), num(8.0)]))
        .unwrap()
        .into_num()
        .unwrap();
    assert!(cast.is_const);

    let sample = h.sample(&cast);
    assert_eq!(sample.lanes, [0.5, 0.5]);
    assert_eq!(sample.form.ty, FormType::Control);
    assert_eq!(sample.form.params, [2.0, 8.0, 0.0]);
}

#[test]
fn test_cast_limits() {
    let mut h = Harness::new();
    let kind = h.error(Expression::cast(
        num(1.0),
        FormType::Frequency,
        vec![num(1.0), num(2.0), num(3.0), num(4.0)],
    ));
    assert_eq!(kind, ErrorKind::TooManyFormParams(3));

    let kind = h.error(Expression::cast(
        Expression::tuple(vec![num(1.0)]),
        FormType::Frequency,
        vec![],
    ));
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));

    let mut convert = Expression::cast(num(1.0), FormType::Db, vec![]);
    if let crate::ast::ExprKind::Cast { convert: flag, .. } = &mut convert.kind {
        *flag = true;
    }
    assert!(matches!(h.error(convert), ErrorKind::Reserved(_)));
}

// ============================================================================
// Calls
// ============================================================================

#[test]
fn test_calls() {
    let mut h = Harness::new();
    let max = h
        .eval(Expression::call("max", vec![num(1.0), num(5.0), num(3.0)]))
        .unwrap()
        .into_num()
        .unwrap();
    let clamped = h
        .eval(Expression::call("clamp", vec![num(7.0), num(0.0), num(2.0)]))
        .unwrap()
        .into_num()
        .unwrap();
    let swapped = h
        .eval(Expression::call(
            "swap",
            vec![Expression::call("combine", vec![num(1.0), num(2.0)])],
        ))
        .unwrap()
        .into_num()
        .unwrap();

    assert_eq!(h.sample(&max).lanes, [5.0, 5.0]);
    assert_eq!(h.sample(&clamped).lanes, [2.0, 2.0]);
    assert_eq!(h.sample(&swapped).lanes, [2.0, 1.0]);
}

#[test]
fn test_call_errors() {
    let mut h = Harness::new();
    assert_eq!(
        h.error(Expression::call("bogus", vec![])),
        ErrorKind::UnknownFunction("bogus".into())
    );
    assert!(matches!(
        h.error(Expression::call("sin", vec![num(1.0), num(2.0)])),
        ErrorKind::ArgumentCount { found: 2, .. }
    ));
    assert!(matches!(
        h.error(Expression::call("sqrt", vec![Expression::tuple(vec![num(1.0)])])),
        ErrorKind::TypeMismatch { .. }
    ));
}

#[test]
fn test_oscillator_converts_frequency() {
    let mut h = Harness::new();
    // A4 as a note converts to 440Hz
    let osc = h
        .eval(Expression::call("rmposc", vec![Expression::note(69.0)]))
        .unwrap()
        .into_num()
        .unwrap();
    assert!(!osc.is_const);

    let mut interpreter = Interpreter::new(&h.function);
    let time = TimeBase::new(4400.0, 120.0);
    interpreter.run(&h.function, &mut [], &time).unwrap();
    let first = interpreter.read_num(&osc).unwrap();
    interpreter.run(&h.function, &mut [], &time).unwrap();
    let second = interpreter.read_num(&osc).unwrap();

    assert_eq!(first.form.ty, FormType::Oscillator);
    assert_approx_eq!(f32, first.lanes[0], -1.0, epsilon = 1e-6);
    assert_approx_eq!(f32, second.lanes[0], -0.8, epsilon = 1e-4);
}

// ============================================================================
// Controls
// ============================================================================

#[test]
fn test_control_directions() {
    let mut h = Harness::new();
    let read = Expression::control("in", ControlType::Number, "value");
    h.eval(Expression::assign(
        AssignOp::Assign,
        Assignable::control("out", ControlType::Number, "value"),
        math(OperatorType::Multiply, read.clone(), num(2.0)),
    ))
    .unwrap();
    h.eval(Expression::assign(
        AssignOp::Add,
        Assignable::control("in", ControlType::Number, "value"),
        num(1.0),
    ))
    .unwrap();

    let controls = h.scope.controls();
    assert_eq!(controls.len(), 2);
    assert_eq!((controls[0].name.as_str(), controls[0].index), ("in", 0));
    assert_eq!(controls[0].direction, ControlDirection::Bidirectional);
    assert_eq!((controls[1].name.as_str(), controls[1].index), ("out", 1));
    assert_eq!(controls[1].direction, ControlDirection::Output);

    let mut storage = vec![
        Storage::from(NumValue::new(1.5, -1.0, FormType::Linear)),
        Storage::for_type(&Type::Num),
    ];
    let mut interpreter = Interpreter::new(&h.function);
    interpreter
        .run(&h.function, &mut storage, &TimeBase::default())
        .unwrap();

    assert_eq!(storage[1].as_num().unwrap().lanes, [3.0, -2.0]);
    assert_eq!(storage[0].as_num().unwrap().lanes, [2.5, 0.0]);
}

#[test]
fn test_invalid_control_property() {
    let mut h = Harness::new();
    assert_eq!(
        h.error(Expression::control("x", ControlType::Number, "bogus")),
        ErrorKind::InvalidProperty("bogus".into())
    );
    let kind = h.error(Expression::assign(
        AssignOp::Assign,
        Assignable::control("m", ControlType::Midi, "value"),
        num(1.0),
    ));
    assert!(matches!(kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn test_compile_block_lists_controls() {
    let registry = Registry::standard();
    let block = crate::ast::Block::new(vec![
        set("x", Expression::control("a", ControlType::Number, "value")),
        Expression::assign(
            AssignOp::Assign,
            Assignable::control("b", ControlType::Number, "value"),
            var("x"),
        ),
    ]);
    let compiled = compile_block(&registry, "copy", &block).unwrap();

    assert_eq!(compiled.controls.len(), 2);
    assert_eq!(compiled.function.control_count(), 2);
    let a = compiled.control("a", ControlType::Number).unwrap();
    assert!(a.direction.is_read() && !a.direction.is_written());
    let b = compiled.control("b", ControlType::Number).unwrap();
    assert!(b.direction.is_written() && !b.direction.is_read());

    let broken = crate::ast::Block::new(vec![var("missing")]);
    assert!(compile_block(&registry, "broken", &broken).is_err());
}
