use std::collections::BTreeSet;

use maxim::ast::{AssignOp, Assignable, Block, Expression};
use maxim::common::ControlType;
use maxim::compiler::{live_nodes, union_connections, GroupTable};
use maxim::mir::{ConstantValue, ValueGroupSource};
use maxim::model::{key_id, ControlKey, NodeKey, Project};
use maxim::values::{FormType, NumValue};
use maxim::Compiler;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn reader(control: &str) -> Block {
    Block::new(vec![Expression::assign(
        AssignOp::Assign,
        Assignable::variable("v"),
        Expression::control(control, ControlType::Number, "value"),
    )])
}

fn add_node(project: &mut Project, name: &str, block: Block, controls: usize) -> (NodeKey, Vec<ControlKey>) {
    let root = project.root();
    let node = project.add_custom_node(root, name, block).unwrap();
    let controls = (0..controls)
        .map(|i| project.add_control(node, &format!("c{}", i), ControlType::Number).unwrap())
        .collect();
    (node, controls)
}

/// Group membership of every control, as sets of control keys.
fn partition(project: &Project) -> BTreeSet<BTreeSet<ControlKey>> {
    let nodes = live_nodes(project, project.root()).unwrap();
    let mut table = GroupTable::new();
    union_connections(project, &nodes, &mut table).unwrap();
    table
        .groups()
        .map(|(_, group)| group.controls.iter().copied().collect())
        .collect()
}

#[test]
fn test_groups_are_connected_components() {
    let mut project = Project::new();
    let (_, a) = add_node(&mut project, "a", Block::default(), 2);
    let (_, b) = add_node(&mut project, "b", Block::default(), 2);
    let (_, c) = add_node(&mut project, "c", Block::default(), 1);

    project.connect(a[0], b[1]).unwrap();
    project.connect(b[1], c[0]).unwrap();
    project.connect(a[1], b[0]).unwrap();

    let groups = partition(&project);
    assert_eq!(groups.len(), 2);
    assert!(groups.contains(&[a[0], b[1], c[0]].into_iter().collect()));
    assert!(groups.contains(&[a[1], b[0]].into_iter().collect()));
}

#[test]
fn test_membership_ignores_edge_order() {
    let mut forward = Project::new();
    let (_, controls) = add_node(&mut forward, "n", Block::default(), 6);
    let list = [
        (controls[0], controls[3]),
        (controls[4], controls[5]),
        (controls[3], controls[5]),
        (controls[1], controls[2]),
    ];
    let mut backward = forward.clone();

    for &(x, y) in &list {
        forward.connect(x, y).unwrap();
    }
    for &(x, y) in list.iter().rev() {
        backward.connect(y, x).unwrap();
    }

    assert_eq!(partition(&forward), partition(&backward));
    assert_eq!(partition(&forward).len(), 2);
}

#[test]
fn test_exposure_outranks_constants() {
    init_tracing();
    let mut project = Project::new();
    let root = project.root();
    let (_, inner) = project.add_group_node(root, "voice").unwrap();
    let exposed = project.add_custom_node(inner, "exposed", reader("c0")).unwrap();
    let exposed = project.add_control(exposed, "c0", ControlType::Number).unwrap();
    let constant = project.add_custom_node(inner, "constant", reader("c0")).unwrap();
    let constant = project.add_control(constant, "c0", ControlType::Number).unwrap();
    project.connect(exposed, constant).unwrap();
    project.set_value(exposed, NumValue::splat(0.25, FormType::Linear)).unwrap();
    project.set_value(constant, NumValue::splat(0.5, FormType::Linear)).unwrap();
    project.expose(exposed).unwrap();

    let transaction = Compiler::default().build(&mut project).unwrap();
    let mir = transaction.surface(key_id(inner)).unwrap();

    assert_eq!(mir.groups.len(), 1);
    assert_eq!(mir.groups[0].source, ValueGroupSource::Socket(0));
}

#[test]
fn test_zero_constants_stay_private() {
    let mut project = Project::new();
    let (_, zero) = add_node(&mut project, "zero", reader("c0"), 1);
    let (_, one) = add_node(&mut project, "one", reader("c0"), 1);
    let (_, nan) = add_node(&mut project, "nan", reader("c0"), 1);
    let (_, note) = add_node(&mut project, "note", reader("c0"), 1);
    project.set_value(zero[0], NumValue::new(0.0, 0.0, FormType::Linear)).unwrap();
    project.set_value(one[0], NumValue::new(1.0, 0.0, FormType::Linear)).unwrap();
    project.set_value(nan[0], NumValue::new(f32::NAN, 1.0, FormType::Linear)).unwrap();
    project.set_value(note[0], NumValue::new(0.0, 0.0, FormType::Note)).unwrap();

    let transaction = Compiler::default().build(&mut project).unwrap();
    let mir = transaction.surface(key_id(project.root())).unwrap();

    assert_eq!(mir.groups[0].source, ValueGroupSource::None);
    assert_eq!(
        mir.groups[1].source,
        ValueGroupSource::Default(ConstantValue::Num(NumValue::new(1.0, 0.0, FormType::Linear)))
    );
    assert_eq!(mir.groups[2].source, ValueGroupSource::None);
    assert_eq!(
        mir.groups[3].source,
        ValueGroupSource::Default(ConstantValue::Num(NumValue::new(0.0, 0.0, FormType::Note)))
    );
}

#[test]
fn test_failed_node_contributes_nothing() {
    init_tracing();
    let mut project = Project::new();
    let (first, first_controls) = add_node(&mut project, "first", reader("c0"), 1);
    let (broken, broken_controls) = add_node(&mut project, "broken", Block::new(vec![Expression::variable("nope")]), 2);
    let (last, last_controls) = add_node(&mut project, "last", reader("c0"), 1);
    project.connect(first_controls[0], broken_controls[0]).unwrap();
    project.connect(broken_controls[1], last_controls[0]).unwrap();

    let transaction = Compiler::default().build(&mut project).unwrap();
    let mir = transaction.surface(key_id(project.root())).unwrap();

    assert_eq!(mir.groups.len(), 2);
    assert_eq!(mir.nodes.len(), 2);
    assert_eq!(mir.nodes[0].socket_groups(), vec![0]);
    assert_eq!(mir.nodes[1].socket_groups(), vec![1]);
    assert_eq!(project.node(first).unwrap().compile_index, Some(0));
    assert_eq!(project.node(last).unwrap().compile_index, Some(1));
    assert_eq!(project.node(broken).unwrap().compile_index, None);
    assert!(transaction.block(key_id(broken)).is_none());
}
