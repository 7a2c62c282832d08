use super::*;
use crate::ast::Block;
use crate::common::{ControlType, WireType};
use crate::error::ModelError;
use crate::values::{FormType, NumValue};

fn node_with(project: &mut Project, name: &str, controls: &[(&str, ControlType)]) -> (NodeKey, Vec<ControlKey>) {
    let root = project.root();
    let node = project.add_custom_node(root, name, Block::default()).unwrap();
    let controls = controls
        .iter()
        .map(|(name, kind)| project.add_control(node, name, *kind).unwrap())
        .collect();
    (node, controls)
}

#[test]
fn test_connect_is_symmetric_and_deduplicated() {
    let mut project = Project::new();
    let (_, a) = node_with(&mut project, "a", &[("out", ControlType::Number)]);
    let (_, b) = node_with(&mut project, "b", &[("in", ControlType::NumExtract)]);

    project.connect(a[0], b[0]).unwrap();
    project.connect(b[0], a[0]).unwrap();

    assert_eq!(project.control(a[0]).unwrap().connections, vec![b[0]]);
    assert_eq!(project.control(b[0]).unwrap().connections, vec![a[0]]);

    assert!(project.disconnect(a[0], b[0]));
    assert!(!project.disconnect(a[0], b[0]));
    assert!(project.control(b[0]).unwrap().connections.is_empty());
}

#[test]
fn test_connect_rejects_mismatched_signals() {
    let mut project = Project::new();
    let (_, a) = node_with(&mut project, "a", &[("num", ControlType::Number)]);
    let (_, b) = node_with(&mut project, "b", &[("notes", ControlType::Midi)]);

    assert_eq!(
        project.connect(a[0], b[0]),
        Err(ModelError::MismatchedControls {
            from: "num".into(),
            to: "midi".into(),
        })
    );
}

#[test]
fn test_connect_rejects_controls_on_different_surfaces() {
    let mut project = Project::new();
    let root = project.root();
    let (_, outer) = node_with(&mut project, "outer", &[("x", ControlType::Number)]);
    let (_, inner) = project.add_group_node(root, "group").unwrap();
    let inner_node = project.add_custom_node(inner, "inner", Block::default()).unwrap();
    let inner_control = project.add_control(inner_node, "x", ControlType::Number).unwrap();

    assert_eq!(project.connect(outer[0], inner_control), Err(ModelError::DifferentSurfaces));
}

#[test]
fn test_expose_creates_a_group_node_control() {
    let mut project = Project::new();
    let root = project.root();
    let (group, inner) = project.add_group_node(root, "group").unwrap();
    let (_, portal) = project
        .add_portal_node(inner, "in", PortalType::Input, WireType::Midi)
        .unwrap();

    let outer = project.expose(portal).unwrap();
    let outer_control = project.control(outer).unwrap();
    assert_eq!(outer_control.kind, ControlType::Midi);
    assert_eq!(outer_control.node, group);
    assert_eq!(outer_control.exposing, Some(portal));
    assert_eq!(project.control(portal).unwrap().exposer, Some(outer));

    assert_eq!(project.expose(portal), Err(ModelError::AlreadyExposed));

    let (_, top_level) = node_with(&mut project, "top", &[("x", ControlType::Number)]);
    assert_eq!(project.expose(top_level[0]), Err(ModelError::NotInGroup));
}

#[test]
fn test_removing_a_group_removes_its_surface() {
    let mut project = Project::new();
    let root = project.root();
    let (group, inner) = project.add_group_node(root, "group").unwrap();
    let inner_node = project.add_custom_node(inner, "inner", Block::default()).unwrap();
    let inner_control = project.add_control(inner_node, "x", ControlType::Number).unwrap();
    let outer = project.expose(inner_control).unwrap();
    let (_, peer) = node_with(&mut project, "peer", &[("x", ControlType::Number)]);
    project.connect(outer, peer[0]).unwrap();

    assert!(project.remove_node(group));

    assert!(project.surface(inner).is_none());
    assert!(project.node(inner_node).is_none());
    assert!(project.control(inner_control).is_none());
    assert!(project.control(outer).is_none());
    assert!(project.control(peer[0]).unwrap().connections.is_empty());
    assert_eq!(project.surface(root).unwrap().nodes.len(), 1);
    assert!(!project.remove_node(group));
}

#[test]
fn test_ensure_control_reuses_matching_controls() {
    let mut project = Project::new();
    let (node, controls) = node_with(&mut project, "a", &[("x", ControlType::Number)]);

    assert_eq!(project.ensure_control(node, "x", ControlType::Number).unwrap(), controls[0]);
    let extract = project.ensure_control(node, "x", ControlType::NumExtract).unwrap();
    assert_ne!(extract, controls[0]);
    assert_eq!(project.node(node).unwrap().controls.len(), 2);

    project
        .set_value(controls[0], NumValue::new(1.0, 2.0, FormType::Frequency))
        .unwrap();
    assert_eq!(project.control(controls[0]).unwrap().value.right, 2.0);
}

#[test]
fn test_surfaces_are_listed_inner_first() {
    let mut project = Project::new();
    let root = project.root();
    let (_, outer) = project.add_group_node(root, "outer").unwrap();
    let (_, nested) = project.add_group_node(outer, "nested").unwrap();
    let (_, sibling) = project.add_group_node(root, "sibling").unwrap();

    assert_eq!(project.surfaces_inner_first(), vec![nested, outer, sibling, root]);
}
