use std::f64::consts::PI;

use gearsim::backend::Namespace;
use gearsim::model::{BodyHandle, PropertyOwner, PropertyRef};
use gearsim::{
    Axis, Backend, CompileError, Compiler, CompilerConfig, ConstRotationNode, EntityId, GearNode,
    InputSlot, MechanismEntity, MechanismGraph, MemoryBackend, NodeId, OutputSlot,
    RangeConditionNode, Rule, TransmissionNode,
};

fn rig() -> EntityId {
    EntityId::new("rig")
}

fn gear(name: &str) -> MechanismEntity {
    MechanismEntity::new(&rig(), name, Axis::Z)
}

fn body_scalar(body: &str, name: &str) -> PropertyRef {
    PropertyRef::scalar(PropertyOwner::Body(BodyHandle::new(rig(), body)), name)
}

fn snapshot(backend: &MemoryBackend) -> Vec<Rule> {
    backend.rules().into_iter().cloned().collect()
}

/// cam range gates a transmission from `driver` that turns `out`.
fn clutch_graph() -> (MechanismGraph, NodeId, NodeId, NodeId) {
    let mut graph = MechanismGraph::new();
    let anchor = graph.add(GearNode::new(gear("out")));
    let trans = graph.add(TransmissionNode::new(gear("driver"), 40, 20));
    let range = graph.add(RangeConditionNode::new(gear("cam"), 3.0 * PI / 2.0, PI / 2.0));
    graph
        .link(anchor, InputSlot::Rotation, trans, OutputSlot::Rotation)
        .unwrap();
    graph
        .link(trans, InputSlot::Condition, range, OutputSlot::Condition)
        .unwrap();
    (graph, anchor, trans, range)
}

/// Two mutually gated transmissions.
fn cyclic_graph() -> MechanismGraph {
    let mut graph = MechanismGraph::new();
    let anchor = graph.add(GearNode::new(gear("out")));
    let t1 = graph.add(TransmissionNode::new(gear("driver"), 10, 20));
    let t2 = graph.add(TransmissionNode::new(gear("driver"), 20, 10));
    graph
        .link(anchor, InputSlot::Rotation, t1, OutputSlot::Rotation)
        .unwrap();
    graph
        .link(t1, InputSlot::Condition, t2, OutputSlot::Condition)
        .unwrap();
    graph
        .link(t2, InputSlot::Condition, t1, OutputSlot::Condition)
        .unwrap();
    graph
}

fn scope_index(graph: &MechanismGraph, id: NodeId) -> usize {
    let scope = graph.scope(id).unwrap();
    scope
        .trim_start_matches("Node")
        .trim_end_matches('_')
        .parse()
        .unwrap()
}

#[test]
fn test_producers_are_built_before_consumers() {
    let (mut graph, anchor, trans, range) = clutch_graph();
    let mut backend = MemoryBackend::new();
    Compiler::default()
        .compile(&mut backend, &rig(), &mut graph, 0)
        .unwrap();

    assert!(scope_index(&graph, range) < scope_index(&graph, trans));
    assert!(scope_index(&graph, trans) < scope_index(&graph, anchor));

    // frame timing, range, transmission (rotation, offset, gate), gear
    assert_eq!(backend.rules().len(), 7);
    let gate = backend
        .rule_for(&body_scalar("out", "Node1_condition"))
        .unwrap();
    assert_eq!(gate.expression, "gate");
    assert_eq!(
        gate.bindings[0].source,
        body_scalar("out", "Node0_condition")
    );
}

#[test]
fn test_cycle_leaves_backend_untouched() {
    let mut backend = MemoryBackend::new();
    let compiler = Compiler::default();

    let err = compiler
        .compile(&mut backend, &rig(), &mut cyclic_graph(), 0)
        .unwrap_err();
    assert!(matches!(err, CompileError::GraphCycle { .. }));
    assert!(backend.rules().is_empty());
    assert_eq!(backend.scalar_count(), 0);

    let (mut graph, ..) = clutch_graph();
    compiler.compile(&mut backend, &rig(), &mut graph, 0).unwrap();
    let before = snapshot(&backend);
    let scalars = backend.scalar_count();

    assert!(
        compiler
            .compile(&mut backend, &rig(), &mut cyclic_graph(), 0)
            .is_err()
    );
    assert_eq!(snapshot(&backend), before);
    assert_eq!(backend.scalar_count(), scalars);
}

#[test]
fn test_recompile_is_idempotent() {
    let (mut graph, ..) = clutch_graph();
    let mut backend = MemoryBackend::new();
    let compiler = Compiler::default();

    compiler.compile(&mut backend, &rig(), &mut graph, 3).unwrap();
    let first = snapshot(&backend);

    backend
        .clear_namespace(&compiler.namespace(), &rig())
        .unwrap();
    assert!(backend.rules().is_empty());
    compiler.compile(&mut backend, &rig(), &mut graph, 3).unwrap();
    assert_eq!(snapshot(&backend), first);

    // compile clears its own namespace first
    compiler.compile(&mut backend, &rig(), &mut graph, 3).unwrap();
    assert_eq!(snapshot(&backend), first);
}

#[test]
fn test_scopes_unique_across_gears() {
    let mut graph = MechanismGraph::new();
    let motor = graph.add(ConstRotationNode::new(0.1));
    let gear_a = graph.add(GearNode::new(gear("a")));
    let trans = graph.add(TransmissionNode::new(gear("a"), 12, 24));
    let range = graph.add(RangeConditionNode::new(gear("a"), 0.0, PI));
    let gear_b = graph.add(GearNode::new(gear("b")));
    graph
        .link(gear_a, InputSlot::Rotation, motor, OutputSlot::Rotation)
        .unwrap();
    graph
        .link(gear_b, InputSlot::Rotation, trans, OutputSlot::Rotation)
        .unwrap();
    graph
        .link(gear_b, InputSlot::Condition, range, OutputSlot::Condition)
        .unwrap();

    let mut backend = MemoryBackend::new();
    Compiler::default()
        .compile(&mut backend, &rig(), &mut graph, 0)
        .unwrap();

    let mut scopes: Vec<&str> = (0..graph.len())
        .map(|i| graph.scope(NodeId(i)).unwrap())
        .collect();
    scopes.sort();
    scopes.dedup();
    assert_eq!(scopes.len(), 5);
}

#[test]
fn test_shared_node_built_once() {
    let mut graph = MechanismGraph::new();
    let motor = graph.add(ConstRotationNode::new(0.1));
    let gear_a = graph.add(GearNode::new(gear("a")));
    let gear_b = graph.add(GearNode::new(gear("b")));
    graph
        .link(gear_a, InputSlot::Rotation, motor, OutputSlot::Rotation)
        .unwrap();
    graph
        .link(gear_b, InputSlot::Rotation, motor, OutputSlot::Rotation)
        .unwrap();

    let mut backend = MemoryBackend::new();
    Compiler::default()
        .compile(&mut backend, &rig(), &mut graph, 0)
        .unwrap();

    assert_eq!(graph.scope(motor), Some("Node0_"));
    assert_eq!(graph.scope(gear_a), Some("Node1_"));
    assert_eq!(graph.scope(gear_b), Some("Node2_"));
    // two frame timing rules, one motor rule, two gear rules
    assert_eq!(backend.rules().len(), 5);
    let b = backend.rule_for(&PropertyRef::rotation(&gear("b"))).unwrap();
    assert_eq!(b.bindings[0].source, body_scalar("a", "Node0_rotation"));
}

#[test]
fn test_expression_length_limit() {
    let (mut graph, ..) = clutch_graph();
    let mut backend = MemoryBackend::new();
    Compiler::default()
        .compile(&mut backend, &rig(), &mut graph, 0)
        .unwrap();
    let longest = backend
        .rules()
        .iter()
        .map(|r| r.expression.chars().count())
        .max()
        .unwrap();

    let mut exact = MemoryBackend::with_max_expression_length(longest);
    assert!(
        Compiler::default()
            .compile(&mut exact, &rig(), &mut graph, 0)
            .is_ok()
    );

    let mut short = MemoryBackend::with_max_expression_length(longest - 1);
    let err = Compiler::default()
        .compile(&mut short, &rig(), &mut graph, 0)
        .unwrap_err();
    match err {
        CompileError::ExpressionTooLong { length, max, .. } => {
            assert_eq!(length, longest);
            assert_eq!(max, longest - 1);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_gear_outside_entity_rejected() {
    let mut graph = MechanismGraph::new();
    let motor = graph.add(ConstRotationNode::new(0.1));
    let other = MechanismEntity::new(&EntityId::new("other_rig"), "gear", Axis::X);
    let anchor = graph.add(GearNode::new(other));
    graph
        .link(anchor, InputSlot::Rotation, motor, OutputSlot::Rotation)
        .unwrap();

    let mut backend = MemoryBackend::new();
    let err = Compiler::default()
        .compile(&mut backend, &rig(), &mut graph, 0)
        .unwrap_err();
    assert!(matches!(err, CompileError::InvalidMechanism(_)));
    assert!(backend.rules().is_empty());
}

#[test]
fn test_transmission_input_outside_entity_rejected() {
    let mut graph = MechanismGraph::new();
    let foreign = MechanismEntity::new(&EntityId::new("other_rig"), "driver", Axis::Z);
    let trans = graph.add(TransmissionNode::new(foreign, 10, 10));
    let anchor = graph.add(GearNode::new(gear("out")));
    graph
        .link(anchor, InputSlot::Rotation, trans, OutputSlot::Rotation)
        .unwrap();

    let mut backend = MemoryBackend::new();
    let err = Compiler::default()
        .compile(&mut backend, &rig(), &mut graph, 0)
        .unwrap_err();
    assert!(matches!(err, CompileError::InvalidMechanism(_)));
}

#[test]
fn test_invalid_teeth_rejected() {
    let mut graph = MechanismGraph::new();
    let trans = graph.add(TransmissionNode::new(gear("driver"), 40, 0));
    let anchor = graph.add(GearNode::new(gear("out")));
    graph
        .link(anchor, InputSlot::Rotation, trans, OutputSlot::Rotation)
        .unwrap();

    let mut backend = MemoryBackend::new();
    assert!(matches!(
        Compiler::default().compile(&mut backend, &rig(), &mut graph, 0),
        Err(CompileError::InvalidMechanism(_))
    ));
}

#[test]
fn test_gate_into_rotation_input_rejected() {
    let mut graph = MechanismGraph::new();
    let range = graph.add(RangeConditionNode::new(gear("cam"), 0.0, PI));
    let anchor = graph.add(GearNode::new(gear("out")));
    graph
        .link(anchor, InputSlot::Rotation, range, OutputSlot::Condition)
        .unwrap();
    graph
        .link(anchor, InputSlot::Condition, range, OutputSlot::Condition)
        .unwrap();

    let mut backend = MemoryBackend::new();
    assert!(matches!(
        Compiler::default().compile(&mut backend, &rig(), &mut graph, 0),
        Err(CompileError::UnresolvedLink { input, .. }) if input == "rotation"
    ));
    assert!(backend.rules().is_empty());
}

#[test]
fn test_rotation_into_condition_input_rejected() {
    let mut graph = MechanismGraph::new();
    let anchor = graph.add(GearNode::new(gear("out")));
    let trans = graph.add(TransmissionNode::new(gear("driver"), 20, 20));
    let gate = graph.add(TransmissionNode::new(gear("driver"), 10, 20));
    graph
        .link(anchor, InputSlot::Rotation, trans, OutputSlot::Rotation)
        .unwrap();
    graph
        .link(trans, InputSlot::Condition, gate, OutputSlot::Rotation)
        .unwrap();

    let mut backend = MemoryBackend::new();
    assert!(matches!(
        Compiler::default().compile(&mut backend, &rig(), &mut graph, 0),
        Err(CompileError::UnresolvedLink { input, .. }) if input == "condition"
    ));
}

#[test]
fn test_condition_driven_twice_rejected() {
    // the transmission gates itself and the gear gates it again
    let (mut graph, anchor, _, range) = clutch_graph();
    graph
        .link(anchor, InputSlot::Condition, range, OutputSlot::Condition)
        .unwrap();

    let mut backend = MemoryBackend::new();
    assert!(matches!(
        Compiler::default().compile(&mut backend, &rig(), &mut graph, 0),
        Err(CompileError::InvalidMechanism(_))
    ));
}

#[test]
fn test_two_gears_on_same_axis_rejected() {
    let mut graph = MechanismGraph::new();
    let motor = graph.add(ConstRotationNode::new(0.1));
    for _ in 0..2 {
        let anchor = graph.add(GearNode::new(gear("out")));
        graph
            .link(anchor, InputSlot::Rotation, motor, OutputSlot::Rotation)
            .unwrap();
    }

    let mut backend = MemoryBackend::new();
    assert!(matches!(
        Compiler::default().compile(&mut backend, &rig(), &mut graph, 0),
        Err(CompileError::InvalidMechanism(_))
    ));
}

#[test]
fn test_custom_namespace_and_prefix() {
    let (mut graph, anchor, ..) = clutch_graph();
    let config = CompilerConfig {
        namespace: "custom".to_string(),
        scope_prefix: "Gear".to_string(),
    };
    let mut backend = MemoryBackend::new();
    Compiler::new(config)
        .compile(&mut backend, &rig(), &mut graph, 0)
        .unwrap();
    assert_eq!(graph.scope(anchor), Some("Gear2_"));
    assert!(backend.scalar(&body_scalar("out", "Gear1_rotation")).is_some());

    backend
        .clear_namespace(&Namespace::default(), &rig())
        .unwrap();
    assert_eq!(backend.rules().len(), 7);
    backend
        .clear_namespace(&Namespace::new("custom"), &rig())
        .unwrap();
    assert!(backend.rules().is_empty());
}

#[test]
fn test_compile_graph_from_json() {
    let json = r#"{
        "nodes": [
            {
                "label": "motor",
                "kind": { "node_type": "ConstRotation", "default_speed": 0.05 }
            },
            {
                "label": "output",
                "kind": {
                    "node_type": "Gear",
                    "target": { "body": { "entity": "rig", "name": "out" }, "axis": "y" }
                },
                "links": [ { "input": "rotation", "producer": 0, "output": "rotation" } ]
            }
        ]
    }"#;
    let mut graph = MechanismGraph::from_json(json).unwrap();
    let mut backend = MemoryBackend::new();
    Compiler::default()
        .compile(&mut backend, &rig(), &mut graph, 0)
        .unwrap();

    let out = MechanismEntity::new(&rig(), "out", Axis::Y);
    let rule = backend.rule_for(&PropertyRef::rotation(&out)).unwrap();
    assert_eq!(rule.expression, "gear_rotation");
    let speed = PropertyRef::scalar(PropertyOwner::Entity(rig()), "Node0_speed");
    assert_eq!(backend.scalar(&speed), Some(0.05));
}

#[test]
fn test_extreme_parameters_fit_host_limit() {
    let mut graph = MechanismGraph::new();
    let motor = graph.add(ConstRotationNode::new(f64::MAX));
    let tiny = graph.add(RangeConditionNode::new(gear("cam"), 1e-300, PI));
    let below_zero = graph.add(RangeConditionNode::new(gear("cam"), -1e-300, f64::MIN_POSITIVE));
    let huge = graph.add(RangeConditionNode::new(gear("cam"), f64::MAX, -f64::MAX));
    let fast = graph.add(TransmissionNode::new(gear("a"), i32::MAX, 1).with_tooth_phase(1.0));
    let slow = graph.add(TransmissionNode::new(gear("a"), 1, i32::MAX));
    let a = graph.add(GearNode::new(gear("a")));
    let b = graph.add(GearNode::new(gear("b")));
    let c = graph.add(GearNode::new(gear("c")));
    for (consumer, input, producer, output) in [
        (a, InputSlot::Rotation, motor, OutputSlot::Rotation),
        (motor, InputSlot::Condition, tiny, OutputSlot::Condition),
        (b, InputSlot::Rotation, fast, OutputSlot::Rotation),
        (fast, InputSlot::Condition, below_zero, OutputSlot::Condition),
        (c, InputSlot::Rotation, slow, OutputSlot::Rotation),
        (slow, InputSlot::Condition, huge, OutputSlot::Condition),
    ] {
        graph.link(consumer, input, producer, output).unwrap();
    }

    let mut backend = MemoryBackend::new();
    Compiler::default()
        .compile(&mut backend, &rig(), &mut graph, 0)
        .unwrap();
    for rule in backend.rules() {
        assert!(
            rule.expression.chars().count() <= 256,
            "{} is too long",
            rule
        );
    }
}
