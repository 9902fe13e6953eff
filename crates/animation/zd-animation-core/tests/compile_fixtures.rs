use zd_animation_core::compiler::{GraphSpec, MachineNodeSpec, MachineSpec, NodeKindSpec, NodeSpec};
use zd_animation_core::{compile, AnimBlueprintSpec, CompileError, SequenceLibrary};
use zd_test_fixtures::{blueprints, sequences};

fn load(name: &str) -> (AnimBlueprintSpec, SequenceLibrary) {
    let library_key = blueprints::library(name).unwrap();
    let library = SequenceLibrary::from_json(&sequences::json(&library_key).unwrap()).unwrap();
    let spec = AnimBlueprintSpec::from_json(&blueprints::spec_json(name).unwrap()).unwrap();
    (spec, library)
}

#[test]
fn hero_blueprint_compiles() {
    let (spec, library) = load("hero");
    let class = compile(&spec, &library).unwrap();
    assert_eq!(class.name, "HeroAnimBP");
    assert_eq!(class.slot_group("Attack"), Some("UpperBody"));
    assert_eq!(class.state_machine_nodes().len(), 1);

    let machine = &class.state_machines()[0];
    assert_eq!(machine.machine_name, "Locomotion");
    assert_eq!(machine.nodes[machine.initial_state].name, "Idle");

    let run = machine.node_index("Run").unwrap();
    let landing = machine.node_index("Landing").unwrap();
    assert!(machine.nodes[landing].is_conduit);
    // The falling link outranks the stop link.
    assert_eq!(machine.nodes[run].outward_links[0].target_node_index, landing);
    assert!(machine.nodes[landing].outward_links[0].has_transitional_animations());
    assert_eq!(
        machine.jump_links.get("Reset"),
        machine.node_index("Idle").as_ref()
    );
}

#[test]
fn caches_read_from_two_branches_are_not_cycles() {
    let (spec, library) = load("shared_cache");
    assert!(compile(&spec, &library).is_ok());
}

#[test]
fn caches_reading_each_other_are_rejected() {
    let (spec, library) = load("cyclic_cache");
    let failure = compile(&spec, &library).unwrap_err();
    assert_eq!(
        failure.errors,
        vec![CompileError::CircularReference { cache: "A".into() }]
    );
}

#[test]
fn state_machine_nested_in_itself_is_rejected() {
    let (_, library) = load("hero");
    let spec = AnimBlueprintSpec {
        name: "Nested".into(),
        anim_graph: GraphSpec {
            name: String::new(),
            nodes: vec![
                NodeSpec {
                    id: "out".into(),
                    kind: NodeKindSpec::Sink {
                        result: Some("sm".into()),
                    },
                },
                NodeSpec {
                    id: "sm".into(),
                    kind: NodeKindSpec::StateMachine {
                        machine: "Outer".into(),
                    },
                },
            ],
        },
        state_machines: vec![
            MachineSpec {
                name: "Outer".into(),
                nodes: vec![
                    MachineNodeSpec::Entry {
                        target: Some("Only".into()),
                    },
                    MachineNodeSpec::State {
                        name: "Only".into(),
                        graph: GraphSpec {
                            name: String::new(),
                            nodes: vec![
                                NodeSpec {
                                    id: "out".into(),
                                    kind: NodeKindSpec::Sink {
                                        result: Some("inner".into()),
                                    },
                                },
                                NodeSpec {
                                    id: "inner".into(),
                                    kind: NodeKindSpec::StateMachine {
                                        machine: "Inner".into(),
                                    },
                                },
                            ],
                        },
                        on_enter: None,
                        on_exit: None,
                    },
                ],
            },
            MachineSpec {
                name: "Inner".into(),
                nodes: vec![
                    MachineNodeSpec::Entry {
                        target: Some("Loop".into()),
                    },
                    MachineNodeSpec::State {
                        name: "Loop".into(),
                        graph: GraphSpec {
                            name: String::new(),
                            nodes: vec![
                                NodeSpec {
                                    id: "out".into(),
                                    kind: NodeKindSpec::Sink {
                                        result: Some("again".into()),
                                    },
                                },
                                NodeSpec {
                                    id: "again".into(),
                                    kind: NodeKindSpec::StateMachine {
                                        machine: "Outer".into(),
                                    },
                                },
                            ],
                        },
                        on_enter: None,
                        on_exit: None,
                    },
                ],
            },
        ],
    };
    let failure = compile(&spec, &library).unwrap_err();
    assert!(failure.contains(
        |e| matches!(e, CompileError::StateMachineReused { machine } if machine == "Outer")
    ));
    assert!(failure.contains(|e| matches!(e, CompileError::RecursiveStateMachine { .. })));
}
