//! Graph builder integration tests

use graft_host::{
    HostDocument, HostError, LinkSnapshot, MemoryDocument, NodeSnapshot, NodeTypeCatalog,
    NodeTypeInfo, SlotDirection, SocketSnapshot, GROUP_INPUT_TYPE, GROUP_OUTPUT_TYPE,
};
use graft_kernel::{BuildError, GraphBuilder, KernelConfig, KernelError};
use graft_template::{
    link, BindingMode, DefinitionError, Fingerprint, NodeDef, OutputDef, ReferenceError,
    SocketDef, TemplateDefinition, TemplateError, TemplateId, Value,
};
use graft_test_utils::{blend_definition, double_definition, kernel_with};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn link_snapshot(from_node: &str, from_slot: &str, to_node: &str, to_slot: &str) -> LinkSnapshot {
    LinkSnapshot {
        from_node: from_node.into(),
        from_slot: from_slot.into(),
        to_node: to_node.into(),
        to_slot: to_slot.into(),
    }
}

#[test]
fn double_example_end_to_end() {
    let kernel = kernel_with("double", BindingMode::Exclusive, double_definition(2.0));
    let mut doc = MemoryDocument::new();
    let owner = doc.add_owner("double");

    let binding = kernel.initialize_owner(&mut doc, owner).unwrap();
    let snapshot = doc.snapshot(binding.record.container).unwrap();

    assert_eq!(
        snapshot.inputs,
        vec![SocketSnapshot {
            name: "value".into(),
            socket_type: "FLOAT".into(),
            properties: vec![],
        }]
    );
    assert_eq!(
        snapshot.outputs,
        vec![SocketSnapshot {
            name: "result".into(),
            socket_type: "FLOAT".into(),
            properties: vec![],
        }]
    );
    assert_eq!(
        snapshot.nodes,
        vec![
            NodeSnapshot {
                name: "inputs".into(),
                node_type: GROUP_INPUT_TYPE.into(),
                properties: vec![],
                defaults: vec![],
            },
            NodeSnapshot {
                name: "double".into(),
                node_type: "MULTIPLY".into(),
                properties: vec![("label".into(), Value::from("Double"))],
                defaults: vec![("b".into(), Value::Float(2.0))],
            },
            NodeSnapshot {
                name: "outputs".into(),
                node_type: GROUP_OUTPUT_TYPE.into(),
                properties: vec![],
                defaults: vec![],
            },
        ]
    );
    assert_eq!(
        snapshot.links,
        vec![
            link_snapshot("double", "result", "outputs", "result"),
            link_snapshot("inputs", "value", "double", "a"),
        ]
    );
}

#[test]
fn fresh_instance_is_never_stale() {
    let kernel = kernel_with("blend", BindingMode::Exclusive, blend_definition(0.25));
    let mut doc = MemoryDocument::new();
    let owner = doc.add_owner("blend");
    let binding = kernel.initialize_owner(&mut doc, owner).unwrap();

    let current = kernel.registry().fingerprint(&"blend".into()).unwrap();
    assert_eq!(binding.record.hash, current);
    assert!(!kernel.is_stale(&doc, owner).unwrap());
}

#[test]
fn changed_literal_changes_fingerprint() {
    let two = Fingerprint::of(&double_definition(2.0)).unwrap();
    let three = Fingerprint::of(&double_definition(3.0)).unwrap();
    assert_ne!(two, three);
}

#[test]
fn blend_wiring_and_attributes() {
    let mut doc = MemoryDocument::new();
    let instance = GraphBuilder::default()
        .instantiate(&mut doc, &"blend".into(), &blend_definition(0.5))
        .unwrap();
    let snapshot = doc.snapshot(instance.container).unwrap();

    assert_eq!(snapshot.inputs.len(), 3);
    assert_eq!(
        snapshot.inputs[2].properties,
        vec![
            ("min_value".to_string(), Value::Float(0.0)),
            ("max_value".to_string(), Value::Float(1.0)),
        ]
    );
    let mix = snapshot.nodes.iter().find(|n| n.name == "mix_inputs").unwrap();
    assert_eq!(
        mix.properties,
        vec![
            ("label".to_string(), Value::from("Mix Inputs")),
            ("blend_type".to_string(), Value::from("MIX")),
        ]
    );
    let outputs = snapshot.nodes.iter().find(|n| n.name == "outputs").unwrap();
    assert_eq!(outputs.defaults, vec![("offset".to_string(), Value::Float(0.5))]);
    assert!(snapshot
        .links
        .contains(&link_snapshot("inputs", "a", "mix_inputs", "a")));
    assert!(snapshot
        .links
        .contains(&link_snapshot("clamp_result", "result", "outputs", "result")));
    assert_eq!(snapshot.links.len(), 6);
}

#[test]
fn dangling_reference_reported_with_node_name() {
    let definition = TemplateDefinition::builder()
        .node("sum", NodeDef::new("ADD").bind("a", link("missing", 0usize)))
        .build()
        .unwrap();
    let kernel = kernel_with("dangling", BindingMode::Exclusive, definition);
    let mut doc = MemoryDocument::new();
    let owner = doc.add_owner("dangling");

    let err = kernel.initialize_owner(&mut doc, owner).unwrap_err();
    match err {
        KernelError::Template(TemplateError::Definition {
            source: DefinitionError::Reference(ReferenceError::UnknownNode { node, referenced_from }),
            ..
        }) => {
            assert_eq!(node, "missing");
            assert_eq!(referenced_from, "sum");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(doc.container_count(), 0);
    assert_eq!(doc.binding(owner).unwrap(), None);
}

#[test]
fn builder_validates_before_touching_container() {
    let definition = TemplateDefinition::builder()
        .output("result", OutputDef::new("FLOAT", link("ghost", 0usize)))
        .build()
        .unwrap();
    let mut doc = MemoryDocument::new();
    let builder = GraphBuilder::default();
    let existing = builder
        .instantiate(&mut doc, &"double".into(), &double_definition(2.0))
        .unwrap();

    let err = builder
        .materialize(&mut doc, existing.container, &definition)
        .unwrap_err();
    assert!(matches!(
        err,
        BuildError::Definition(DefinitionError::Reference(ReferenceError::UnknownNode { .. }))
    ));
    assert_eq!(doc.node_count(existing.container).unwrap(), 3);
}

#[test]
fn failed_rebuild_rolls_back_to_empty_container() {
    let broken = TemplateDefinition::builder()
        .input("value", SocketDef::new("FLOAT"))
        .node("double", NodeDef::new("MULTIPLY").bind("z", 1.0))
        .build()
        .unwrap();
    let mut doc = MemoryDocument::new();
    let builder = GraphBuilder::from_config(&KernelConfig::default());
    let instance = builder
        .instantiate(&mut doc, &"double".into(), &double_definition(2.0))
        .unwrap();

    assert!(matches!(
        builder.materialize(&mut doc, instance.container, &broken),
        Err(BuildError::Link { .. })
    ));
    assert!(doc.contains_container(instance.container));
    assert_eq!(doc.node_count(instance.container).unwrap(), 0);
    assert_eq!(doc.socket_count(instance.container, SlotDirection::Input).unwrap(), 0);
}

#[test]
fn vector_defaults_reach_the_host() {
    let definition = TemplateDefinition::builder()
        .node("mix", NodeDef::new("MIX").bind("a", Value::Vector(vec![1.0, 0.5, 0.0])))
        .build()
        .unwrap();
    let mut doc = MemoryDocument::new();
    let instance = GraphBuilder::default()
        .instantiate(&mut doc, &TemplateId::new("vec"), &definition)
        .unwrap();
    let snapshot = doc.snapshot(instance.container).unwrap();
    let mix = snapshot.nodes.iter().find(|n| n.name == "mix").unwrap();
    assert_eq!(mix.defaults, vec![("a".to_string(), Value::Vector(vec![1.0, 0.5, 0.0]))]);
}

#[test]
fn custom_node_types_need_a_catalog_entry() {
    let definition = TemplateDefinition::builder()
        .input("base", SocketDef::new("FLOAT"))
        .node(
            "square",
            NodeDef::new("POWER")
                .bind("base", link("inputs", "base"))
                .bind("exponent", 2.0),
        )
        .output("result", OutputDef::new("FLOAT", link("square", "result")))
        .build()
        .unwrap();
    let builder = GraphBuilder::default();

    let mut plain = MemoryDocument::new();
    let err = builder
        .instantiate(&mut plain, &"square".into(), &definition)
        .unwrap_err();
    assert_eq!(err, BuildError::Host(HostError::UnknownNodeType("POWER".into())));
    assert_eq!(plain.container_count(), 0, "failed instance rolled back");

    let mut catalog = NodeTypeCatalog::with_defaults();
    catalog.register(
        "POWER",
        NodeTypeInfo::new()
            .input("base", 0.0)
            .input("exponent", 1.0)
            .output("result"),
    );
    let mut doc = MemoryDocument::with_catalog(catalog);
    let instance = builder.instantiate(&mut doc, &"square".into(), &definition).unwrap();
    let snapshot = doc.snapshot(instance.container).unwrap();
    let square = snapshot.nodes.iter().find(|n| n.name == "square").unwrap();
    assert_eq!(square.defaults, vec![("exponent".to_string(), Value::Float(2.0))]);
    assert!(snapshot
        .links
        .contains(&link_snapshot("square", "result", "outputs", "result")));
}

proptest! {
    #[test]
    fn materialize_twice_is_structurally_identical(factor in -1.0e6f64..1.0e6, offset in -10.0f64..10.0) {
        let mut doc = MemoryDocument::new();
        let builder = GraphBuilder::default();
        for definition in [double_definition(factor), blend_definition(offset)] {
            let first = builder.instantiate(&mut doc, &"t".into(), &definition).unwrap();
            let second = builder.instantiate(&mut doc, &"t".into(), &definition).unwrap();
            prop_assert_ne!(first.container, second.container);
            prop_assert_eq!(
                doc.snapshot(first.container).unwrap(),
                doc.snapshot(second.container).unwrap()
            );
        }
    }

    #[test]
    fn rebuild_in_place_matches_fresh_build(factor in -100.0f64..100.0) {
        let mut doc = MemoryDocument::new();
        let builder = GraphBuilder::default();
        let instance = builder.instantiate(&mut doc, &"t".into(), &blend_definition(1.0)).unwrap();
        builder.materialize(&mut doc, instance.container, &double_definition(factor)).unwrap();
        let fresh = builder.instantiate(&mut doc, &"t".into(), &double_definition(factor)).unwrap();
        prop_assert_eq!(
            doc.snapshot(instance.container).unwrap(),
            doc.snapshot(fresh.container).unwrap()
        );
    }
}
