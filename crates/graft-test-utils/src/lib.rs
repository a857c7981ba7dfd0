//! Testing utilities for the graft workspace
//!
//! Shared template fixtures and document setup helpers.

#![allow(missing_docs)]

use graft_host::{MemoryDocument, OwnerId};
use graft_kernel::{KernelConfig, TemplateKernel};
use graft_template::{
    link, BindingMode, NodeDef, OutputDef, SocketDef, Template, TemplateDefinition, TemplateId,
    INPUTS_NODE,
};

/// `result = value * factor`
pub fn double_definition(factor: f64) -> TemplateDefinition {
    TemplateDefinition::builder()
        .input("value", SocketDef::new("FLOAT"))
        .node(
            "double",
            NodeDef::new("MULTIPLY")
                .bind("a", link(INPUTS_NODE, "value"))
                .bind("b", factor),
        )
        .output("result", OutputDef::new("FLOAT", link("double", 0usize)))
        .build()
        .unwrap()
}

/// `result = clamp(mix(a, b, factor) + offset)` with labeled, attributed nodes
pub fn blend_definition(offset: f64) -> TemplateDefinition {
    TemplateDefinition::builder()
        .input("a", SocketDef::new("FLOAT").attr("default_value", 0.0))
        .input("b", SocketDef::new("FLOAT").attr("default_value", 1.0))
        .input("factor", SocketDef::new("FLOAT").attr("min_value", 0.0).attr("max_value", 1.0))
        .node(
            "mix_inputs",
            NodeDef::new("MIX")
                .attr("blend_type", "MIX")
                .bind("factor", link(INPUTS_NODE, "factor"))
                .bind("a", link(INPUTS_NODE, 0usize))
                .bind("b", link(INPUTS_NODE, "b")),
        )
        .node(
            "add_offset",
            NodeDef::new("ADD")
                .bind("a", link("mix_inputs", "result"))
                .bind("b", offset),
        )
        .node(
            "clamp_result",
            NodeDef::new("CLAMP").bind("value", link("add_offset", 0usize)),
        )
        .output("result", OutputDef::new("FLOAT", link("clamp_result", 0usize)))
        .output("offset", OutputDef::new("FLOAT", offset))
        .build()
        .unwrap()
}

pub struct DoubleValue;

impl Template for DoubleValue {
    const ID: &'static str = "double_value";

    fn definition() -> TemplateDefinition {
        double_definition(2.0)
    }
}

pub struct SharedDouble;

impl Template for SharedDouble {
    const ID: &'static str = "shared_double";
    const MODE: BindingMode = BindingMode::Shared;

    fn definition() -> TemplateDefinition {
        double_definition(2.0)
    }
}

/// Kernel with `definition` registered under `id`
pub fn kernel_with(id: &str, mode: BindingMode, definition: TemplateDefinition) -> TemplateKernel {
    kernel_with_config(KernelConfig::default(), id, mode, definition)
}

pub fn kernel_with_config(
    config: KernelConfig,
    id: &str,
    mode: BindingMode,
    definition: TemplateDefinition,
) -> TemplateKernel {
    let kernel = TemplateKernel::with_config(config);
    kernel
        .registry()
        .register_definition(TemplateId::new(id), mode, definition);
    kernel
}

/// Add `count` owners of `template` and initialize each
pub fn bound_owners(
    kernel: &TemplateKernel,
    doc: &mut MemoryDocument,
    template: &str,
    count: usize,
) -> Vec<OwnerId> {
    (0..count)
        .map(|_| {
            let owner = doc.add_owner(template);
            kernel.initialize_owner(doc, owner).unwrap();
            owner
        })
        .collect()
}

/// Simulate a restart after an upgrade: a fresh kernel with the new definition
pub fn upgraded_kernel(
    previous: &TemplateKernel,
    id: &str,
    mode: BindingMode,
    definition: TemplateDefinition,
) -> TemplateKernel {
    previous.shutdown();
    kernel_with_config(previous.config().clone(), id, mode, definition)
}
