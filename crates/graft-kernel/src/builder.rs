//! Graph builder
//!
//! Turns a [`TemplateDefinition`] into host primitives. The order is fixed
//! because later steps find earlier primitives by name:
//!
//! 1. clear the target container
//! 2. input sockets in declaration order, then the `inputs` pseudo-node
//! 3. internal nodes in declaration order, each with its attributes and
//!    input bindings (literal defaults or links from already created nodes)
//! 4. output sockets in declaration order, the `outputs` pseudo-node, then
//!    the output bindings

use crate::config::KernelConfig;
use crate::error::BuildError;
use graft_host::{
    ContainerId, HostDocument, NodeHandle, PropertyTarget, SlotDirection, SocketHandle,
    GROUP_INPUT_TYPE, GROUP_OUTPUT_TYPE,
};
use graft_template::{
    Attrs, Binding, SlotRef, TemplateDefinition, TemplateId, Value, INPUTS_NODE, OUTPUTS_NODE,
};
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Handles of a materialized template instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphInstance {
    pub container: ContainerId,
    /// Created nodes by name, pseudo-nodes included
    pub nodes: IndexMap<String, NodeHandle>,
    pub inputs: Vec<SocketHandle>,
    pub outputs: Vec<SocketHandle>,
}

impl GraphInstance {
    fn new(container: ContainerId) -> Self {
        Self {
            container,
            nodes: IndexMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Handle of a node by definition name
    pub fn node(&self, name: &str) -> Option<NodeHandle> {
        self.nodes.get(name).copied()
    }
}

/// Display label of a node: `_`-separated words, capitalized
pub fn node_label(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Materializes definitions into host containers
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    container_prefix: String,
    label_nodes: bool,
    rollback_on_error: bool,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::from_config(&KernelConfig::default())
    }
}

impl GraphBuilder {
    pub fn from_config(config: &KernelConfig) -> Self {
        Self {
            container_prefix: config.container_prefix.clone(),
            label_nodes: config.label_nodes,
            rollback_on_error: config.rollback_on_error,
        }
    }

    /// Canonical container name of a template's instance
    pub fn container_name(&self, template: &TemplateId) -> String {
        format!("{}{}", self.container_prefix, template)
    }

    /// Create a container for `template` and materialize into it
    ///
    /// With rollback enabled a failed build removes the new container.
    ///
    /// # Errors
    /// As [`GraphBuilder::materialize`], plus host errors creating the container
    pub fn instantiate(
        &self,
        doc: &mut dyn HostDocument,
        template: &TemplateId,
        definition: &TemplateDefinition,
    ) -> Result<GraphInstance, BuildError> {
        let container = doc.create_container(&self.container_name(template), definition.tree_type())?;
        let result = self.materialize(doc, container, definition);
        if result.is_err() && self.rollback_on_error {
            if let Err(e) = doc.remove_container(container) {
                warn!(%container, error = %e, "failed to remove container after build failure");
            }
        }
        result
    }

    /// Clear `container` and rebuild `definition` into it
    ///
    /// # Errors
    /// - [`BuildError::Definition`] if the definition has dangling references
    /// - [`BuildError::Link`] if a slot cannot be resolved on the host
    /// - [`BuildError::Host`] if a host primitive fails
    pub fn materialize(
        &self,
        doc: &mut dyn HostDocument,
        container: ContainerId,
        definition: &TemplateDefinition,
    ) -> Result<GraphInstance, BuildError> {
        definition.validate()?;
        doc.clear_container(container)?;

        match self.build(doc, container, definition) {
            Ok(instance) => {
                debug!(
                    %container,
                    nodes = instance.nodes.len(),
                    inputs = instance.inputs.len(),
                    outputs = instance.outputs.len(),
                    "materialized template"
                );
                Ok(instance)
            }
            Err(e) => {
                warn!(%container, error = %e, rollback = self.rollback_on_error, "build failed");
                if self.rollback_on_error {
                    if let Err(clear) = doc.clear_container(container) {
                        warn!(%container, error = %clear, "failed to clear container after build failure");
                    }
                }
                Err(e)
            }
        }
    }

    fn build(
        &self,
        doc: &mut dyn HostDocument,
        container: ContainerId,
        definition: &TemplateDefinition,
    ) -> Result<GraphInstance, BuildError> {
        let mut instance = GraphInstance::new(container);

        for (name, socket) in definition.inputs() {
            let handle = doc.new_socket(container, name, SlotDirection::Input, &socket.socket_type)?;
            apply_attrs(doc, container, PropertyTarget::Socket(handle), &socket.attrs)?;
            instance.inputs.push(handle);
        }
        let inputs_node = doc.add_node(container, GROUP_INPUT_TYPE, INPUTS_NODE)?;
        instance.nodes.insert(INPUTS_NODE.to_string(), inputs_node);

        for (name, node) in definition.nodes() {
            let handle = doc.add_node(container, &node.node_type, name)?;
            if self.label_nodes {
                doc.set_property(
                    container,
                    PropertyTarget::Node(handle),
                    "label",
                    &Value::Text(node_label(name)),
                )?;
            }
            apply_attrs(doc, container, PropertyTarget::Node(handle), &node.attrs)?;
            instance.nodes.insert(name.clone(), handle);

            for input in &node.inputs {
                bind_slot(doc, &instance, handle, name, &input.slot, &input.binding)?;
            }
        }

        for (name, output) in definition.outputs() {
            let handle = doc.new_socket(container, name, SlotDirection::Output, &output.socket_type)?;
            apply_attrs(doc, container, PropertyTarget::Socket(handle), &output.attrs)?;
            instance.outputs.push(handle);
        }
        let outputs_node = doc.add_node(container, GROUP_OUTPUT_TYPE, OUTPUTS_NODE)?;
        instance.nodes.insert(OUTPUTS_NODE.to_string(), outputs_node);

        for (name, output) in definition.outputs() {
            bind_slot(
                doc,
                &instance,
                outputs_node,
                OUTPUTS_NODE,
                &SlotRef::Name(name.clone()),
                &output.value,
            )?;
        }

        Ok(instance)
    }
}

fn apply_attrs(
    doc: &mut dyn HostDocument,
    container: ContainerId,
    target: PropertyTarget,
    attrs: &Attrs,
) -> Result<(), BuildError> {
    for (name, value) in attrs {
        doc.set_property(container, target, name, value)?;
    }
    Ok(())
}

/// Feed one input slot of `target` from a literal or a link
fn bind_slot(
    doc: &mut dyn HostDocument,
    instance: &GraphInstance,
    target: NodeHandle,
    target_name: &str,
    slot: &SlotRef,
    binding: &Binding,
) -> Result<(), BuildError> {
    let container = instance.container;
    let input = doc
        .resolve_slot(container, target, SlotDirection::Input, slot)?
        .ok_or_else(|| BuildError::Link {
            node: target_name.to_string(),
            slot: slot.clone(),
            reason: "input slot does not exist".to_string(),
        })?;

    match binding {
        Binding::Literal(value) => doc.set_input_default(container, target, input, value)?,
        Binding::Link(source) => {
            let from = instance.node(&source.node).ok_or_else(|| BuildError::Link {
                node: target_name.to_string(),
                slot: slot.clone(),
                reason: format!("source node '{}' has not been created", source.node),
            })?;
            let output = doc
                .resolve_slot(container, from, SlotDirection::Output, &source.output)?
                .ok_or_else(|| BuildError::Link {
                    node: target_name.to_string(),
                    slot: slot.clone(),
                    reason: format!("output {} of node '{}' does not exist", source.output, source.node),
                })?;
            doc.link(container, from, output, target, input)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_host::MemoryDocument;
    use graft_template::{link, NodeDef, OutputDef, SocketDef};

    fn double(factor: f64) -> TemplateDefinition {
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

    #[test]
    fn labels() {
        assert_eq!(node_label("double_value"), "Double Value");
        assert_eq!(node_label("mix"), "Mix");
        assert_eq!(node_label("a__b"), "A B");
        assert_eq!(node_label(""), "");
    }

    #[test]
    fn instantiate_names_container() {
        let mut doc = MemoryDocument::new();
        let builder = GraphBuilder::default();
        let instance = builder.instantiate(&mut doc, &"double".into(), &double(2.0)).unwrap();
        assert_eq!(doc.container_name(instance.container).unwrap(), "CUSTOM_NODE_double");
        assert_eq!(instance.inputs.len(), 1);
        assert_eq!(instance.outputs.len(), 1);
        assert_eq!(
            instance.nodes.keys().collect::<Vec<_>>(),
            vec!["inputs", "double", "outputs"]
        );
    }

    #[test]
    fn node_gets_label_property() {
        let mut doc = MemoryDocument::new();
        let instance = GraphBuilder::default()
            .instantiate(&mut doc, &"double".into(), &double(2.0))
            .unwrap();
        let snapshot = doc.snapshot(instance.container).unwrap();
        let node = snapshot.nodes.iter().find(|n| n.name == "double").unwrap();
        assert_eq!(node.properties, vec![("label".to_string(), Value::from("Double"))]);
    }

    #[test]
    fn unlabeled_when_disabled() {
        let mut doc = MemoryDocument::new();
        let builder = GraphBuilder::from_config(&KernelConfig::default().with_label_nodes(false));
        let instance = builder.instantiate(&mut doc, &"double".into(), &double(2.0)).unwrap();
        let snapshot = doc.snapshot(instance.container).unwrap();
        assert!(snapshot.nodes.iter().all(|n| n.properties.is_empty()));
    }

    #[test]
    fn materialize_clears_previous_content() {
        let mut doc = MemoryDocument::new();
        let builder = GraphBuilder::default();
        let instance = builder.instantiate(&mut doc, &"double".into(), &double(2.0)).unwrap();
        builder.materialize(&mut doc, instance.container, &double(3.0)).unwrap();
        assert_eq!(doc.node_count(instance.container).unwrap(), 3);
        assert_eq!(doc.socket_count(instance.container, SlotDirection::Input).unwrap(), 1);
    }

    #[test]
    fn missing_input_slot_is_link_error() {
        let definition = TemplateDefinition::builder()
            .node("m", NodeDef::new("MULTIPLY").bind("c", 1.0))
            .build()
            .unwrap();
        let mut doc = MemoryDocument::new();
        let err = GraphBuilder::default()
            .instantiate(&mut doc, &"bad".into(), &definition)
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::Link {
                node: "m".into(),
                slot: SlotRef::Name("c".into()),
                reason: "input slot does not exist".into(),
            }
        );
    }

    #[test]
    fn forward_reference_is_link_error() {
        let definition = TemplateDefinition::builder()
            .node("first", NodeDef::new("ADD").bind("a", link("second", 0usize)))
            .node("second", NodeDef::new("VALUE"))
            .build()
            .unwrap();
        let mut doc = MemoryDocument::new();
        let err = GraphBuilder::default()
            .instantiate(&mut doc, &"fwd".into(), &definition)
            .unwrap_err();
        assert!(matches!(err, BuildError::Link { ref node, .. } if node == "first"));
    }

    #[test]
    fn rollback_removes_instantiated_container() {
        let definition = TemplateDefinition::builder()
            .node("m", NodeDef::new("MULTIPLY").bind(7usize, 1.0))
            .build()
            .unwrap();
        let mut doc = MemoryDocument::new();
        assert!(GraphBuilder::default()
            .instantiate(&mut doc, &"bad".into(), &definition)
            .is_err());
        assert_eq!(doc.container_count(), 0);
    }

    #[test]
    fn leave_partial_without_rollback() {
        let definition = TemplateDefinition::builder()
            .node("v", NodeDef::new("VALUE"))
            .node("m", NodeDef::new("MULTIPLY").bind("a", link("v", 4usize)))
            .build()
            .unwrap();
        let mut doc = MemoryDocument::new();
        let c = doc.create_container("target", "NodeTree").unwrap();
        let builder = GraphBuilder::from_config(&KernelConfig::default().with_rollback_on_error(false));
        assert!(matches!(
            builder.materialize(&mut doc, c, &definition),
            Err(BuildError::Link { .. })
        ));
        // inputs pseudo-node, v and m were created before the failure
        assert_eq!(doc.node_count(c).unwrap(), 3);

        let builder = GraphBuilder::default();
        assert!(builder.materialize(&mut doc, c, &definition).is_err());
        assert_eq!(doc.node_count(c).unwrap(), 0);
    }
}
