//! In-memory host document
//!
//! [`MemoryDocument`] implements [`HostDocument`] with plain data: each
//! container keeps its nodes and links in a `petgraph` stable graph, and a
//! [`NodeTypeCatalog`] declares which slots every node type exposes. It backs
//! the test suite and the command-line tool.

use crate::document::{HostDocument, GROUP_INPUT_TYPE, GROUP_OUTPUT_TYPE};
use crate::error::HostError;
use crate::types::{
    BindingRecord, ContainerId, NodeHandle, OwnerId, PropertyInfo, PropertyTarget, SlotDirection,
    SocketHandle,
};
use graft_template::{SlotRef, TemplateId, Value};
use indexmap::IndexMap;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Marker carried by owners of template instances
pub const TEMPLATE_OWNER_MARKER: &str = "graft.template_owner";

/// Properties that cannot be assigned through [`HostDocument::set_property`]
const READ_ONLY_PROPERTIES: &[&str] = &["type", "bl_idname"];

/// An input slot declared by a node type
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSpec {
    pub name: String,
    pub default: Value,
}

impl SlotSpec {
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
        }
    }
}

/// Slots of one node type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeTypeInfo {
    pub inputs: Vec<SlotSpec>,
    pub outputs: Vec<String>,
}

impl NodeTypeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn input(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.inputs.push(SlotSpec::new(name, default));
        self
    }

    #[must_use]
    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }
}

/// Node types known to a [`MemoryDocument`]
#[derive(Debug, Clone, Default)]
pub struct NodeTypeCatalog {
    types: HashMap<String, NodeTypeInfo>,
}

impl NodeTypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with a small set of arithmetic node types
    ///
    /// `VALUE`, `ADD`, `SUBTRACT`, `MULTIPLY`, `DIVIDE`, `MIX` and `CLAMP`.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.register("VALUE", NodeTypeInfo::new().output("value"));
        for binary in ["ADD", "SUBTRACT", "MULTIPLY", "DIVIDE"] {
            catalog.register(
                binary,
                NodeTypeInfo::new()
                    .input("a", 0.0)
                    .input("b", 0.0)
                    .output("result"),
            );
        }
        catalog.register(
            "MIX",
            NodeTypeInfo::new()
                .input("factor", 0.5)
                .input("a", 0.0)
                .input("b", 0.0)
                .output("result"),
        );
        catalog.register(
            "CLAMP",
            NodeTypeInfo::new()
                .input("value", 0.0)
                .input("min", 0.0)
                .input("max", 1.0)
                .output("result"),
        );
        catalog
    }

    pub fn register(&mut self, node_type: impl Into<String>, info: NodeTypeInfo) {
        self.types.insert(node_type.into(), info);
    }

    pub fn get(&self, node_type: &str) -> Option<&NodeTypeInfo> {
        self.types.get(node_type)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        node_type == GROUP_INPUT_TYPE
            || node_type == GROUP_OUTPUT_TYPE
            || self.types.contains_key(node_type)
    }
}

#[derive(Debug, Clone)]
struct MemoryNode {
    name: String,
    node_type: String,
    properties: IndexMap<String, Value>,
    defaults: BTreeMap<usize, Value>,
}

#[derive(Debug, Clone, Copy)]
struct MemoryLink {
    output: usize,
    input: usize,
}

#[derive(Debug, Clone)]
struct MemorySocket {
    handle: u64,
    name: String,
    direction: SlotDirection,
    socket_type: String,
    properties: IndexMap<String, Value>,
}

#[derive(Debug, Clone)]
struct MemoryContainer {
    name: String,
    tree_type: String,
    interface: Vec<MemorySocket>,
    graph: StableDiGraph<MemoryNode, MemoryLink>,
    next_socket: u64,
    pinned: usize,
}

impl MemoryContainer {
    fn new(name: String, tree_type: String) -> Self {
        Self {
            name,
            tree_type,
            interface: Vec::new(),
            graph: StableDiGraph::new(),
            next_socket: 0,
            pinned: 0,
        }
    }

    fn interface_names(&self, direction: SlotDirection) -> Vec<String> {
        self.interface
            .iter()
            .filter(|s| s.direction == direction)
            .map(|s| s.name.clone())
            .collect()
    }

    fn slot_names(&self, catalog: &NodeTypeCatalog, node: &MemoryNode, direction: SlotDirection) -> Vec<String> {
        match (node.node_type.as_str(), direction) {
            (GROUP_INPUT_TYPE, SlotDirection::Output) => self.interface_names(SlotDirection::Input),
            (GROUP_OUTPUT_TYPE, SlotDirection::Input) => self.interface_names(SlotDirection::Output),
            (GROUP_INPUT_TYPE | GROUP_OUTPUT_TYPE, _) => Vec::new(),
            (node_type, SlotDirection::Input) => catalog
                .get(node_type)
                .map(|info| info.inputs.iter().map(|s| s.name.clone()).collect())
                .unwrap_or_default(),
            (node_type, SlotDirection::Output) => catalog
                .get(node_type)
                .map(|info| info.outputs.clone())
                .unwrap_or_default(),
        }
    }

    fn slot_name(&self, catalog: &NodeTypeCatalog, index: NodeIndex, direction: SlotDirection, slot: usize) -> String {
        self.slot_names(catalog, &self.graph[index], direction)
            .get(slot)
            .cloned()
            .unwrap_or_else(|| slot.to_string())
    }
}

#[derive(Debug, Clone)]
struct MemoryOwner {
    template: TemplateId,
    markers: Vec<String>,
    binding: Option<BindingRecord>,
    properties: Vec<PropertyInfo>,
}

/// Structural view of an interface socket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocketSnapshot {
    pub name: String,
    pub socket_type: String,
    pub properties: Vec<(String, Value)>,
}

/// Structural view of a node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub node_type: String,
    pub properties: Vec<(String, Value)>,
    /// Default values that differ from the node type's own defaults, by slot name
    pub defaults: Vec<(String, Value)>,
}

/// Structural view of a link, by node and slot names
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LinkSnapshot {
    pub from_node: String,
    pub from_slot: String,
    pub to_node: String,
    pub to_slot: String,
}

/// Identifier-free structural view of a container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerSnapshot {
    pub tree_type: String,
    pub inputs: Vec<SocketSnapshot>,
    pub outputs: Vec<SocketSnapshot>,
    pub nodes: Vec<NodeSnapshot>,
    pub links: Vec<LinkSnapshot>,
}

/// In-memory [`HostDocument`]
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    catalog: NodeTypeCatalog,
    containers: IndexMap<ContainerId, MemoryContainer>,
    owners: IndexMap<OwnerId, MemoryOwner>,
}

impl MemoryDocument {
    /// Empty document using [`NodeTypeCatalog::with_defaults`]
    pub fn new() -> Self {
        Self::with_catalog(NodeTypeCatalog::with_defaults())
    }

    pub fn with_catalog(catalog: NodeTypeCatalog) -> Self {
        Self {
            catalog,
            containers: IndexMap::new(),
            owners: IndexMap::new(),
        }
    }

    /// Add an owner carrying [`TEMPLATE_OWNER_MARKER`]
    pub fn add_owner(&mut self, template: impl Into<TemplateId>) -> OwnerId {
        self.add_owner_with_marker(template, TEMPLATE_OWNER_MARKER)
    }

    pub fn add_owner_with_marker(&mut self, template: impl Into<TemplateId>, marker: &str) -> OwnerId {
        let owner = OwnerId::new();
        self.owners.insert(
            owner,
            MemoryOwner {
                template: template.into(),
                markers: vec![marker.to_string()],
                binding: None,
                properties: Vec::new(),
            },
        );
        owner
    }

    /// Delete an owner entity, returning its last binding
    pub fn remove_owner(&mut self, owner: OwnerId) -> Result<Option<BindingRecord>, HostError> {
        self.owners
            .shift_remove(&owner)
            .map(|o| o.binding)
            .ok_or(HostError::UnknownOwner(owner))
    }

    pub fn set_owner_properties(&mut self, owner: OwnerId, properties: Vec<PropertyInfo>) -> Result<(), HostError> {
        self.owner_mut(owner)?.properties = properties;
        Ok(())
    }

    /// Register an external alias of a container
    pub fn pin_container(&mut self, container: ContainerId) -> Result<(), HostError> {
        self.container_mut(container)?.pinned += 1;
        Ok(())
    }

    pub fn unpin_container(&mut self, container: ContainerId) -> Result<(), HostError> {
        let c = self.container_mut(container)?;
        c.pinned = c.pinned.saturating_sub(1);
        Ok(())
    }

    pub fn container_name(&self, container: ContainerId) -> Result<&str, HostError> {
        Ok(&self.container(container)?.name)
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn node_count(&self, container: ContainerId) -> Result<usize, HostError> {
        Ok(self.container(container)?.graph.node_count())
    }

    pub fn link_count(&self, container: ContainerId) -> Result<usize, HostError> {
        Ok(self.container(container)?.graph.edge_count())
    }

    pub fn socket_count(&self, container: ContainerId, direction: SlotDirection) -> Result<usize, HostError> {
        Ok(self
            .container(container)?
            .interface
            .iter()
            .filter(|s| s.direction == direction)
            .count())
    }

    /// Identifier-free structural view of a container
    pub fn snapshot(&self, container: ContainerId) -> Result<ContainerSnapshot, HostError> {
        let c = self.container(container)?;
        let socket = |s: &MemorySocket| SocketSnapshot {
            name: s.name.clone(),
            socket_type: s.socket_type.clone(),
            properties: s.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        };

        let nodes = c
            .graph
            .node_indices()
            .map(|index| {
                let node = &c.graph[index];
                let type_defaults: Vec<Value> = self
                    .catalog
                    .get(&node.node_type)
                    .map(|info| info.inputs.iter().map(|s| s.default.clone()).collect())
                    .unwrap_or_default();
                let defaults = node
                    .defaults
                    .iter()
                    .filter(|(slot, value)| type_defaults.get(**slot) != Some(*value))
                    .map(|(slot, value)| {
                        (c.slot_name(&self.catalog, index, SlotDirection::Input, *slot), value.clone())
                    })
                    .collect();
                NodeSnapshot {
                    name: node.name.clone(),
                    node_type: node.node_type.clone(),
                    properties: node.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                    defaults,
                }
            })
            .collect();

        let mut links: Vec<LinkSnapshot> = c
            .graph
            .edge_references()
            .map(|edge| LinkSnapshot {
                from_node: c.graph[edge.source()].name.clone(),
                from_slot: c.slot_name(&self.catalog, edge.source(), SlotDirection::Output, edge.weight().output),
                to_node: c.graph[edge.target()].name.clone(),
                to_slot: c.slot_name(&self.catalog, edge.target(), SlotDirection::Input, edge.weight().input),
            })
            .collect();
        links.sort();

        Ok(ContainerSnapshot {
            tree_type: c.tree_type.clone(),
            inputs: c
                .interface
                .iter()
                .filter(|s| s.direction == SlotDirection::Input)
                .map(socket)
                .collect(),
            outputs: c
                .interface
                .iter()
                .filter(|s| s.direction == SlotDirection::Output)
                .map(socket)
                .collect(),
            nodes,
            links,
        })
    }

    fn container(&self, container: ContainerId) -> Result<&MemoryContainer, HostError> {
        self.containers
            .get(&container)
            .ok_or(HostError::UnknownContainer(container))
    }

    fn container_mut(&mut self, container: ContainerId) -> Result<&mut MemoryContainer, HostError> {
        self.containers
            .get_mut(&container)
            .ok_or(HostError::UnknownContainer(container))
    }

    fn owner(&self, owner: OwnerId) -> Result<&MemoryOwner, HostError> {
        self.owners.get(&owner).ok_or(HostError::UnknownOwner(owner))
    }

    fn owner_mut(&mut self, owner: OwnerId) -> Result<&mut MemoryOwner, HostError> {
        self.owners.get_mut(&owner).ok_or(HostError::UnknownOwner(owner))
    }

    fn unique_name(&self, base: &str) -> String {
        let taken = |name: &str| self.containers.values().any(|c| c.name == name);
        if !taken(base) {
            return base.to_string();
        }
        (1u32..)
            .map(|n| format!("{base}.{n:03}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

fn node_index(c: &MemoryContainer, container: ContainerId, node: NodeHandle) -> Result<NodeIndex, HostError> {
    let index = usize::try_from(node.0)
        .map(NodeIndex::new)
        .map_err(|_| HostError::UnknownNode { container, node })?;
    if c.graph.contains_node(index) {
        Ok(index)
    } else {
        Err(HostError::UnknownNode { container, node })
    }
}

impl HostDocument for MemoryDocument {
    fn create_container(&mut self, name: &str, tree_type: &str) -> Result<ContainerId, HostError> {
        let id = ContainerId::new();
        let name = self.unique_name(name);
        self.containers
            .insert(id, MemoryContainer::new(name, tree_type.to_string()));
        Ok(id)
    }

    fn find_container(&self, name: &str) -> Option<ContainerId> {
        self.containers
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(id, _)| *id)
    }

    fn contains_container(&self, container: ContainerId) -> bool {
        self.containers.contains_key(&container)
    }

    fn remove_container(&mut self, container: ContainerId) -> Result<(), HostError> {
        self.containers
            .shift_remove(&container)
            .map(|_| ())
            .ok_or(HostError::UnknownContainer(container))
    }

    fn clear_container(&mut self, container: ContainerId) -> Result<(), HostError> {
        let c = self.container_mut(container)?;
        c.graph.clear();
        c.interface.clear();
        Ok(())
    }

    fn copy_container(&mut self, container: ContainerId) -> Result<ContainerId, HostError> {
        let mut copy = self.container(container)?.clone();
        copy.name = self.unique_name(&copy.name);
        copy.pinned = 0;
        let id = ContainerId::new();
        self.containers.insert(id, copy);
        Ok(id)
    }

    fn container_users(&self, container: ContainerId) -> Result<usize, HostError> {
        let pinned = self.container(container)?.pinned;
        let bound = self
            .owners
            .values()
            .filter(|o| o.binding.as_ref().is_some_and(|b| b.container == container))
            .count();
        Ok(bound + pinned)
    }

    fn add_node(&mut self, container: ContainerId, node_type: &str, name: &str) -> Result<NodeHandle, HostError> {
        if !self.catalog.contains(node_type) {
            return Err(HostError::UnknownNodeType(node_type.to_string()));
        }
        let defaults = self
            .catalog
            .get(node_type)
            .map(|info| {
                info.inputs
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (i, s.default.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let c = self.container_mut(container)?;
        let index = c.graph.add_node(MemoryNode {
            name: name.to_string(),
            node_type: node_type.to_string(),
            properties: IndexMap::new(),
            defaults,
        });
        Ok(NodeHandle(index.index() as u64))
    }

    fn new_socket(
        &mut self,
        container: ContainerId,
        name: &str,
        direction: SlotDirection,
        socket_type: &str,
    ) -> Result<SocketHandle, HostError> {
        let c = self.container_mut(container)?;
        let handle = c.next_socket;
        c.next_socket += 1;
        c.interface.push(MemorySocket {
            handle,
            name: name.to_string(),
            direction,
            socket_type: socket_type.to_string(),
            properties: IndexMap::new(),
        });
        Ok(SocketHandle(handle))
    }

    fn set_property(
        &mut self,
        container: ContainerId,
        target: PropertyTarget,
        name: &str,
        value: &Value,
    ) -> Result<(), HostError> {
        if READ_ONLY_PROPERTIES.contains(&name) {
            return Err(HostError::ReadOnlyProperty(name.to_string()));
        }
        let c = self.container_mut(container)?;
        let properties = match target {
            PropertyTarget::Node(node) => {
                let index = node_index(c, container, node)?;
                &mut c.graph[index].properties
            }
            PropertyTarget::Socket(socket) => {
                &mut c
                    .interface
                    .iter_mut()
                    .find(|s| s.handle == socket.0)
                    .ok_or(HostError::UnknownSocket(socket.0))?
                    .properties
            }
        };
        properties.insert(name.to_string(), value.clone());
        Ok(())
    }

    fn resolve_slot(
        &self,
        container: ContainerId,
        node: NodeHandle,
        direction: SlotDirection,
        slot: &SlotRef,
    ) -> Result<Option<usize>, HostError> {
        let c = self.container(container)?;
        let index = node_index(c, container, node)?;
        let names = c.slot_names(&self.catalog, &c.graph[index], direction);
        Ok(match slot {
            SlotRef::Name(name) => names.iter().position(|n| n == name),
            SlotRef::Index(i) => (*i < names.len()).then_some(*i),
        })
    }

    fn set_input_default(
        &mut self,
        container: ContainerId,
        node: NodeHandle,
        input: usize,
        value: &Value,
    ) -> Result<(), HostError> {
        let c = self.container(container)?;
        let index = node_index(c, container, node)?;
        let len = c.slot_names(&self.catalog, &c.graph[index], SlotDirection::Input).len();
        if input >= len {
            return Err(HostError::SlotOutOfRange {
                node,
                direction: SlotDirection::Input,
                index: input,
                len,
            });
        }
        self.container_mut(container)?.graph[index]
            .defaults
            .insert(input, value.clone());
        Ok(())
    }

    fn link(
        &mut self,
        container: ContainerId,
        from: NodeHandle,
        output: usize,
        to: NodeHandle,
        input: usize,
    ) -> Result<(), HostError> {
        let c = self.container(container)?;
        let from_index = node_index(c, container, from)?;
        let to_index = node_index(c, container, to)?;
        for (node, direction, slot) in [(from, SlotDirection::Output, output), (to, SlotDirection::Input, input)] {
            let index = if node == from { from_index } else { to_index };
            let len = c.slot_names(&self.catalog, &c.graph[index], direction).len();
            if slot >= len {
                return Err(HostError::SlotOutOfRange {
                    node,
                    direction,
                    index: slot,
                    len,
                });
            }
        }

        let c = self.container_mut(container)?;
        let replaced: Vec<_> = c
            .graph
            .edges_directed(to_index, Direction::Incoming)
            .filter(|edge| edge.weight().input == input)
            .map(|edge| edge.id())
            .collect();
        for edge in replaced {
            c.graph.remove_edge(edge);
        }
        c.graph.add_edge(from_index, to_index, MemoryLink { output, input });
        Ok(())
    }

    fn owners(&self, marker: &str) -> Vec<OwnerId> {
        self.owners
            .iter()
            .filter(|(_, o)| o.markers.iter().any(|m| m == marker))
            .map(|(id, _)| *id)
            .collect()
    }

    fn owner_template(&self, owner: OwnerId) -> Result<TemplateId, HostError> {
        Ok(self.owner(owner)?.template.clone())
    }

    fn binding(&self, owner: OwnerId) -> Result<Option<BindingRecord>, HostError> {
        Ok(self.owner(owner)?.binding.clone())
    }

    fn set_binding(&mut self, owner: OwnerId, record: Option<BindingRecord>) -> Result<(), HostError> {
        self.owner_mut(owner)?.binding = record;
        Ok(())
    }

    fn owner_properties(&self, owner: OwnerId) -> Result<Vec<PropertyInfo>, HostError> {
        Ok(self.owner(owner)?.properties.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_template::{BindingMode, Fingerprint};
    use pretty_assertions::assert_eq;

    fn container(doc: &mut MemoryDocument) -> ContainerId {
        doc.create_container("tree", "NodeTree").unwrap()
    }

    #[test]
    fn container_names_are_uniquified() {
        let mut doc = MemoryDocument::new();
        let a = doc.create_container("tree", "NodeTree").unwrap();
        let b = doc.create_container("tree", "NodeTree").unwrap();
        assert_eq!(doc.container_name(a).unwrap(), "tree");
        assert_eq!(doc.container_name(b).unwrap(), "tree.001");
        assert_eq!(doc.find_container("tree.001"), Some(b));
    }

    #[test]
    fn unknown_node_type_rejected() {
        let mut doc = MemoryDocument::new();
        let c = container(&mut doc);
        assert_eq!(
            doc.add_node(c, "TELEPORT", "t"),
            Err(HostError::UnknownNodeType("TELEPORT".into()))
        );
    }

    #[test]
    fn resolve_catalog_slots() {
        let mut doc = MemoryDocument::new();
        let c = container(&mut doc);
        let n = doc.add_node(c, "MULTIPLY", "m").unwrap();
        assert_eq!(doc.resolve_slot(c, n, SlotDirection::Input, &"b".into()).unwrap(), Some(1));
        assert_eq!(doc.resolve_slot(c, n, SlotDirection::Input, &SlotRef::Index(2)).unwrap(), None);
        assert_eq!(doc.resolve_slot(c, n, SlotDirection::Output, &SlotRef::Index(0)).unwrap(), Some(0));
        assert_eq!(doc.resolve_slot(c, n, SlotDirection::Output, &"nope".into()).unwrap(), None);
    }

    #[test]
    fn group_nodes_follow_interface() {
        let mut doc = MemoryDocument::new();
        let c = container(&mut doc);
        let input = doc.add_node(c, GROUP_INPUT_TYPE, "inputs").unwrap();
        let output = doc.add_node(c, GROUP_OUTPUT_TYPE, "outputs").unwrap();
        assert_eq!(doc.resolve_slot(c, input, SlotDirection::Output, &"x".into()).unwrap(), None);

        doc.new_socket(c, "x", SlotDirection::Input, "FLOAT").unwrap();
        doc.new_socket(c, "y", SlotDirection::Output, "FLOAT").unwrap();
        assert_eq!(doc.resolve_slot(c, input, SlotDirection::Output, &"x".into()).unwrap(), Some(0));
        assert_eq!(doc.resolve_slot(c, output, SlotDirection::Input, &"y".into()).unwrap(), Some(0));
        assert_eq!(doc.resolve_slot(c, output, SlotDirection::Input, &"x".into()).unwrap(), None);
    }

    #[test]
    fn link_replaces_existing_input_link() {
        let mut doc = MemoryDocument::new();
        let c = container(&mut doc);
        let v1 = doc.add_node(c, "VALUE", "v1").unwrap();
        let v2 = doc.add_node(c, "VALUE", "v2").unwrap();
        let add = doc.add_node(c, "ADD", "add").unwrap();
        doc.link(c, v1, 0, add, 0).unwrap();
        doc.link(c, v2, 0, add, 0).unwrap();
        doc.link(c, v2, 0, add, 1).unwrap();
        assert_eq!(doc.link_count(c).unwrap(), 2);

        let snapshot = doc.snapshot(c).unwrap();
        assert_eq!(
            snapshot.links,
            vec![
                LinkSnapshot {
                    from_node: "v2".into(),
                    from_slot: "value".into(),
                    to_node: "add".into(),
                    to_slot: "a".into(),
                },
                LinkSnapshot {
                    from_node: "v2".into(),
                    from_slot: "value".into(),
                    to_node: "add".into(),
                    to_slot: "b".into(),
                },
            ]
        );
    }

    #[test]
    fn link_out_of_range() {
        let mut doc = MemoryDocument::new();
        let c = container(&mut doc);
        let v = doc.add_node(c, "VALUE", "v").unwrap();
        let add = doc.add_node(c, "ADD", "add").unwrap();
        assert!(matches!(
            doc.link(c, v, 3, add, 0),
            Err(HostError::SlotOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn defaults_and_properties_in_snapshot() {
        let mut doc = MemoryDocument::new();
        let c = container(&mut doc);
        let m = doc.add_node(c, "MULTIPLY", "m").unwrap();
        doc.set_input_default(c, m, 1, &Value::Float(2.0)).unwrap();
        doc.set_property(c, PropertyTarget::Node(m), "label", &Value::from("M")).unwrap();
        assert!(matches!(
            doc.set_input_default(c, m, 5, &Value::Float(1.0)),
            Err(HostError::SlotOutOfRange { .. })
        ));
        assert_eq!(
            doc.set_property(c, PropertyTarget::Node(m), "type", &Value::from("X")),
            Err(HostError::ReadOnlyProperty("type".into()))
        );

        let node = &doc.snapshot(c).unwrap().nodes[0];
        assert_eq!(node.defaults, vec![("b".to_string(), Value::Float(2.0))]);
        assert_eq!(node.properties, vec![("label".to_string(), Value::from("M"))]);
    }

    #[test]
    fn clear_keeps_container() {
        let mut doc = MemoryDocument::new();
        let c = container(&mut doc);
        doc.add_node(c, "VALUE", "v").unwrap();
        doc.new_socket(c, "x", SlotDirection::Input, "FLOAT").unwrap();
        doc.clear_container(c).unwrap();
        assert!(doc.contains_container(c));
        assert_eq!(doc.node_count(c).unwrap(), 0);
        assert_eq!(doc.socket_count(c, SlotDirection::Input).unwrap(), 0);
    }

    #[test]
    fn copy_is_deep() {
        let mut doc = MemoryDocument::new();
        let c = container(&mut doc);
        doc.add_node(c, "VALUE", "v").unwrap();
        let copy = doc.copy_container(c).unwrap();
        assert_ne!(copy, c);
        assert_eq!(doc.snapshot(c).unwrap(), doc.snapshot(copy).unwrap());
        doc.clear_container(c).unwrap();
        assert_eq!(doc.node_count(copy).unwrap(), 1);
    }

    #[test]
    fn users_count_bindings_and_pins() {
        let mut doc = MemoryDocument::new();
        let c = container(&mut doc);
        let owner = doc.add_owner("double");
        assert_eq!(doc.container_users(c).unwrap(), 0);

        doc.set_binding(
            owner,
            Some(BindingRecord {
                template: "double".into(),
                mode: BindingMode::Exclusive,
                container: c,
                hash: Fingerprint::default(),
            }),
        )
        .unwrap();
        doc.pin_container(c).unwrap();
        assert_eq!(doc.container_users(c).unwrap(), 2);
        doc.unpin_container(c).unwrap();
        doc.set_binding(owner, None).unwrap();
        assert_eq!(doc.container_users(c).unwrap(), 0);
    }

    #[test]
    fn owners_filtered_by_marker_in_order() {
        let mut doc = MemoryDocument::new();
        let a = doc.add_owner("t");
        let _other = doc.add_owner_with_marker("t", "something.else");
        let b = doc.add_owner("t");
        assert_eq!(doc.owners(TEMPLATE_OWNER_MARKER), vec![a, b]);
        assert_eq!(doc.remove_owner(a).unwrap(), None);
        assert_eq!(doc.owners(TEMPLATE_OWNER_MARKER), vec![b]);
        assert!(matches!(doc.owner_template(a), Err(HostError::UnknownOwner(_))));
    }
}
