//! The host document boundary
//!
//! Everything the template machinery needs from the external graph document,
//! and nothing more. Implementations own node, socket and link storage and
//! the persistence of owner bindings.

use crate::error::HostError;
use crate::types::{
    BindingRecord, ContainerId, NodeHandle, OwnerId, PropertyInfo, PropertyTarget, SlotDirection,
    SocketHandle,
};
use graft_template::{SlotRef, TemplateId, Value};

/// Node type tag of the pseudo-node exposing a container's input sockets
pub const GROUP_INPUT_TYPE: &str = "NodeGroupInput";

/// Node type tag of the pseudo-node receiving a container's output sockets
pub const GROUP_OUTPUT_TYPE: &str = "NodeGroupOutput";

/// Mutable graph document hosting template instances
pub trait HostDocument {
    /// Create an empty container; the host may uniquify `name`
    fn create_container(&mut self, name: &str, tree_type: &str) -> Result<ContainerId, HostError>;

    /// Find a container by its exact name
    fn find_container(&self, name: &str) -> Option<ContainerId>;

    fn contains_container(&self, container: ContainerId) -> bool;

    /// Delete a container and everything in it
    fn remove_container(&mut self, container: ContainerId) -> Result<(), HostError>;

    /// Remove all nodes, links and interface sockets, keeping the container
    fn clear_container(&mut self, container: ContainerId) -> Result<(), HostError>;

    /// Deep-copy a container under a fresh id
    fn copy_container(&mut self, container: ContainerId) -> Result<ContainerId, HostError>;

    /// Owners bound to the container plus any other host-side aliases
    fn container_users(&self, container: ContainerId) -> Result<usize, HostError>;

    /// Create a node of `node_type` named `name`
    fn add_node(
        &mut self,
        container: ContainerId,
        node_type: &str,
        name: &str,
    ) -> Result<NodeHandle, HostError>;

    /// Add an interface socket to the container
    fn new_socket(
        &mut self,
        container: ContainerId,
        name: &str,
        direction: SlotDirection,
        socket_type: &str,
    ) -> Result<SocketHandle, HostError>;

    /// Assign a named property on a node or socket
    fn set_property(
        &mut self,
        container: ContainerId,
        target: PropertyTarget,
        name: &str,
        value: &Value,
    ) -> Result<(), HostError>;

    /// Position of a slot on a node, or `None` if the node has no such slot
    fn resolve_slot(
        &self,
        container: ContainerId,
        node: NodeHandle,
        direction: SlotDirection,
        slot: &SlotRef,
    ) -> Result<Option<usize>, HostError>;

    /// Assign the default value of an input slot
    fn set_input_default(
        &mut self,
        container: ContainerId,
        node: NodeHandle,
        input: usize,
        value: &Value,
    ) -> Result<(), HostError>;

    /// Link an output slot to an input slot, replacing any link into that input
    fn link(
        &mut self,
        container: ContainerId,
        from: NodeHandle,
        output: usize,
        to: NodeHandle,
        input: usize,
    ) -> Result<(), HostError>;

    /// All owners carrying `marker`, in document order
    fn owners(&self, marker: &str) -> Vec<OwnerId>;

    /// Template type an owner instantiates
    fn owner_template(&self, owner: OwnerId) -> Result<TemplateId, HostError>;

    /// Persisted binding of an owner, if it was ever materialized
    fn binding(&self, owner: OwnerId) -> Result<Option<BindingRecord>, HostError>;

    fn set_binding(&mut self, owner: OwnerId, record: Option<BindingRecord>) -> Result<(), HostError>;

    /// Properties declared on an owner, for presentation
    fn owner_properties(&self, owner: OwnerId) -> Result<Vec<PropertyInfo>, HostError>;
}
