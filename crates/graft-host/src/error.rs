use crate::types::{ContainerId, NodeHandle, OwnerId, SlotDirection};

/// Errors reported by a host document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("container {0} does not exist")]
    UnknownContainer(ContainerId),

    #[error("node {node:?} does not exist in container {container}")]
    UnknownNode {
        container: ContainerId,
        node: NodeHandle,
    },

    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    #[error("owner {0} does not exist")]
    UnknownOwner(OwnerId),

    #[error("{direction:?} slot {index} out of range on node {node:?} ({len} slots)")]
    SlotOutOfRange {
        node: NodeHandle,
        direction: SlotDirection,
        index: usize,
        len: usize,
    },

    #[error("socket {0} does not exist")]
    UnknownSocket(u64),

    #[error("property '{0}' is read-only")]
    ReadOnlyProperty(String),
}
