use graft_template::{BindingMode, Fingerprint, TemplateId};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Graph container (node tree) in the host document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub Uuid);

impl ContainerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entity in the host document that holds a template instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node inside a container; only meaningful together with its container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u64);

/// Interface socket of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketHandle(pub u64);

/// Side of a node or container interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotDirection {
    Input,
    Output,
}

/// Object receiving a property assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTarget {
    Node(NodeHandle),
    Socket(SocketHandle),
}

/// What the host persists on an owner: its instance and the fingerprint it was built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRecord {
    pub template: TemplateId,
    pub mode: BindingMode,
    pub container: ContainerId,
    pub hash: Fingerprint,
}

/// Kind of an owner property, as far as presentation cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Bool,
    Int,
    Float,
    String,
    Enum,
    Pointer,
}

/// Description of one owner property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub identifier: String,
    pub name: String,
    pub kind: PropertyKind,
    /// Declared by the owner type at runtime rather than built into the host
    pub is_runtime: bool,
    pub is_readonly: bool,
    pub is_hidden: bool,
}

impl PropertyInfo {
    /// Editable runtime property
    pub fn runtime(identifier: impl Into<String>, name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            kind,
            is_runtime: true,
            is_readonly: false,
            is_hidden: false,
        }
    }
}
