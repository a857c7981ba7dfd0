//! Graft Host
//!
//! The boundary between template machinery and the graph document that holds
//! its instances: [`HostDocument`], the ids and records it persists, and an
//! in-memory implementation, [`MemoryDocument`].

#![allow(missing_docs)]
#![warn(unreachable_pub)]

mod document;
mod error;
mod memory;
mod types;

pub use document::{HostDocument, GROUP_INPUT_TYPE, GROUP_OUTPUT_TYPE};
pub use error::HostError;
pub use memory::{
    ContainerSnapshot, LinkSnapshot, MemoryDocument, NodeSnapshot, NodeTypeCatalog, NodeTypeInfo,
    SlotSpec, SocketSnapshot, TEMPLATE_OWNER_MARKER,
};
pub use types::{
    BindingRecord, ContainerId, NodeHandle, OwnerId, PropertyInfo, PropertyKind, PropertyTarget,
    SlotDirection, SocketHandle,
};
