//! Error types for template definitions
//!
//! Three families, all raised synchronously:
//! - [`StructureError`]: the definition has the wrong shape
//! - [`UnpackError`]: a reference cannot be unpacked into `(node, index)`
//! - [`ReferenceError`]: a reference names a node or slot that does not exist

use crate::definition::TemplateId;
use crate::value::SlotRef;

/// Malformed definition shape
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    /// A mapping field holds something else
    #[error("{field}: {value} has type '{found}', expected '{expected}'")]
    NotAMapping {
        /// Field or entry path that was expected to be a mapping
        field: String,
        /// Rendering of the offending value
        value: String,
        /// Actual shape
        found: &'static str,
        /// Expected shape
        expected: &'static str,
    },

    /// A tuple-like entry has the wrong arity or element kinds
    #[error("{field}: malformed entry {value}, expected {expected}")]
    MalformedEntry {
        /// Entry path
        field: String,
        /// Rendering of the offending value
        value: String,
        /// Expected layout
        expected: &'static str,
    },

    /// A literal that no host slot can hold
    #[error("{field}: unsupported value {value}")]
    InvalidValue {
        /// Entry path
        field: String,
        /// Rendering of the offending value
        value: String,
    },

    /// Name declared twice in the same mapping
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName {
        /// Which mapping (`input`, `node`, `output`, `input slot`)
        kind: &'static str,
        /// Repeated name
        name: String,
    },

    /// A node uses one of the pseudo-node names
    #[error("node name '{0}' is reserved")]
    ReservedName(String),
}

/// A reference value that is not a `(node, index)` pair
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to unpack '{value}', expected '(node, index)'")]
pub struct UnpackError {
    /// Rendering of the offending value
    pub value: String,
}

/// A reference to a node or slot that does not exist
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    /// Source node is neither declared nor the inputs pseudo-node
    #[error("node '{node}' referenced from '{referenced_from}' does not exist")]
    UnknownNode {
        /// Missing node name
        node: String,
        /// Node or output holding the reference
        referenced_from: String,
    },

    /// Source slot does not exist on a node whose slots are known statically
    #[error("output {slot} of node '{node}' referenced from '{referenced_from}' does not exist")]
    MissingSlot {
        /// Source node name
        node: String,
        /// Missing slot
        slot: SlotRef,
        /// Node or output holding the reference
        referenced_from: String,
    },
}

/// Any definition error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    /// Malformed shape
    #[error("structure error: {0}")]
    Structure(#[from] StructureError),

    /// Malformed reference tuple
    #[error("unpack error: {0}")]
    Unpack(#[from] UnpackError),

    /// Dangling reference
    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),

    /// Raw document could not be parsed at all
    #[error("parse error: {0}")]
    Parse(String),

    /// Definition could not be serialized for fingerprinting
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Template registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// No template registered under this id
    #[error("unknown template '{0}'")]
    Unknown(TemplateId),

    /// The registered definition is invalid
    #[error("template '{id}': {source}")]
    Definition {
        /// Template id
        id: TemplateId,
        /// Underlying error
        #[source]
        source: DefinitionError,
    },
}
