//! Graft Templates
//!
//! Declarative subgraph templates and their content fingerprints.
//!
//! # Core Concepts
//!
//! - [`TemplateDefinition`]: ordered inputs, internal nodes and outputs as pure data
//! - [`Template`]: static declaration of a template type and its [`BindingMode`]
//! - [`Fingerprint`]: Blake3 content hash used to detect stale instances
//! - [`TemplateRegistry`]: template types by id, with lazily validated, cached fingerprints
//!
//! # Example
//!
//! ```rust
//! use graft_template::{link, BindingMode, NodeDef, OutputDef, SocketDef, TemplateDefinition, TemplateId, TemplateRegistry};
//!
//! let definition = TemplateDefinition::builder()
//!     .input("value", SocketDef::new("FLOAT"))
//!     .node("double", NodeDef::new("MULTIPLY").bind("a", link("inputs", "value")).bind("b", 2.0))
//!     .output("result", OutputDef::new("FLOAT", link("double", 0usize)))
//!     .build()
//!     .unwrap();
//!
//! let registry = TemplateRegistry::new();
//! let id = TemplateId::new("double");
//! registry.register_definition(id.clone(), BindingMode::Exclusive, definition);
//! println!("fingerprint: {}", registry.fingerprint(&id).unwrap().short());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod definition;
mod error;
mod fingerprint;
mod loader;
mod registry;
mod value;

pub use definition::{
    link, Attrs, Binding, BindingMode, InputBinding, NodeDef, OutputDef, SocketDef, SourceRef,
    Template, TemplateBuilder, TemplateDefinition, TemplateId, DEFAULT_TREE_TYPE, INPUTS_NODE,
    OUTPUTS_NODE,
};
pub use error::{DefinitionError, ReferenceError, StructureError, TemplateError, UnpackError};
pub use fingerprint::{Fingerprint, FingerprintParseError};
pub use registry::{TemplateEntry, TemplateRegistry};
pub use value::{SlotRef, Value};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
