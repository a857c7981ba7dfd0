//! Graft Kernel
//!
//! Materializes template definitions into a host document and keeps the
//! resulting instances in step with their definitions.
//!
//! # Components
//!
//! - [`GraphBuilder`]: definition to host primitives, in a fixed order
//! - [`Binder`]: per-owner bind, refresh, copy, release and rebuild
//! - [`SharedInstanceRegistry`]: one reference-counted instance per shared template
//! - [`MigrationScanner`]: walks every owner and rebuilds the stale ones
//! - [`TemplateKernel`]: host hooks over all of the above
//!
//! # Example
//!
//! ```rust
//! use graft_host::MemoryDocument;
//! use graft_kernel::TemplateKernel;
//! use graft_template::{link, BindingMode, NodeDef, OutputDef, SocketDef, TemplateDefinition};
//!
//! let kernel = TemplateKernel::new();
//! let definition = TemplateDefinition::builder()
//!     .input("value", SocketDef::new("FLOAT"))
//!     .node("double", NodeDef::new("MULTIPLY").bind("a", link("inputs", "value")).bind("b", 2.0))
//!     .output("result", OutputDef::new("FLOAT", link("double", 0usize)))
//!     .build()
//!     .unwrap();
//! kernel.registry().register_definition("double".into(), BindingMode::Exclusive, definition);
//!
//! let mut doc = MemoryDocument::new();
//! let owner = doc.add_owner("double");
//! let binding = kernel.initialize_owner(&mut doc, owner).unwrap();
//! assert!(!kernel.is_stale(&doc, owner).unwrap());
//! assert_eq!(doc.node_count(binding.record.container).unwrap(), 3);
//! ```

#![warn(unreachable_pub)]

pub mod binding;
pub mod builder;
pub mod config;
pub mod error;
pub mod handle;
pub mod logging;
pub mod presentation;
pub mod scanner;
pub mod shared;

pub use binding::{Binder, InstanceBinding, RefreshOutcome, ReleaseOutcome};
pub use builder::{node_label, GraphBuilder, GraphInstance};
pub use config::{KernelConfig, ScanPolicy};
pub use error::{BuildError, ConfigError, KernelError, LogError};
pub use handle::TemplateKernel;
pub use logging::{Event, EventKind, EventLog};
pub use presentation::{property_listing, PropertyLine};
pub use scanner::{MigrationReport, MigrationScanner, OwnerFailure, OwnerMigration};
pub use shared::{SharedInstance, SharedInstanceRegistry, SharedRelease, SharedRequest};
