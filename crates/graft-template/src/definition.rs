//! Template definition model
//!
//! A [`TemplateDefinition`] is pure data: ordered input sockets, ordered
//! internal nodes with their attribute assignments and input bindings, and
//! ordered output sockets. Declaration order is build order, so every mapping
//! is an [`IndexMap`].
//!
//! # Example
//!
//! ```rust
//! use graft_template::{link, NodeDef, OutputDef, SocketDef, TemplateDefinition};
//!
//! let definition = TemplateDefinition::builder()
//!     .input("value", SocketDef::new("FLOAT"))
//!     .node(
//!         "double",
//!         NodeDef::new("MULTIPLY")
//!             .bind("a", link("inputs", "value"))
//!             .bind("b", 2.0),
//!     )
//!     .output("result", OutputDef::new("FLOAT", link("double", 0usize)))
//!     .build()
//!     .unwrap();
//!
//! assert!(definition.validate().is_ok());
//! ```

use crate::error::{DefinitionError, ReferenceError, StructureError};
use crate::value::{SlotRef, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Name of the pseudo-node exposing the template inputs as link sources
pub const INPUTS_NODE: &str = "inputs";

/// Name of the pseudo-node receiving the template outputs
pub const OUTPUTS_NODE: &str = "outputs";

/// Tree type used when a definition does not name one
pub const DEFAULT_TREE_TYPE: &str = "NodeTree";

/// Attribute assignments, applied in order
pub type Attrs = IndexMap<String, Value>;

/// Identity of a template type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

impl TemplateId {
    /// Create a template id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TemplateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TemplateId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// How owners of a template type hold their materialized instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingMode {
    /// Each owner gets its own instance
    #[default]
    Exclusive,
    /// All owners reference one reference-counted instance
    Shared,
}

/// The `(source node name, source output)` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source node name, or [`INPUTS_NODE`]
    pub node: String,
    /// Output slot on the source node
    pub output: SlotRef,
}

impl Display for SourceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "('{}', {})", self.node, self.output)
    }
}

/// What feeds an input slot: a literal default or a link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Binding {
    /// Assign a default value to the slot
    Literal(Value),
    /// Link the slot from another node's output
    Link(SourceRef),
}

/// Build a link binding from `node`'s `output`
#[must_use]
pub fn link(node: impl Into<String>, output: impl Into<SlotRef>) -> Binding {
    Binding::Link(SourceRef {
        node: node.into(),
        output: output.into(),
    })
}

impl From<SourceRef> for Binding {
    fn from(value: SourceRef) -> Self {
        Self::Link(value)
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

macro_rules! literal_binding {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Binding {
                fn from(value: $ty) -> Self {
                    Self::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_binding!(bool, i32, i64, f32, f64, &str, String);

/// One template input socket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocketDef {
    /// Host socket type tag
    pub socket_type: String,
    /// Socket attribute assignments
    pub attrs: Attrs,
}

impl SocketDef {
    /// Socket of the given type with no attributes
    #[must_use]
    pub fn new(socket_type: impl Into<String>) -> Self {
        Self {
            socket_type: socket_type.into(),
            attrs: Attrs::new(),
        }
    }

    /// Add an attribute assignment
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }
}

/// One input binding of an internal node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputBinding {
    /// Target input slot
    pub slot: SlotRef,
    /// Literal or link feeding it
    pub binding: Binding,
}

/// One internal node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDef {
    /// Host node type tag
    pub node_type: String,
    /// Node attribute assignments
    pub attrs: Attrs,
    /// Input bindings, applied in order
    pub inputs: Vec<InputBinding>,
}

impl NodeDef {
    /// Node of the given type with no attributes or bindings
    #[must_use]
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            attrs: Attrs::new(),
            inputs: Vec::new(),
        }
    }

    /// Add an attribute assignment
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Bind an input slot to a literal or a link
    #[must_use]
    pub fn bind(mut self, slot: impl Into<SlotRef>, binding: impl Into<Binding>) -> Self {
        self.inputs.push(InputBinding {
            slot: slot.into(),
            binding: binding.into(),
        });
        self
    }
}

/// One template output socket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputDef {
    /// Host socket type tag
    pub socket_type: String,
    /// Socket attribute assignments
    pub attrs: Attrs,
    /// Literal default or link feeding the output
    pub value: Binding,
}

impl OutputDef {
    /// Output of the given type fed by `value`
    #[must_use]
    pub fn new(socket_type: impl Into<String>, value: impl Into<Binding>) -> Self {
        Self {
            socket_type: socket_type.into(),
            attrs: Attrs::new(),
            value: value.into(),
        }
    }

    /// Add an attribute assignment
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }
}

/// Declarative description of a reusable subgraph
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDefinition {
    pub(crate) tree_type: String,
    pub(crate) inputs: IndexMap<String, SocketDef>,
    pub(crate) nodes: IndexMap<String, NodeDef>,
    pub(crate) outputs: IndexMap<String, OutputDef>,
}

impl TemplateDefinition {
    /// Start a definition
    #[must_use]
    pub fn builder() -> TemplateBuilder {
        TemplateBuilder::default()
    }

    /// Host tree type of the container this template materializes into
    #[inline]
    #[must_use]
    pub fn tree_type(&self) -> &str {
        &self.tree_type
    }

    /// Input sockets in declaration order
    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &IndexMap<String, SocketDef> {
        &self.inputs
    }

    /// Internal nodes in declaration order
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &IndexMap<String, NodeDef> {
        &self.nodes
    }

    /// Output sockets in declaration order
    #[inline]
    #[must_use]
    pub fn outputs(&self) -> &IndexMap<String, OutputDef> {
        &self.outputs
    }

    /// Check that every reference resolves
    ///
    /// A reference must name [`INPUTS_NODE`] or a declared node. References
    /// into [`INPUTS_NODE`] must also name an existing input socket, since
    /// its slots are known without a host. Slots of other nodes depend on the
    /// host node type and are checked at build time.
    ///
    /// # Errors
    /// Returns the first [`ReferenceError`] found, in declaration order
    pub fn validate(&self) -> Result<(), DefinitionError> {
        for (name, node) in &self.nodes {
            for input in &node.inputs {
                if let Binding::Link(source) = &input.binding {
                    self.check_source(source, name)?;
                }
            }
        }
        for (name, output) in &self.outputs {
            if let Binding::Link(source) = &output.value {
                self.check_source(source, name)?;
            }
        }
        Ok(())
    }

    fn check_source(&self, source: &SourceRef, referenced_from: &str) -> Result<(), ReferenceError> {
        if source.node == INPUTS_NODE {
            let exists = match &source.output {
                SlotRef::Name(name) => self.inputs.contains_key(name),
                SlotRef::Index(index) => *index < self.inputs.len(),
            };
            if !exists {
                return Err(ReferenceError::MissingSlot {
                    node: source.node.clone(),
                    slot: source.output.clone(),
                    referenced_from: referenced_from.to_string(),
                });
            }
            return Ok(());
        }
        if !self.nodes.contains_key(&source.node) {
            return Err(ReferenceError::UnknownNode {
                node: source.node.clone(),
                referenced_from: referenced_from.to_string(),
            });
        }
        Ok(())
    }
}

/// Incremental builder for [`TemplateDefinition`]
///
/// Collects entries in call order; [`TemplateBuilder::build`] reports the
/// first duplicate or reserved name.
#[derive(Debug, Default)]
pub struct TemplateBuilder {
    tree_type: Option<String>,
    inputs: Vec<(String, SocketDef)>,
    nodes: Vec<(String, NodeDef)>,
    outputs: Vec<(String, OutputDef)>,
}

impl TemplateBuilder {
    /// Set the host tree type
    #[must_use]
    pub fn tree_type(mut self, tree_type: impl Into<String>) -> Self {
        self.tree_type = Some(tree_type.into());
        self
    }

    /// Declare an input socket
    #[must_use]
    pub fn input(mut self, name: impl Into<String>, socket: SocketDef) -> Self {
        self.inputs.push((name.into(), socket));
        self
    }

    /// Declare an internal node
    #[must_use]
    pub fn node(mut self, name: impl Into<String>, node: NodeDef) -> Self {
        self.nodes.push((name.into(), node));
        self
    }

    /// Declare an output socket
    #[must_use]
    pub fn output(mut self, name: impl Into<String>, output: OutputDef) -> Self {
        self.outputs.push((name.into(), output));
        self
    }

    /// Assemble the definition
    ///
    /// # Errors
    /// [`StructureError::DuplicateName`] when a name repeats within one mapping
    /// or a node declares the same input slot twice,
    /// [`StructureError::ReservedName`] when a node uses a pseudo-node name,
    /// [`StructureError::InvalidValue`] for NaN or infinite literals
    pub fn build(self) -> Result<TemplateDefinition, DefinitionError> {
        let inputs = collect_unique("input", self.inputs)?;
        let nodes = collect_unique("node", self.nodes)?;
        let outputs = collect_unique("output", self.outputs)?;

        for (name, input) in &inputs {
            check_attrs(&format!("inputs.{name}"), &input.attrs)?;
        }
        for (name, node) in &nodes {
            check_attrs(&format!("nodes.{name}"), &node.attrs)?;
            for input in &node.inputs {
                if let Binding::Literal(value) = &input.binding {
                    check_finite(&format!("nodes.{name}[{}]", input.slot), value)?;
                }
            }
        }
        for (name, output) in &outputs {
            check_attrs(&format!("outputs.{name}"), &output.attrs)?;
            if let Binding::Literal(value) = &output.value {
                check_finite(&format!("outputs.{name}"), value)?;
            }
        }

        for (name, node) in &nodes {
            if name == INPUTS_NODE || name == OUTPUTS_NODE {
                return Err(StructureError::ReservedName(name.clone()).into());
            }
            let mut seen = Vec::with_capacity(node.inputs.len());
            for input in &node.inputs {
                if seen.contains(&&input.slot) {
                    return Err(StructureError::DuplicateName {
                        kind: "input slot",
                        name: format!("{name}.{}", input.slot),
                    }
                    .into());
                }
                seen.push(&input.slot);
            }
        }

        Ok(TemplateDefinition {
            tree_type: self
                .tree_type
                .unwrap_or_else(|| DEFAULT_TREE_TYPE.to_string()),
            inputs,
            nodes,
            outputs,
        })
    }
}

/// Non-finite floats have no stable serialized form to fingerprint
fn check_finite(field: &str, value: &Value) -> Result<(), StructureError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StructureError::InvalidValue {
            field: field.to_string(),
            value: format!("{} {value}", value.kind()),
        })
    }
}

fn check_attrs(field: &str, attrs: &Attrs) -> Result<(), StructureError> {
    attrs
        .iter()
        .try_for_each(|(attr, value)| check_finite(&format!("{field}.{attr}"), value))
}

fn collect_unique<T>(
    kind: &'static str,
    entries: Vec<(String, T)>,
) -> Result<IndexMap<String, T>, StructureError> {
    let mut map = IndexMap::with_capacity(entries.len());
    for (name, entry) in entries {
        if map.contains_key(&name) {
            return Err(StructureError::DuplicateName { kind, name });
        }
        map.insert(name, entry);
    }
    Ok(map)
}

/// Static declaration of a template type
///
/// # Example
/// ```rust
/// use graft_template::{link, BindingMode, NodeDef, OutputDef, SocketDef, Template, TemplateDefinition};
///
/// struct Double;
///
/// impl Template for Double {
///     const ID: &'static str = "double";
///     const MODE: BindingMode = BindingMode::Shared;
///
///     fn definition() -> TemplateDefinition {
///         TemplateDefinition::builder()
///             .input("value", SocketDef::new("FLOAT"))
///             .node("double", NodeDef::new("MULTIPLY").bind("a", link("inputs", "value")).bind("b", 2.0))
///             .output("result", OutputDef::new("FLOAT", link("double", 0usize)))
///             .build()
///             .expect("static definition")
///     }
/// }
/// ```
pub trait Template: 'static {
    /// Template type identity; must be unique within a registry
    const ID: &'static str;

    /// Binding mode for owners of this template type
    const MODE: BindingMode = BindingMode::Exclusive;

    /// The definition
    fn definition() -> TemplateDefinition;
}
