//! Raw-data loading of template definitions
//!
//! Definitions shipped as data (JSON or TOML) mirror the tuple layout of the
//! typed model:
//!
//! ```json
//! {
//!   "tree_type": "ShaderNodeTree",
//!   "inputs":  { "value":  ["FLOAT", {}] },
//!   "nodes":   { "double": ["MULTIPLY", {}, { "a": { "from": ["inputs", "value"] }, "b": 2.0 }] },
//!   "outputs": { "result": ["FLOAT", {}, { "from": ["double", 0] }] }
//! }
//! ```
//!
//! Shape problems surface as [`StructureError`], malformed `from` pairs as
//! [`UnpackError`]. References are not resolved here; that is
//! [`TemplateDefinition::validate`]'s job.

use crate::definition::{
    Attrs, Binding, InputBinding, NodeDef, OutputDef, SocketDef, SourceRef, TemplateBuilder,
    TemplateDefinition,
};
use crate::error::{DefinitionError, StructureError, UnpackError};
use crate::value::{SlotRef, Value};
use serde_json::{Map, Value as Json};
use std::path::Path;

const REFERENCE_KEY: &str = "from";

impl TemplateDefinition {
    /// Load a definition from a parsed JSON document
    ///
    /// # Errors
    /// [`DefinitionError::Structure`] or [`DefinitionError::Unpack`] on a
    /// malformed document, plus duplicate/reserved name checks of
    /// [`TemplateBuilder::build`]
    pub fn from_json_value(document: &Json) -> Result<Self, DefinitionError> {
        let root = expect_mapping("definition", document)?;
        let mut builder = TemplateBuilder::default();

        if let Some(tree_type) = root.get("tree_type") {
            let tree_type = tree_type.as_str().ok_or_else(|| StructureError::MalformedEntry {
                field: "tree_type".to_string(),
                value: tree_type.to_string(),
                expected: "a string",
            })?;
            builder = builder.tree_type(tree_type);
        }

        for (name, entry) in section(root, "inputs")? {
            builder = builder.input(name.clone(), parse_input(name, entry)?);
        }
        for (name, entry) in section(root, "nodes")? {
            builder = builder.node(name.clone(), parse_node(name, entry)?);
        }
        for (name, entry) in section(root, "outputs")? {
            builder = builder.output(name.clone(), parse_output(name, entry)?);
        }

        builder.build()
    }

    /// Load a definition from JSON text
    ///
    /// # Errors
    /// [`DefinitionError::Parse`] if the text is not JSON, otherwise as
    /// [`TemplateDefinition::from_json_value`]
    pub fn from_json_str(text: &str) -> Result<Self, DefinitionError> {
        let document: Json =
            serde_json::from_str(text).map_err(|e| DefinitionError::Parse(e.to_string()))?;
        Self::from_json_value(&document)
    }

    /// Load a definition from TOML text
    ///
    /// # Errors
    /// [`DefinitionError::Parse`] if the text is not TOML, otherwise as
    /// [`TemplateDefinition::from_json_value`]
    pub fn from_toml_str(text: &str) -> Result<Self, DefinitionError> {
        let table: toml::Table =
            toml::from_str(text).map_err(|e| DefinitionError::Parse(e.to_string()))?;
        let document =
            serde_json::to_value(table).map_err(|e| DefinitionError::Parse(e.to_string()))?;
        Self::from_json_value(&document)
    }

    /// Load a definition file, choosing the format from its extension
    ///
    /// # Errors
    /// [`DefinitionError::Parse`] for unreadable files or unknown extensions
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DefinitionError::Parse(format!("{}: {e}", path.display())))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            _ => Err(DefinitionError::Parse(format!(
                "{}: expected a .json or .toml file",
                path.display()
            ))),
        }
    }
}

fn shape_of(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "mapping",
    }
}

fn expect_mapping<'a>(field: &str, value: &'a Json) -> Result<&'a Map<String, Json>, StructureError> {
    value.as_object().ok_or_else(|| StructureError::NotAMapping {
        field: field.to_string(),
        value: value.to_string(),
        found: shape_of(value),
        expected: "mapping",
    })
}

fn section<'a>(
    root: &'a Map<String, Json>,
    field: &str,
) -> Result<Box<dyn Iterator<Item = (&'a String, &'a Json)> + 'a>, StructureError> {
    match root.get(field) {
        None => Ok(Box::new(std::iter::empty())),
        Some(value) => Ok(Box::new(expect_mapping(field, value)?.iter())),
    }
}

fn expect_tuple<'a>(
    field: &str,
    value: &'a Json,
    arity: usize,
    expected: &'static str,
) -> Result<&'a [Json], StructureError> {
    match value.as_array() {
        Some(items) if items.len() == arity => Ok(items),
        _ => Err(StructureError::MalformedEntry {
            field: field.to_string(),
            value: value.to_string(),
            expected,
        }),
    }
}

fn type_tag(field: &str, value: &Json, expected: &'static str) -> Result<String, StructureError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| StructureError::MalformedEntry {
            field: field.to_string(),
            value: value.to_string(),
            expected,
        })
}

fn parse_input(name: &str, entry: &Json) -> Result<SocketDef, DefinitionError> {
    const EXPECTED: &str = "[socket_type, {attrs}]";
    let field = format!("inputs.{name}");
    let items = expect_tuple(&field, entry, 2, EXPECTED)?;
    Ok(SocketDef {
        socket_type: type_tag(&field, &items[0], EXPECTED)?,
        attrs: parse_attrs(&format!("{field}.attrs"), &items[1])?,
    })
}

fn parse_node(name: &str, entry: &Json) -> Result<NodeDef, DefinitionError> {
    const EXPECTED: &str = "[node_type, {attrs}, {inputs}]";
    let field = format!("nodes.{name}");
    let items = expect_tuple(&field, entry, 3, EXPECTED)?;
    let node_type = type_tag(&field, &items[0], EXPECTED)?;
    let attrs = parse_attrs(&format!("{field}.attrs"), &items[1])?;

    let inputs_field = format!("{field}.inputs");
    let mut inputs = Vec::new();
    for (slot, value) in expect_mapping(&inputs_field, &items[2])? {
        inputs.push(InputBinding {
            slot: SlotRef::parse_key(slot),
            binding: parse_binding(&format!("{inputs_field}.{slot}"), value)?,
        });
    }

    Ok(NodeDef {
        node_type,
        attrs,
        inputs,
    })
}

fn parse_output(name: &str, entry: &Json) -> Result<OutputDef, DefinitionError> {
    const EXPECTED: &str = "[socket_type, {attrs}, value]";
    let field = format!("outputs.{name}");
    let items = expect_tuple(&field, entry, 3, EXPECTED)?;
    Ok(OutputDef {
        socket_type: type_tag(&field, &items[0], EXPECTED)?,
        attrs: parse_attrs(&format!("{field}.attrs"), &items[1])?,
        value: parse_binding(&format!("{field}.value"), &items[2])?,
    })
}

fn parse_attrs(field: &str, value: &Json) -> Result<Attrs, DefinitionError> {
    let mut attrs = Attrs::new();
    for (name, raw) in expect_mapping(field, value)? {
        attrs.insert(name.clone(), parse_literal(&format!("{field}.{name}"), raw)?);
    }
    Ok(attrs)
}

fn parse_binding(field: &str, value: &Json) -> Result<Binding, DefinitionError> {
    if let Some(object) = value.as_object() {
        if object.len() == 1 {
            if let Some(reference) = object.get(REFERENCE_KEY) {
                return Ok(Binding::Link(parse_reference(reference)?));
            }
        }
    }
    Ok(Binding::Literal(parse_literal(field, value)?))
}

fn parse_reference(value: &Json) -> Result<SourceRef, UnpackError> {
    let unpack_error = || UnpackError {
        value: value.to_string(),
    };
    let items = value.as_array().ok_or_else(unpack_error)?;
    let [node, output] = items.as_slice() else {
        return Err(unpack_error());
    };
    let node = node.as_str().ok_or_else(unpack_error)?.to_string();
    let output = match output {
        Json::String(name) => SlotRef::Name(name.clone()),
        Json::Number(n) => n
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .map(SlotRef::Index)
            .ok_or_else(unpack_error)?,
        _ => return Err(unpack_error()),
    };
    Ok(SourceRef { node, output })
}

fn parse_literal(field: &str, value: &Json) -> Result<Value, StructureError> {
    let invalid = || StructureError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    };
    match value {
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => {
            if n.is_f64() {
                n.as_f64().map(Value::Float).ok_or_else(invalid)
            } else {
                n.as_i64().map(Value::Int).ok_or_else(invalid)
            }
        }
        Json::String(s) => Ok(Value::Text(s.clone())),
        Json::Array(items) => items
            .iter()
            .map(Json::as_f64)
            .collect::<Option<Vec<f64>>>()
            .map(Value::Vector)
            .ok_or_else(invalid),
        Json::Null | Json::Object(_) => Err(invalid()),
    }
}
