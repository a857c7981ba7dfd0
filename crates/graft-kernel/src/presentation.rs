//! Display-only listing of owner properties

use graft_host::{PropertyInfo, PropertyKind};
use serde::Serialize;

/// One row of an owner's property panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyLine {
    pub identifier: String,
    /// Text shown next to the value; empty for enum properties, which label themselves
    pub text: String,
}

/// Editable runtime properties, in declaration order
pub fn property_listing(properties: &[PropertyInfo]) -> Vec<PropertyLine> {
    properties
        .iter()
        .filter(|p| p.is_runtime && !p.is_readonly && !p.is_hidden)
        .map(|p| PropertyLine {
            identifier: p.identifier.clone(),
            text: if p.kind == PropertyKind::Enum {
                String::new()
            } else {
                p.name.clone()
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_and_labels() {
        let mut readonly = PropertyInfo::runtime("rna", "RNA", PropertyKind::Pointer);
        readonly.is_readonly = true;
        let mut hidden = PropertyInfo::runtime("secret", "Secret", PropertyKind::Int);
        hidden.is_hidden = true;
        let mut builtin = PropertyInfo::runtime("location", "Location", PropertyKind::Float);
        builtin.is_runtime = false;

        let lines = property_listing(&[
            PropertyInfo::runtime("factor", "Factor", PropertyKind::Float),
            readonly,
            PropertyInfo::runtime("blend", "Blend Mode", PropertyKind::Enum),
            hidden,
            builtin,
        ]);
        assert_eq!(
            lines,
            vec![
                PropertyLine {
                    identifier: "factor".into(),
                    text: "Factor".into(),
                },
                PropertyLine {
                    identifier: "blend".into(),
                    text: String::new(),
                },
            ]
        );
    }
}
