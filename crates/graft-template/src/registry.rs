//! Registry of template types
//!
//! [`TemplateRegistry`] maps a [`TemplateId`] to its definition and binding
//! mode and hands out fingerprints. The fingerprint, together with the
//! reference validation of the definition, is computed on first request and
//! cached for as long as the registration lives. Registering an id again
//! replaces the entry (and its cache), which is how a software upgrade
//! presents a changed definition.

use crate::definition::{BindingMode, Template, TemplateDefinition, TemplateId};
use crate::error::{DefinitionError, TemplateError};
use crate::fingerprint::Fingerprint;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// One registered template type
#[derive(Debug)]
pub struct TemplateEntry {
    id: TemplateId,
    mode: BindingMode,
    definition: Arc<TemplateDefinition>,
    checked: OnceCell<Result<Fingerprint, DefinitionError>>,
}

impl TemplateEntry {
    fn new(id: TemplateId, mode: BindingMode, definition: TemplateDefinition) -> Self {
        Self {
            id,
            mode,
            definition: Arc::new(definition),
            checked: OnceCell::new(),
        }
    }

    /// Binding mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    /// The definition, unvalidated
    #[inline]
    #[must_use]
    pub fn definition(&self) -> &Arc<TemplateDefinition> {
        &self.definition
    }

    /// Validate once and return the cached fingerprint
    ///
    /// # Errors
    /// [`TemplateError::Definition`] if the definition fails validation
    pub fn fingerprint(&self) -> Result<Fingerprint, TemplateError> {
        self.checked
            .get_or_init(|| {
                self.definition.validate()?;
                Fingerprint::of(&self.definition)
            })
            .clone()
            .map_err(|source| TemplateError::Definition {
                id: self.id.clone(),
                source,
            })
    }

    /// Definition after validation, with its fingerprint
    ///
    /// # Errors
    /// As [`TemplateEntry::fingerprint`]
    pub fn checked_definition(&self) -> Result<(Arc<TemplateDefinition>, Fingerprint), TemplateError> {
        let fingerprint = self.fingerprint()?;
        Ok((Arc::clone(&self.definition), fingerprint))
    }
}

/// Registry of template types, created explicitly at plugin registration
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    entries: RwLock<HashMap<TemplateId, Arc<TemplateEntry>>>,
}

impl TemplateRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a statically declared template type
    pub fn register<T: Template>(&self) -> TemplateId {
        let id = TemplateId::new(T::ID);
        self.register_definition(id.clone(), T::MODE, T::definition());
        id
    }

    /// Register or replace a definition under `id`
    ///
    /// Returns `true` if an earlier registration was replaced.
    pub fn register_definition(
        &self,
        id: TemplateId,
        mode: BindingMode,
        definition: TemplateDefinition,
    ) -> bool {
        let entry = Arc::new(TemplateEntry::new(id.clone(), mode, definition));
        self.entries.write().insert(id, entry).is_some()
    }

    /// Remove a registration
    pub fn unregister(&self, id: &TemplateId) -> bool {
        self.entries.write().remove(id).is_some()
    }

    /// Look up an entry
    ///
    /// # Errors
    /// [`TemplateError::Unknown`] if `id` is not registered
    pub fn entry(&self, id: &TemplateId) -> Result<Arc<TemplateEntry>, TemplateError> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| TemplateError::Unknown(id.clone()))
    }

    /// Definition registered under `id`
    ///
    /// # Errors
    /// [`TemplateError::Unknown`] if `id` is not registered
    pub fn definition(&self, id: &TemplateId) -> Result<Arc<TemplateDefinition>, TemplateError> {
        Ok(Arc::clone(self.entry(id)?.definition()))
    }

    /// Binding mode registered under `id`
    ///
    /// # Errors
    /// [`TemplateError::Unknown`] if `id` is not registered
    pub fn mode(&self, id: &TemplateId) -> Result<BindingMode, TemplateError> {
        Ok(self.entry(id)?.mode())
    }

    /// Current fingerprint of `id`, computed once per registration
    ///
    /// # Errors
    /// [`TemplateError::Unknown`] or [`TemplateError::Definition`]
    pub fn fingerprint(&self, id: &TemplateId) -> Result<Fingerprint, TemplateError> {
        self.entry(id)?.fingerprint()
    }

    /// Check whether `id` is registered
    #[must_use]
    pub fn contains(&self, id: &TemplateId) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Registered ids, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<TemplateId> {
        let mut ids: Vec<_> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered template types
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if no template types are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{link, NodeDef, OutputDef, SocketDef};

    struct Double;

    impl Template for Double {
        const ID: &'static str = "double";

        fn definition() -> TemplateDefinition {
            TemplateDefinition::builder()
                .input("value", SocketDef::new("FLOAT"))
                .node(
                    "double",
                    NodeDef::new("MULTIPLY")
                        .bind("a", link("inputs", "value"))
                        .bind("b", 2.0),
                )
                .output("result", OutputDef::new("FLOAT", link("double", 0usize)))
                .build()
                .unwrap()
        }
    }

    fn broken() -> TemplateDefinition {
        TemplateDefinition::builder()
            .node("n", NodeDef::new("ADD").bind("a", link("nowhere", 0usize)))
            .build()
            .unwrap()
    }

    #[test]
    fn register_static_template() {
        let registry = TemplateRegistry::new();
        let id = registry.register::<Double>();
        assert_eq!(id.as_str(), "double");
        assert_eq!(registry.mode(&id).unwrap(), BindingMode::Exclusive);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&id));
    }

    #[test]
    fn fingerprint_matches_direct_computation() {
        let registry = TemplateRegistry::new();
        let id = registry.register::<Double>();
        let expected = Fingerprint::of(&Double::definition()).unwrap();
        assert_eq!(registry.fingerprint(&id).unwrap(), expected);
        assert_eq!(registry.fingerprint(&id).unwrap(), expected);
    }

    #[test]
    fn fingerprint_cached_per_entry() {
        let registry = TemplateRegistry::new();
        let id = registry.register::<Double>();
        let entry = registry.entry(&id).unwrap();
        let first = entry.fingerprint().unwrap();
        assert!(entry.checked.get().is_some());
        assert_eq!(entry.fingerprint().unwrap(), first);
    }

    #[test]
    fn unknown_template() {
        let registry = TemplateRegistry::new();
        let id = TemplateId::new("nope");
        assert_eq!(registry.fingerprint(&id), Err(TemplateError::Unknown(id)));
    }

    #[test]
    fn invalid_definition_reported_lazily() {
        let registry = TemplateRegistry::new();
        let id = TemplateId::new("broken");
        registry.register_definition(id.clone(), BindingMode::Exclusive, broken());
        assert!(registry.definition(&id).is_ok());
        assert!(matches!(
            registry.fingerprint(&id),
            Err(TemplateError::Definition {
                source: DefinitionError::Reference(_),
                ..
            })
        ));
    }

    #[test]
    fn reregistering_replaces_fingerprint() {
        let registry = TemplateRegistry::new();
        let id = registry.register::<Double>();
        let before = registry.fingerprint(&id).unwrap();

        let changed = TemplateDefinition::builder()
            .input("value", SocketDef::new("FLOAT"))
            .node(
                "double",
                NodeDef::new("MULTIPLY")
                    .bind("a", link("inputs", "value"))
                    .bind("b", 3.0),
            )
            .output("result", OutputDef::new("FLOAT", link("double", 0usize)))
            .build()
            .unwrap();
        assert!(registry.register_definition(id.clone(), BindingMode::Exclusive, changed));
        assert_ne!(registry.fingerprint(&id).unwrap(), before);
    }

    #[test]
    fn unregister() {
        let registry = TemplateRegistry::new();
        let id = registry.register::<Double>();
        assert!(registry.unregister(&id));
        assert!(registry.is_empty());
        assert!(!registry.unregister(&id));
    }
}
