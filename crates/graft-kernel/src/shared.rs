//! Shared instance registry
//!
//! One canonical container per shared template type, referenced by any
//! number of owners. The reference count is the number of distinct holders,
//! so adopting the same owner twice does not inflate it. A single mutex
//! guards every operation; a rebuild and a new bind can never observe each
//! other half done.

use crate::builder::GraphBuilder;
use crate::error::BuildError;
use graft_host::{BindingRecord, ContainerId, HostDocument, HostError, OwnerId, TEMPLATE_OWNER_MARKER};
use graft_template::{BindingMode, Fingerprint, TemplateDefinition, TemplateId};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

#[derive(Debug)]
struct SharedEntry {
    container: ContainerId,
    /// Fingerprint the container was built from; zero if unknown
    hash: Fingerprint,
    holders: BTreeSet<OwnerId>,
}

/// What a holder receives from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedInstance {
    pub container: ContainerId,
    pub hash: Fingerprint,
    /// The container was (re)built by this call
    pub built: bool,
}

/// Result of dropping a holder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedRelease {
    /// Other holders remain
    Detached { remaining: usize },
    /// Last holder gone; entry and container removed
    Destroyed,
    /// The owner held nothing under this template
    NotHeld,
}

/// Everything needed to build or check a shared instance
#[derive(Debug, Clone, Copy)]
pub struct SharedRequest<'a> {
    pub template: &'a TemplateId,
    pub definition: &'a TemplateDefinition,
    pub fingerprint: Fingerprint,
}

/// Registry of shared template instances
#[derive(Debug)]
pub struct SharedInstanceRegistry {
    /// Marker used to find document owners already bound to an adopted container
    owner_marker: String,
    entries: Mutex<HashMap<TemplateId, SharedEntry>>,
}

impl Default for SharedInstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedInstanceRegistry {
    pub fn new() -> Self {
        Self::with_owner_marker(TEMPLATE_OWNER_MARKER)
    }

    /// Registry that looks up persisted holders among owners carrying `marker`
    pub fn with_owner_marker(marker: impl Into<String>) -> Self {
        Self {
            owner_marker: marker.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Hand `owner` the shared instance, creating or refreshing it as needed
    ///
    /// On a miss, a container left in the document under the canonical name
    /// is adopted, together with every owner already bound to it, and rebuilt
    /// if needed; otherwise a new one is built.
    ///
    /// # Errors
    /// [`BuildError`] if building or rebuilding fails; the holder is not added
    pub fn acquire(
        &self,
        doc: &mut dyn HostDocument,
        builder: &GraphBuilder,
        request: SharedRequest<'_>,
        owner: OwnerId,
    ) -> Result<SharedInstance, BuildError> {
        let mut entries = self.entries.lock();
        self.acquire_locked(&mut entries, doc, builder, request, &[owner], None, false)
    }

    /// Register `owner` as a holder of the container its persisted record names
    ///
    /// Used when a document is loaded: the first adopted record seeds the
    /// entry with its container and hash. A record whose container no longer
    /// exists is treated like [`SharedInstanceRegistry::acquire`]. A stale
    /// entry is rebuilt.
    ///
    /// # Errors
    /// [`BuildError`] if building or rebuilding fails
    pub fn adopt(
        &self,
        doc: &mut dyn HostDocument,
        builder: &GraphBuilder,
        request: SharedRequest<'_>,
        owner: OwnerId,
        record: &BindingRecord,
    ) -> Result<SharedInstance, BuildError> {
        let mut entries = self.entries.lock();
        self.acquire_locked(&mut entries, doc, builder, request, &[owner], Some(record), false)
    }

    /// Add `target` as a holder of the instance `source` holds; used by copy
    ///
    /// A live entry is shared as is, without a freshness check. On a miss
    /// the source's record is adopted first, both under one lock.
    ///
    /// # Errors
    /// [`BuildError`] if adopting the source requires a build that fails
    pub fn share(
        &self,
        doc: &mut dyn HostDocument,
        builder: &GraphBuilder,
        request: SharedRequest<'_>,
        source: (OwnerId, &BindingRecord),
        target: OwnerId,
    ) -> Result<SharedInstance, BuildError> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(request.template) {
            entry.holders.insert(target);
            debug!(template = %request.template, %target, refcount = entry.holders.len(), "shared instance with copy");
            return Ok(SharedInstance {
                container: entry.container,
                hash: entry.hash,
                built: false,
            });
        }
        let (owner, record) = source;
        self.acquire_locked(&mut entries, doc, builder, request, &[owner, target], Some(record), false)
    }

    /// Rebuild the shared container of `template` unconditionally and keep
    /// `owner` as a holder
    ///
    /// On a miss the owner's record is adopted first.
    ///
    /// # Errors
    /// [`BuildError`] if the rebuild fails
    pub fn rebuild(
        &self,
        doc: &mut dyn HostDocument,
        builder: &GraphBuilder,
        request: SharedRequest<'_>,
        owner: OwnerId,
        record: &BindingRecord,
    ) -> Result<SharedInstance, BuildError> {
        let mut entries = self.entries.lock();
        self.acquire_locked(&mut entries, doc, builder, request, &[owner], Some(record), true)
    }

    #[allow(clippy::too_many_arguments)]
    fn acquire_locked(
        &self,
        entries: &mut HashMap<TemplateId, SharedEntry>,
        doc: &mut dyn HostDocument,
        builder: &GraphBuilder,
        request: SharedRequest<'_>,
        holders: &[OwnerId],
        seed: Option<&BindingRecord>,
        force: bool,
    ) -> Result<SharedInstance, BuildError> {
        let mut built = false;
        let entry = match entries.entry(request.template.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let persisted = seed
                    .filter(|record| doc.contains_container(record.container))
                    .map(|record| (record.container, record.hash))
                    .or_else(|| {
                        doc.find_container(&builder.container_name(request.template))
                            .map(|container| (container, Fingerprint::default()))
                    });
                let seeded = match persisted {
                    Some((container, hash)) => {
                        let bound = self.bound_owners(doc, request.template, container)?;
                        debug!(
                            template = %request.template,
                            %container,
                            bound = bound.len(),
                            "adopting persisted shared container"
                        );
                        SharedEntry {
                            container,
                            hash,
                            holders: bound,
                        }
                    }
                    None => {
                        let instance = builder.instantiate(doc, request.template, request.definition)?;
                        built = true;
                        SharedEntry {
                            container: instance.container,
                            hash: request.fingerprint,
                            holders: BTreeSet::new(),
                        }
                    }
                };
                vacant.insert(seeded)
            }
        };

        if force && !built {
            entry.hash = Fingerprint::default();
        }
        let rebuilt = match Self::ensure_fresh(entry, doc, builder, request) {
            Ok(rebuilt) => rebuilt,
            Err(e) => {
                let orphaned = entry.holders.is_empty();
                if orphaned {
                    entries.remove(request.template);
                }
                return Err(e);
            }
        };
        entry.holders.extend(holders.iter().copied());
        debug!(template = %request.template, refcount = entry.holders.len(), "acquired shared instance");
        Ok(SharedInstance {
            container: entry.container,
            hash: entry.hash,
            built: built || rebuilt,
        })
    }

    /// Owners of the document whose shared record of `template` names `container`
    fn bound_owners(
        &self,
        doc: &dyn HostDocument,
        template: &TemplateId,
        container: ContainerId,
    ) -> Result<BTreeSet<OwnerId>, HostError> {
        let mut bound = BTreeSet::new();
        for owner in doc.owners(&self.owner_marker) {
            if let Some(record) = doc.binding(owner)? {
                if record.mode == BindingMode::Shared
                    && record.container == container
                    && &record.template == template
                {
                    bound.insert(owner);
                }
            }
        }
        Ok(bound)
    }

    /// Drop `owner`; at zero holders the entry is removed, and so is the
    /// container unless the host still counts users of it
    ///
    /// # Errors
    /// [`HostError`] if the container cannot be inspected or removed
    pub fn release(
        &self,
        doc: &mut dyn HostDocument,
        template: &TemplateId,
        owner: OwnerId,
    ) -> Result<SharedRelease, HostError> {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(template) else {
            return Ok(SharedRelease::NotHeld);
        };
        if !entry.holders.remove(&owner) {
            return Ok(SharedRelease::NotHeld);
        }
        if !entry.holders.is_empty() {
            debug!(%template, %owner, refcount = entry.holders.len(), "released shared instance");
            return Ok(SharedRelease::Detached {
                remaining: entry.holders.len(),
            });
        }

        let container = entry.container;
        entries.remove(template);
        if doc.contains_container(container) {
            let users = doc.container_users(container)?;
            if users > 0 {
                info!(%template, %container, users, "last holder released, container still in use");
                return Ok(SharedRelease::Detached { remaining: users });
            }
            doc.remove_container(container)?;
        }
        info!(%template, %container, "destroyed shared instance");
        Ok(SharedRelease::Destroyed)
    }

    /// Number of holders of `template`'s instance
    pub fn refcount(&self, template: &TemplateId) -> usize {
        self.entries
            .lock()
            .get(template)
            .map_or(0, |entry| entry.holders.len())
    }

    pub fn holders(&self, template: &TemplateId) -> Vec<OwnerId> {
        self.entries
            .lock()
            .get(template)
            .map(|entry| entry.holders.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Forget every entry; the document is not touched
    pub fn teardown(&self) {
        let mut entries = self.entries.lock();
        debug!(entries = entries.len(), "tearing down shared instance registry");
        entries.clear();
    }

    /// Rebuild the entry in place if its hash differs from the request's
    fn ensure_fresh(
        entry: &mut SharedEntry,
        doc: &mut dyn HostDocument,
        builder: &GraphBuilder,
        request: SharedRequest<'_>,
    ) -> Result<bool, BuildError> {
        if entry.hash == request.fingerprint && doc.contains_container(entry.container) {
            return Ok(false);
        }

        if doc.contains_container(entry.container) {
            builder.materialize(doc, entry.container, request.definition)?;
        } else {
            entry.container = builder
                .instantiate(doc, request.template, request.definition)?
                .container;
        }
        info!(
            template = %request.template,
            container = %entry.container,
            from = %entry.hash.short(),
            to = %request.fingerprint.short(),
            "rebuilt shared instance"
        );
        entry.hash = request.fingerprint;
        Ok(true)
    }
}
