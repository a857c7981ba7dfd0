//! Instance binding
//!
//! Pairs an owner with its materialized instance and the fingerprint that
//! instance was built from. [`Binder`] is the single entry point for every
//! owner lifecycle step and dispatches on [`BindingMode`]: exclusive owners
//! get their own container, shared owners go through the
//! [`SharedInstanceRegistry`].

use crate::builder::GraphBuilder;
use crate::error::KernelError;
use crate::logging::{EventKind, EventLog};
use crate::shared::{SharedInstanceRegistry, SharedRelease, SharedRequest};
use graft_host::{BindingRecord, ContainerId, HostDocument, OwnerId};
use graft_template::{BindingMode, Fingerprint, TemplateDefinition, TemplateId, TemplateRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// An owner and its persisted binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceBinding {
    pub owner: OwnerId,
    pub record: BindingRecord,
}

impl InstanceBinding {
    /// Read an owner's binding from the document
    ///
    /// # Errors
    /// [`KernelError::Host`] if the owner does not exist
    pub fn load(doc: &dyn HostDocument, owner: OwnerId) -> Result<Option<Self>, KernelError> {
        Ok(doc.binding(owner)?.map(|record| Self { owner, record }))
    }

    /// Whether the instance was built from something other than `current`
    #[inline]
    #[must_use]
    pub fn is_stale(&self, current: Fingerprint) -> bool {
        self.record.hash != current
    }
}

/// What [`Binder::refresh`] did to an owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Already built from the current fingerprint
    Current,
    /// The instance was rebuilt in place
    Rebuilt,
    /// Shared owner pointed at the up-to-date shared instance without a build
    Relinked,
    /// The owner had no binding and was materialized
    Initialized,
    /// The template changed binding mode; old binding released, new one created
    Rebound,
}

/// Result of releasing an owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The instance container was removed
    Destroyed,
    /// The owner detached; the container is still referenced
    Detached { remaining: usize },
    /// The owner had no binding
    NotBound,
}

/// Owner lifecycle operations over one template registry
#[derive(Debug, Clone, Copy)]
pub struct Binder<'k> {
    registry: &'k TemplateRegistry,
    shared: &'k SharedInstanceRegistry,
    builder: &'k GraphBuilder,
    events: &'k EventLog,
}

struct Resolved {
    template: TemplateId,
    mode: BindingMode,
    definition: Arc<TemplateDefinition>,
    fingerprint: Fingerprint,
}

impl Resolved {
    fn request(&self) -> SharedRequest<'_> {
        SharedRequest {
            template: &self.template,
            definition: &self.definition,
            fingerprint: self.fingerprint,
        }
    }

    fn record(&self, container: ContainerId, hash: Fingerprint) -> BindingRecord {
        BindingRecord {
            template: self.template.clone(),
            mode: self.mode,
            container,
            hash,
        }
    }
}

impl<'k> Binder<'k> {
    pub fn new(
        registry: &'k TemplateRegistry,
        shared: &'k SharedInstanceRegistry,
        builder: &'k GraphBuilder,
        events: &'k EventLog,
    ) -> Self {
        Self {
            registry,
            shared,
            builder,
            events,
        }
    }

    /// Current fingerprint of an owner's template
    ///
    /// # Errors
    /// [`KernelError::Template`] if the template is unknown or invalid
    pub fn fingerprint_of(&self, doc: &dyn HostDocument, owner: OwnerId) -> Result<Fingerprint, KernelError> {
        Ok(self.registry.fingerprint(&doc.owner_template(owner)?)?)
    }

    /// First materialization of an owner (initialize hook)
    ///
    /// An owner that is already bound is refreshed instead.
    ///
    /// # Errors
    /// Template, build or host errors
    pub fn bind(&self, doc: &mut dyn HostDocument, owner: OwnerId) -> Result<InstanceBinding, KernelError> {
        if doc.binding(owner)?.is_some() {
            self.refresh(doc, owner)?;
        } else {
            let resolved = self.resolve(doc, owner)?;
            self.bind_new(doc, owner, &resolved)?;
        }
        InstanceBinding::load(doc, owner)?.ok_or(KernelError::Unbound(owner))
    }

    /// Bring an owner up to date with its template's current fingerprint
    ///
    /// # Errors
    /// Template, build or host errors
    pub fn refresh(&self, doc: &mut dyn HostDocument, owner: OwnerId) -> Result<RefreshOutcome, KernelError> {
        let resolved = self.resolve(doc, owner)?;
        let Some(record) = doc.binding(owner)? else {
            self.bind_new(doc, owner, &resolved)?;
            return Ok(RefreshOutcome::Initialized);
        };

        if record.mode != resolved.mode || record.template != resolved.template {
            info!(
                %owner,
                template = %resolved.template,
                from = ?record.mode,
                to = ?resolved.mode,
                "binding mode changed, rebinding"
            );
            self.release_record(doc, owner, &record)?;
            self.bind_new(doc, owner, &resolved)?;
            return Ok(RefreshOutcome::Rebound);
        }

        match resolved.mode {
            BindingMode::Exclusive => {
                let binding = InstanceBinding { owner, record };
                let container_alive = doc.contains_container(binding.record.container);
                if container_alive && !binding.is_stale(resolved.fingerprint) {
                    return Ok(RefreshOutcome::Current);
                }
                if container_alive {
                    self.builder
                        .materialize(doc, binding.record.container, &resolved.definition)?;
                    doc.set_binding(
                        owner,
                        Some(resolved.record(binding.record.container, resolved.fingerprint)),
                    )?;
                } else {
                    let instance = self
                        .builder
                        .instantiate(doc, &resolved.template, &resolved.definition)?;
                    doc.set_binding(owner, Some(resolved.record(instance.container, resolved.fingerprint)))?;
                }
                self.events.record(
                    owner,
                    &resolved.template,
                    EventKind::Materialized,
                    format!("rebuilt from {}", binding.record.hash.short()),
                );
                Ok(RefreshOutcome::Rebuilt)
            }
            BindingMode::Shared => {
                let instance = self
                    .shared
                    .adopt(doc, self.builder, resolved.request(), owner, &record)?;
                let updated = resolved.record(instance.container, instance.hash);
                let outcome = if instance.built {
                    self.events.record(
                        owner,
                        &resolved.template,
                        EventKind::Materialized,
                        format!("shared instance rebuilt from {}", record.hash.short()),
                    );
                    RefreshOutcome::Rebuilt
                } else if updated != record {
                    RefreshOutcome::Relinked
                } else {
                    RefreshOutcome::Current
                };
                if updated != record {
                    doc.set_binding(owner, Some(updated))?;
                }
                Ok(outcome)
            }
        }
    }

    /// Force a rebuild of an owner's instance regardless of its fingerprint
    ///
    /// # Errors
    /// [`KernelError::Unbound`] if the owner was never materialized, otherwise
    /// template, build or host errors
    pub fn rebuild(&self, doc: &mut dyn HostDocument, owner: OwnerId) -> Result<InstanceBinding, KernelError> {
        let record = doc.binding(owner)?.ok_or(KernelError::Unbound(owner))?;
        let resolved = self.resolve(doc, owner)?;
        if record.mode != resolved.mode {
            self.refresh(doc, owner)?;
            return InstanceBinding::load(doc, owner)?.ok_or(KernelError::Unbound(owner));
        }

        match resolved.mode {
            BindingMode::Exclusive if doc.contains_container(record.container) => {
                self.builder
                    .materialize(doc, record.container, &resolved.definition)?;
                doc.set_binding(owner, Some(resolved.record(record.container, resolved.fingerprint)))?;
            }
            BindingMode::Exclusive => {
                let instance = self
                    .builder
                    .instantiate(doc, &resolved.template, &resolved.definition)?;
                doc.set_binding(owner, Some(resolved.record(instance.container, resolved.fingerprint)))?;
            }
            BindingMode::Shared => {
                let instance = self
                    .shared
                    .rebuild(doc, self.builder, resolved.request(), owner, &record)?;
                doc.set_binding(owner, Some(resolved.record(instance.container, instance.hash)))?;
            }
        }
        self.events
            .record(owner, &resolved.template, EventKind::Materialized, "forced rebuild");
        debug!(%owner, template = %resolved.template, "forced rebuild");
        InstanceBinding::load(doc, owner)?.ok_or(KernelError::Unbound(owner))
    }

    /// Give `target` a copy of `source`'s binding (copy hook)
    ///
    /// Exclusive owners get a deep copy of the container; shared owners get
    /// the same reference and hash as the source.
    ///
    /// # Errors
    /// [`KernelError::Unbound`] if `source` was never materialized, otherwise
    /// template, build or host errors
    pub fn copy(
        &self,
        doc: &mut dyn HostDocument,
        source: OwnerId,
        target: OwnerId,
    ) -> Result<InstanceBinding, KernelError> {
        let record = doc.binding(source)?.ok_or(KernelError::Unbound(source))?;
        if let Some(previous) = doc.binding(target)? {
            self.release_record(doc, target, &previous)?;
        }

        let copied = match record.mode {
            BindingMode::Exclusive => BindingRecord {
                container: doc.copy_container(record.container)?,
                ..record.clone()
            },
            BindingMode::Shared => {
                let resolved = self.resolve(doc, source)?;
                let instance = self.shared.share(
                    doc,
                    self.builder,
                    resolved.request(),
                    (source, &record),
                    target,
                )?;
                let shared = BindingRecord {
                    container: instance.container,
                    hash: instance.hash,
                    ..record.clone()
                };
                // adopting on a miss may have rebuilt or replaced the source's container
                if shared != record {
                    doc.set_binding(source, Some(shared.clone()))?;
                }
                shared
            }
        };
        doc.set_binding(target, Some(copied.clone()))?;
        self.events.record(
            target,
            &record.template,
            EventKind::Copied,
            format!("from {source} ({:?})", record.mode),
        );
        debug!(%source, %target, template = %record.template, mode = ?record.mode, "copied binding");
        Ok(InstanceBinding {
            owner: target,
            record: copied,
        })
    }

    /// Detach an owner from its instance (destroy hook)
    ///
    /// # Errors
    /// Host errors
    pub fn release(&self, doc: &mut dyn HostDocument, owner: OwnerId) -> Result<ReleaseOutcome, KernelError> {
        match doc.binding(owner)? {
            Some(record) => self.release_record(doc, owner, &record),
            None => Ok(ReleaseOutcome::NotBound),
        }
    }

    fn resolve(&self, doc: &dyn HostDocument, owner: OwnerId) -> Result<Resolved, KernelError> {
        let template = doc.owner_template(owner)?;
        let entry = self.registry.entry(&template)?;
        let (definition, fingerprint) = entry.checked_definition()?;
        Ok(Resolved {
            template,
            mode: entry.mode(),
            definition,
            fingerprint,
        })
    }

    fn bind_new(&self, doc: &mut dyn HostDocument, owner: OwnerId, resolved: &Resolved) -> Result<(), KernelError> {
        let record = match resolved.mode {
            BindingMode::Exclusive => {
                let instance = self
                    .builder
                    .instantiate(doc, &resolved.template, &resolved.definition)?;
                self.events.record(
                    owner,
                    &resolved.template,
                    EventKind::Materialized,
                    format!("exclusive instance {}", resolved.fingerprint.short()),
                );
                resolved.record(instance.container, resolved.fingerprint)
            }
            BindingMode::Shared => {
                let instance = self
                    .shared
                    .acquire(doc, self.builder, resolved.request(), owner)?;
                if instance.built {
                    self.events.record(
                        owner,
                        &resolved.template,
                        EventKind::Materialized,
                        format!("shared instance {}", instance.hash.short()),
                    );
                }
                resolved.record(instance.container, instance.hash)
            }
        };
        doc.set_binding(owner, Some(record.clone()))?;
        self.events.record(
            owner,
            &resolved.template,
            EventKind::Bound,
            format!("{:?} {}", record.mode, record.container),
        );
        debug!(%owner, template = %resolved.template, container = %record.container, mode = ?record.mode, "bound owner");
        Ok(())
    }

    fn release_record(
        &self,
        doc: &mut dyn HostDocument,
        owner: OwnerId,
        record: &BindingRecord,
    ) -> Result<ReleaseOutcome, KernelError> {
        doc.set_binding(owner, None)?;
        let outcome = match record.mode {
            BindingMode::Exclusive => {
                if !doc.contains_container(record.container) {
                    ReleaseOutcome::Detached { remaining: 0 }
                } else {
                    let users = doc.container_users(record.container)?;
                    if users == 0 {
                        doc.remove_container(record.container)?;
                        ReleaseOutcome::Destroyed
                    } else {
                        ReleaseOutcome::Detached { remaining: users }
                    }
                }
            }
            BindingMode::Shared => match self.shared.release(doc, &record.template, owner)? {
                SharedRelease::Destroyed => ReleaseOutcome::Destroyed,
                SharedRelease::Detached { remaining } => ReleaseOutcome::Detached { remaining },
                SharedRelease::NotHeld => {
                    // never adopted in this session; the host's count decides
                    let users = if doc.contains_container(record.container) {
                        doc.container_users(record.container)?
                    } else {
                        0
                    };
                    if users == 0 && doc.contains_container(record.container) {
                        doc.remove_container(record.container)?;
                        ReleaseOutcome::Destroyed
                    } else {
                        ReleaseOutcome::Detached { remaining: users }
                    }
                }
            },
        };

        let kind = match outcome {
            ReleaseOutcome::Destroyed => EventKind::Destroyed,
            _ => EventKind::Released,
        };
        self.events
            .record(owner, &record.template, kind, format!("{:?} {}", record.mode, record.container));
        debug!(%owner, template = %record.template, ?outcome, "released owner");
        Ok(outcome)
    }
}
