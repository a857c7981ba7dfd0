//! Host hooks facade
//!
//! [`TemplateKernel`] is created explicitly when the host registers the
//! template types and torn down with [`TemplateKernel::shutdown`]. Each
//! public method corresponds to one host event.

use crate::binding::{Binder, InstanceBinding, ReleaseOutcome};
use crate::builder::GraphBuilder;
use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::logging::{Event, EventLog};
use crate::presentation::{property_listing, PropertyLine};
use crate::scanner::{MigrationReport, MigrationScanner};
use crate::shared::SharedInstanceRegistry;
use graft_host::{HostDocument, OwnerId};
use graft_template::TemplateRegistry;
use std::sync::Arc;
use tracing::{debug, info};

/// Template machinery for one host session
#[derive(Debug)]
pub struct TemplateKernel {
    config: KernelConfig,
    registry: Arc<TemplateRegistry>,
    shared: SharedInstanceRegistry,
    builder: GraphBuilder,
    event_log: EventLog,
}

impl TemplateKernel {
    /// Create a kernel with default configuration and an empty registry
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    /// Create a kernel with custom configuration and an empty registry
    pub fn with_config(config: KernelConfig) -> Self {
        Self::with_registry(config, Arc::new(TemplateRegistry::new()))
    }

    /// Create a kernel over an existing template registry
    pub fn with_registry(config: KernelConfig, registry: Arc<TemplateRegistry>) -> Self {
        let builder = GraphBuilder::from_config(&config);
        Self {
            shared: SharedInstanceRegistry::with_owner_marker(config.owner_marker.clone()),
            config,
            registry,
            builder,
            event_log: EventLog::new(),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    pub fn shared(&self) -> &SharedInstanceRegistry {
        &self.shared
    }

    pub fn events(&self) -> &EventLog {
        &self.event_log
    }

    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    pub fn binder(&self) -> Binder<'_> {
        Binder::new(&self.registry, &self.shared, &self.builder, &self.event_log)
    }

    pub fn scanner(&self) -> MigrationScanner<'_> {
        MigrationScanner::new(
            self.binder(),
            &self.event_log,
            &self.config.owner_marker,
            self.config.scan_policy,
        )
    }

    /// Document load hook: migrate every stale owner
    ///
    /// # Errors
    /// As [`MigrationScanner::scan_and_migrate`]
    pub fn on_document_load(&self, doc: &mut dyn HostDocument) -> Result<MigrationReport, KernelError> {
        self.scanner().scan_and_migrate(doc)
    }

    /// Owner creation hook: first materialization
    ///
    /// # Errors
    /// As [`Binder::bind`]
    pub fn initialize_owner(&self, doc: &mut dyn HostDocument, owner: OwnerId) -> Result<InstanceBinding, KernelError> {
        self.binder().bind(doc, owner)
    }

    /// Owner copy hook
    ///
    /// # Errors
    /// As [`Binder::copy`]
    pub fn copy_owner(
        &self,
        doc: &mut dyn HostDocument,
        source: OwnerId,
        target: OwnerId,
    ) -> Result<InstanceBinding, KernelError> {
        self.binder().copy(doc, source, target)
    }

    /// Owner destruction hook
    ///
    /// # Errors
    /// As [`Binder::release`]
    pub fn destroy_owner(&self, doc: &mut dyn HostDocument, owner: OwnerId) -> Result<ReleaseOutcome, KernelError> {
        self.binder().release(doc, owner)
    }

    /// Explicit rebuild request for one owner
    ///
    /// # Errors
    /// As [`Binder::rebuild`]
    pub fn rebuild_owner(&self, doc: &mut dyn HostDocument, owner: OwnerId) -> Result<InstanceBinding, KernelError> {
        self.binder().rebuild(doc, owner)
    }

    /// Whether an owner's instance was built from an outdated definition
    ///
    /// # Errors
    /// [`KernelError::Unbound`] if the owner was never materialized
    pub fn is_stale(&self, doc: &dyn HostDocument, owner: OwnerId) -> Result<bool, KernelError> {
        let binding = InstanceBinding::load(doc, owner)?.ok_or(KernelError::Unbound(owner))?;
        Ok(binding.is_stale(self.binder().fingerprint_of(doc, owner)?))
    }

    /// Editable runtime properties of an owner, for display
    ///
    /// # Errors
    /// [`KernelError::Host`] if the owner does not exist
    pub fn property_listing(&self, doc: &dyn HostDocument, owner: OwnerId) -> Result<Vec<PropertyLine>, KernelError> {
        let properties = doc.owner_properties(owner)?;
        debug!(%owner, properties = properties.len(), "listing owner properties");
        Ok(property_listing(&properties))
    }

    /// Unregistration: drop shared-instance bookkeeping and the session's
    /// event history, leave the document alone
    ///
    /// Returns the drained events.
    pub fn shutdown(&self) -> Vec<Event> {
        info!(shared = self.shared.len(), events = self.event_log.len(), "shutting down template kernel");
        self.shared.teardown();
        self.event_log.drain()
    }
}

impl Default for TemplateKernel {
    fn default() -> Self {
        Self::new()
    }
}
