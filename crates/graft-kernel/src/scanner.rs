//! Migration scanner
//!
//! Run once when a document is loaded: every template owner is visited in
//! document order and brought up to date before the next one is touched.

use crate::binding::{Binder, RefreshOutcome};
use crate::config::ScanPolicy;
use crate::error::KernelError;
use crate::logging::{EventKind, EventLog};
use graft_host::{HostDocument, OwnerId};
use graft_template::{Fingerprint, TemplateId};
use tracing::{info, warn};

/// What happened to one owner during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerMigration {
    pub owner: OwnerId,
    pub template: TemplateId,
    pub outcome: RefreshOutcome,
    /// Fingerprint of the instance before the scan; `None` if unbound
    pub from: Option<Fingerprint>,
    pub to: Fingerprint,
}

impl OwnerMigration {
    /// Whether the owner was changed
    pub fn changed(&self) -> bool {
        self.outcome != RefreshOutcome::Current
    }
}

/// An owner that could not be migrated under [`ScanPolicy::Continue`]
#[derive(Debug)]
pub struct OwnerFailure {
    pub owner: OwnerId,
    pub error: KernelError,
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Every successfully visited owner, in visit order
    pub owners: Vec<OwnerMigration>,
    pub failures: Vec<OwnerFailure>,
}

impl MigrationReport {
    /// Owners that were rebuilt, relinked, initialized or rebound
    pub fn migrated(&self) -> impl Iterator<Item = &OwnerMigration> {
        self.owners.iter().filter(|m| m.changed())
    }

    pub fn migrated_count(&self) -> usize {
        self.migrated().count()
    }

    pub fn visited(&self) -> usize {
        self.owners.len() + self.failures.len()
    }

    /// No owner changed and none failed
    pub fn is_noop(&self) -> bool {
        self.failures.is_empty() && self.migrated_count() == 0
    }
}

/// Walks all owners of a document and refreshes each
#[derive(Debug, Clone, Copy)]
pub struct MigrationScanner<'k> {
    binder: Binder<'k>,
    events: &'k EventLog,
    owner_marker: &'k str,
    policy: ScanPolicy,
}

impl<'k> MigrationScanner<'k> {
    pub fn new(binder: Binder<'k>, events: &'k EventLog, owner_marker: &'k str, policy: ScanPolicy) -> Self {
        Self {
            binder,
            events,
            owner_marker,
            policy,
        }
    }

    /// Refresh every owner carrying the owner marker
    ///
    /// # Errors
    /// Under [`ScanPolicy::FailFast`], the first owner failure wrapped in
    /// [`KernelError::OwnerMigration`]; owners visited before it stay migrated
    pub fn scan_and_migrate(&self, doc: &mut dyn HostDocument) -> Result<MigrationReport, KernelError> {
        let owners = doc.owners(self.owner_marker);
        info!(owners = owners.len(), policy = ?self.policy, "scanning document for stale template instances");

        let mut report = MigrationReport::default();
        for owner in owners {
            match self.migrate_owner(doc, owner) {
                Ok(migration) => report.owners.push(migration),
                Err(error) => {
                    warn!(%owner, %error, "owner migration failed");
                    match self.policy {
                        ScanPolicy::FailFast => {
                            return Err(KernelError::OwnerMigration {
                                owner,
                                source: Box::new(error),
                            })
                        }
                        ScanPolicy::Continue => report.failures.push(OwnerFailure { owner, error }),
                    }
                }
            }
        }

        info!(
            visited = report.visited(),
            migrated = report.migrated_count(),
            failed = report.failures.len(),
            "scan complete"
        );
        Ok(report)
    }

    fn migrate_owner(&self, doc: &mut dyn HostDocument, owner: OwnerId) -> Result<OwnerMigration, KernelError> {
        let from = doc.binding(owner)?.map(|record| record.hash);
        let outcome = self.binder.refresh(doc, owner)?;
        let record = doc.binding(owner)?.ok_or(KernelError::Unbound(owner))?;

        let migration = OwnerMigration {
            owner,
            template: record.template,
            outcome,
            from,
            to: record.hash,
        };
        if migration.changed() {
            let from = migration.from.map_or_else(|| "unbound".to_string(), |h| h.short());
            info!(
                %owner,
                template = %migration.template,
                outcome = ?outcome,
                %from,
                to = %migration.to.short(),
                "migrated template owner"
            );
            self.events.record(
                owner,
                &migration.template,
                EventKind::Migrated,
                format!("{outcome:?} {from} -> {}", migration.to.short()),
            );
        }
        Ok(migration)
    }
}
