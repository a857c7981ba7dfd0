//! Lifecycle event log and tracing setup
//!
//! Every materialization, bind, copy, release and migration is appended to a
//! hash-chained [`EventLog`]; each event commits to its predecessor's hash so
//! that tampering with history is detectable by [`EventLog::verify_integrity`].

use crate::error::LogError;
use graft_host::OwnerId;
use graft_template::TemplateId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A template was built into a container
    Materialized,
    /// An owner was bound to an instance
    Bound,
    Copied,
    /// An owner detached from an instance that is still in use
    Released,
    /// An instance container was removed
    Destroyed,
    /// A stale owner was brought up to date
    Migrated,
}

impl EventKind {
    const fn as_u8(self) -> u8 {
        match self {
            EventKind::Materialized => 0,
            EventKind::Bound => 1,
            EventKind::Copied => 2,
            EventKind::Released => 3,
            EventKind::Destroyed => 4,
            EventKind::Migrated => 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub sequence: u64,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub owner: OwnerId,
    pub template: TemplateId,
    pub kind: EventKind,
    pub detail: String,
    pub prev_hash: [u8; 32],
    pub hash: [u8; 32],
}

#[derive(Debug, Default)]
pub struct EventLog {
    inner: Mutex<Vec<Event>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and return its sequence number
    pub fn record(
        &self,
        owner: OwnerId,
        template: &TemplateId,
        kind: EventKind,
        detail: impl Into<String>,
    ) -> u64 {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map_or([0u8; 32], |e| e.hash);
        let mut event = Event {
            sequence: guard.len() as u64,
            timestamp: now_millis(),
            owner,
            template: template.clone(),
            kind,
            detail: detail.into(),
            prev_hash,
            hash: [0u8; 32],
        };
        event.hash = compute_hash(&event);
        let sequence = event.sequence;
        guard.push(event);
        sequence
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.lock().clone()
    }

    /// Events of one owner, in order
    pub fn events_for(&self, owner: OwnerId) -> Vec<Event> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.owner == owner)
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.inner.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Take every event out of the log; the next event starts a new chain
    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.inner.lock())
    }

    /// Check the hash chain from the first event
    ///
    /// # Errors
    /// [`LogError::IntegrityViolation`] naming the first broken event
    pub fn verify_integrity(&self) -> Result<(), LogError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for e in guard.iter() {
            if e.prev_hash != prev || e.hash != compute_hash(e) {
                return Err(LogError::IntegrityViolation { sequence: e.sequence });
            }
            prev = e.hash;
        }
        Ok(())
    }

    #[cfg(test)]
    fn tamper(&self, index: usize, detail: &str) {
        if let Some(e) = self.inner.lock().get_mut(index) {
            e.detail = detail.to_string();
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn compute_hash(event: &Event) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(event.sequence.to_le_bytes());
    hasher.update(event.timestamp.to_le_bytes());
    hasher.update(event.owner.0.as_bytes());
    hasher.update(event.template.as_str().as_bytes());
    hasher.update([0]);
    hasher.update([event.kind.as_u8()]);
    hasher.update(event.detail.as_bytes());
    hasher.update([0]);
    hasher.update(event.prev_hash);
    hasher.finalize().into()
}

/// Install a fmt subscriber filtered by `RUST_LOG`, defaulting to `info`
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_links_events() {
        let log = EventLog::new();
        let owner = OwnerId::new();
        let template = TemplateId::new("double");
        assert_eq!(log.record(owner, &template, EventKind::Materialized, "built"), 0);
        assert_eq!(log.record(owner, &template, EventKind::Bound, "exclusive"), 1);

        let events = log.events();
        assert_eq!(events[0].prev_hash, [0u8; 32]);
        assert_eq!(events[1].prev_hash, events[0].hash);
        assert!(log.verify_integrity().is_ok());
        assert_eq!(log.count(EventKind::Bound), 1);
        assert_eq!(log.events_for(owner).len(), 2);
    }

    #[test]
    fn drain_starts_a_new_chain() {
        let log = EventLog::new();
        let owner = OwnerId::new();
        let template = TemplateId::new("double");
        log.record(owner, &template, EventKind::Bound, "exclusive");
        log.record(owner, &template, EventKind::Released, "exclusive");

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert!(log.is_empty());
        assert_eq!(log.record(owner, &template, EventKind::Bound, "shared"), 0);
        assert_eq!(log.events()[0].prev_hash, [0u8; 32]);
        assert!(log.verify_integrity().is_ok());
    }

    #[test]
    fn tampering_detected() {
        let log = EventLog::new();
        let owner = OwnerId::new();
        let template = TemplateId::new("double");
        log.record(owner, &template, EventKind::Bound, "exclusive");
        log.record(owner, &template, EventKind::Migrated, "rebuilt");
        log.tamper(0, "shared");
        assert_eq!(
            log.verify_integrity(),
            Err(LogError::IntegrityViolation { sequence: 0 })
        );
    }
}
