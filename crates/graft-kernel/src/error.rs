use graft_host::{HostError, OwnerId};
use graft_template::{DefinitionError, SlotRef, TemplateError};

/// Failure to materialize a definition
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// A slot could not be resolved while wiring the graph
    #[error("link error at node '{node}', slot {slot}: {reason}")]
    Link {
        node: String,
        slot: SlotRef,
        reason: String,
    },

    #[error("host error: {0}")]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    #[error("event log integrity violation at sequence {sequence}")]
    IntegrityViolation { sequence: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("invalid config: {0}")]
    Parse(String),
}

/// Any kernel error
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("host error: {0}")]
    Host(#[from] HostError),

    #[error("log error: {0}")]
    Log(#[from] LogError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The owner has never been materialized
    #[error("owner {0} has no template instance")]
    Unbound(OwnerId),

    /// Migration of one owner failed during a scan
    #[error("migration of owner {owner} failed: {source}")]
    OwnerMigration {
        owner: OwnerId,
        #[source]
        source: Box<KernelError>,
    },
}

impl KernelError {
    /// Owner the error concerns, if any
    pub fn owner(&self) -> Option<OwnerId> {
        match self {
            KernelError::Unbound(owner) | KernelError::OwnerMigration { owner, .. } => Some(*owner),
            _ => None,
        }
    }

    /// Error with any [`KernelError::OwnerMigration`] wrapping removed
    pub fn root(&self) -> &KernelError {
        match self {
            KernelError::OwnerMigration { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the error comes from a malformed or dangling definition
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self.root(),
            KernelError::Template(TemplateError::Definition { .. })
                | KernelError::Build(BuildError::Definition(_))
        )
    }
}
