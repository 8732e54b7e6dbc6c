use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `add_node` was called for a node that is already a member.
    #[error("Node already in ring: {0}")]
    DuplicateNode(String),

    /// `remove_node` was called for a node that is not a member.
    #[error("Node not in ring: {0}")]
    UnknownNode(String),

    /// A key was routed while the ring had no members.
    #[error("Ring has no members")]
    EmptyRing,

    #[error("Replication factor must be between 1 and 65536, got {0}")]
    InvalidReplicationFactor(u32),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn duplicate_node(node: &[u8]) -> Self {
        Self::DuplicateNode(String::from_utf8_lossy(node).into_owned())
    }

    pub(crate) fn unknown_node(node: &[u8]) -> Self {
        Self::UnknownNode(String::from_utf8_lossy(node).into_owned())
    }
}

/// Result type for ring operations
pub type Result<T> = std::result::Result<T, Error>;
