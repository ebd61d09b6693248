//! Error types surfaced by the placement index.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("site {group_id} does not exist")]
    SiteNotFound { group_id: u64 },

    #[error(
        "association for group {group_id} layout {layout_id} portlet {portlet_id} article {article_id:?} already exists as row {existing_id}"
    )]
    DuplicateAssociation {
        group_id: u64,
        layout_id: u64,
        portlet_id: String,
        article_id: String,
        existing_id: u64,
    },

    #[error("extractor registry has not been opened")]
    RegistryNotOpen,

    #[error("extractor registry is closed")]
    RegistryClosed,

    #[error("invalid options: {reason}")]
    InvalidOptions { reason: String },

    #[error("journal corruption at offset {offset}: {reason}")]
    JournalCorruption { offset: u64, reason: String },

    #[error("invalid journal header: {reason}")]
    InvalidJournalHeader { reason: String },

    #[error("lock error: {0}")]
    Lock(String),

    #[error("{source_name} failed: {reason}")]
    Source {
        source_name: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] bincode::error::EncodeError),

    #[error(transparent)]
    Decode(#[from] bincode::error::DecodeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl IndexError {
    /// Convenience constructor for failures reported by an external collaborator.
    pub fn source(source_name: &'static str, reason: impl Into<String>) -> Self {
        Self::Source {
            source_name,
            reason: reason.into(),
        }
    }
}
