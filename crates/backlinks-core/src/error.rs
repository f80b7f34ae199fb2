use crate::types::ItemId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BacklinksError>;

#[derive(Debug, Error)]
pub enum BacklinksError {
    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage operation error: {0}")]
    StorageOperation(#[from] redb::StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Invalid edge label '{label}' in taxonomy '{taxonomy}'")]
    InvalidLabel { taxonomy: String, label: String },

    #[error("Unknown taxonomy: {0}")]
    UnknownTaxonomy(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl BacklinksError {
    /// True when the failure came from a collaborator (tag store, metadata
    /// store, scheduler) rather than from bad input. Callers may retry these.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            BacklinksError::Storage(_)
                | BacklinksError::Database(_)
                | BacklinksError::Table(_)
                | BacklinksError::Transaction(_)
                | BacklinksError::Commit(_)
                | BacklinksError::StorageOperation(_)
                | BacklinksError::Serialization(_)
        )
    }
}
