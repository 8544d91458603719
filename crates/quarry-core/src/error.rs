//! Error types for all DDL operations.

use std::io;
use thiserror::Error;

use crate::types::TableId;

/// Top-level error type for DDL operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tablet(#[from] TabletError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("DDL operator is not initialized")]
    NotReady,

    /// The schema record is gone but its tablets could not be removed.
    #[error("table {table_id} dropped but its tablets were not deleted: {source}")]
    OrphanedTablets {
        table_id: TableId,
        #[source]
        source: TabletError,
    },
}

/// Failures reported by a schema store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupted catalog: {0}")]
    Corrupted(String),

    #[error("catalog file is locked")]
    FileLocked,

    #[error("schema store unavailable: {0}")]
    Unavailable(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("table id {0} is already in use")]
    TableIdInUse(TableId),

    #[error("schema version conflict: expected {expected}, actual {actual}")]
    VersionConflict { expected: u64, actual: u64 },
}

/// Failures reported by a tablet bootstrapper.
#[derive(Debug, Error)]
pub enum TabletError {
    #[error("no storage node available for table {0}")]
    NoStorageNode(TableId),

    #[error("tablet operation failed: {0}")]
    Failed(String),
}

/// Rejected requests: bad ids, identity conflicts, policy violations.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("user table id must be greater than {min}, got {candidate}")]
    TableIdBelowMinimum { candidate: TableId, min: TableId },

    #[error("table ids exhausted (max used table id is {max_used})")]
    TableIdExhausted { max_used: TableId },

    #[error("table id {requested} has not been reserved (max used table id is {max_used})")]
    TableIdNotReserved { requested: TableId, max_used: TableId },

    #[error("table id {table_id} is already used by '{table_name}'")]
    TableIdAlreadyReserved { table_id: TableId, table_name: String },

    #[error("table {table_id} is a system table and cannot be altered")]
    SystemTable { table_id: TableId },

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("max used column id {max_used} of '{table}' is below the minimum {min}")]
    ColumnIdBelowMinimum { table: String, max_used: u64, min: u64 },

    #[error("column already exists: {0}")]
    ColumnAlreadyExists(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("column '{0}' is changed more than once in one alter request")]
    ColumnChangedTwice(String),

    #[error("modifying existing column '{0}' is not supported")]
    ColumnModifyUnsupported(String),

    #[error("column '{column}': {reason}")]
    OperationNotAllowed { column: String, reason: &'static str },
}

/// A write was accepted but reading it back did not confirm it.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("max used table id re-read as {actual} after writing {expected}")]
    MaxTableIdMismatch { expected: TableId, actual: TableId },

    #[error("table {table_id} reads back as {actual:?}, expected '{expected}'")]
    NameMismatch {
        table_id: TableId,
        expected: String,
        actual: Option<String>,
    },

    #[error("table '{table_name}' resolves to id {actual}, expected {expected}")]
    IdMismatch {
        table_name: String,
        expected: TableId,
        actual: TableId,
    },

    #[error("table '{table_name}' not discoverable by name after {attempts} attempts")]
    NotDiscoverable { table_name: String, attempts: u32 },

    #[error("table '{table_name}' still resolves to id {table_id} after drop")]
    StillPresent { table_name: String, table_id: TableId },

    /// The verification read itself failed: the outcome of the write is unknown.
    #[error("verification read for '{table_name}' failed, manual check required: {source}")]
    ManualCheckRequired {
        table_name: String,
        #[source]
        source: StoreError,
    },
}

/// Coarse classification callers react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotReady,
    InvalidRequest,
    AlreadyExists,
    NotFound,
    OperationNotAllowed,
    IdAlreadyReserved,
    VersionConflict,
    /// Store state contradicts a write that was just made; needs operator attention.
    ConsistencyViolation,
    /// Existence of the entity is unknown and must be reconciled out of band.
    ManualCheckRequired,
    StoreFailure,
    TabletFailure,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotReady => ErrorKind::NotReady,
            Error::Store(e) => e.kind(),
            Error::Tablet(_) | Error::OrphanedTablets { .. } => ErrorKind::TabletFailure,
            Error::Schema(e) => e.kind(),
            Error::Verify(VerifyError::ManualCheckRequired { .. }) => {
                ErrorKind::ManualCheckRequired
            }
            Error::Verify(_) => ErrorKind::ConsistencyViolation,
        }
    }
}

impl StoreError {
    /// Whether the store may have applied the write despite reporting this
    /// error. Every other error is a definite rejection.
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Unavailable(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::TableNotFound(_) => ErrorKind::NotFound,
            StoreError::TableAlreadyExists(_) => ErrorKind::AlreadyExists,
            StoreError::TableIdInUse(_) => ErrorKind::IdAlreadyReserved,
            StoreError::VersionConflict { .. } => ErrorKind::VersionConflict,
            StoreError::Io(_)
            | StoreError::Corrupted(_)
            | StoreError::FileLocked
            | StoreError::Unavailable(_) => ErrorKind::StoreFailure,
        }
    }
}

impl SchemaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchemaError::TableIdBelowMinimum { .. }
            | SchemaError::TableIdExhausted { .. }
            | SchemaError::TableIdNotReserved { .. }
            | SchemaError::SystemTable { .. }
            | SchemaError::ColumnIdBelowMinimum { .. }
            | SchemaError::ColumnChangedTwice(_)
            | SchemaError::ColumnModifyUnsupported(_) => ErrorKind::InvalidRequest,
            SchemaError::TableIdAlreadyReserved { .. } => ErrorKind::IdAlreadyReserved,
            SchemaError::TableNotFound(_) | SchemaError::ColumnNotFound(_) => ErrorKind::NotFound,
            SchemaError::ColumnAlreadyExists(_) => ErrorKind::AlreadyExists,
            SchemaError::OperationNotAllowed { .. } => ErrorKind::OperationNotAllowed,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
