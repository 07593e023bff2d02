use crate::value::Value;
use std::sync::PoisonError;

/// Raised by a single validator; the field layer wraps it into [`ValidationError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValueMismatch {
    pub message: String,
}

impl ValueMismatch {
    pub fn new(message: impl Into<String>) -> Self {
        ValueMismatch { message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid value for {field_name}={}; {cause}.", .value.repr())]
pub struct ValidationError {
    pub field_name: String,
    pub value: Value,
    #[source]
    pub cause: ValueMismatch,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Type {0} is not supported yet!")]
    UnsupportedType(String),

    #[error("Empty model is not allowed.")]
    EmptyModel,

    #[error("{0}")]
    UnnecessaryParams(String),

    #[error("{0} is required")]
    MissingField(String),

    #[error("No fields provided")]
    MissingFields,

    #[error("Database headers are not equal: '{stored}' != '{computed}'")]
    SchemaMismatch { stored: String, computed: String },

    #[error("{0}")]
    DoesNotExist(String),

    #[error("{0} is read-only")]
    ReadOnlyField(String),

    #[error("{0}")]
    RiskOfReturningMultipleObjects(String),

    #[error("default and default_factory are mutually exclusive")]
    ConflictingDefaults,

    #[error("{0} is reserved for the primary key")]
    ReservedField(String),

    #[error("{0} is declared more than once")]
    DuplicateField(String),

    #[error("Invalid model config: {0}")]
    InvalidConfig(String),

    #[error("{0} is not a declared field")]
    UnknownField(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Store busy: {0}")]
    StoreBusy(String),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serde error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl<T> From<PoisonError<T>> for AppError {
    fn from(err: PoisonError<T>) -> Self {
        AppError::Custom(err.to_string())
    }
}
