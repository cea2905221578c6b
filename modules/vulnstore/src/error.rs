use sea_orm::DbErr;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] DbErr),

    /// A referenced update operation does not exist.
    #[error("update operation not found: {0}")]
    OperationNotFound(Uuid),

    /// The current side of a diff was the nil ref.
    #[error("the current side of a diff must be a non-nil ref")]
    InvalidEndpoint,

    /// An index record that cannot be queried, e.g. an empty package name.
    #[error("invalid index record: {0:?}")]
    InvalidRecord(String),

    /// A constraint name outside the supported enumeration. This is a
    /// configuration error, not a data error.
    #[error("unknown match constraint: {0:?}")]
    UnknownConstraint(String),

    #[error("query batch deadline exceeded")]
    Deadline(#[from] tokio::time::error::Elapsed),

    #[error("vulnerability sweep failed: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Sweep(Vec<Error>),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
