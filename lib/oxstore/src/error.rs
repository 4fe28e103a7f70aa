use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::PoisonError;

/// An error related to storage operations (reads, writes, log replay...).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// Error from the OS I/O layer.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Error related to data corruption.
    #[error(transparent)]
    Corruption(#[from] CorruptionError),
    /// The store directory is already opened by another store.
    #[error("The store directory {} is already in use by another store", .0.display())]
    Locked(PathBuf),
    #[doc(hidden)]
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync + 'static>),
}

impl From<StorageError> for io::Error {
    #[inline]
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Io(error) => error,
            StorageError::Corruption(error) => error.into(),
            error @ StorageError::Locked(_) => Self::new(io::ErrorKind::WouldBlock, error),
            StorageError::Other(error) => Self::other(error),
        }
    }
}

/// An error return if some content in the store is corrupted.
#[derive(Debug, thiserror::Error)]
pub enum CorruptionError {
    #[error("{0}")]
    Msg(String),
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync + 'static>),
}

impl CorruptionError {
    /// Builds an error from another error.
    #[inline]
    pub(crate) fn new(error: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self::Other(error.into())
    }

    /// Builds an error from a printable error message.
    #[inline]
    pub(crate) fn msg(msg: impl Into<String>) -> Self {
        Self::Msg(msg.into())
    }
}

impl From<CorruptionError> for io::Error {
    #[inline]
    fn from(error: CorruptionError) -> Self {
        Self::new(io::ErrorKind::InvalidData, error)
    }
}

/// An error raised by a [`Connection`](crate::Connection) used out of its transaction protocol.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransactionError {
    /// A write was attempted without an active transaction.
    #[error("No transaction is active on this connection")]
    NotActive,
    /// [`Connection::begin`](crate::Connection::begin) was called while a transaction is already active.
    #[error("A transaction is already active on this connection")]
    AlreadyActive,
    /// The underlying storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<CorruptionError> for TransactionError {
    #[inline]
    fn from(error: CorruptionError) -> Self {
        Self::Storage(error.into())
    }
}

/// An error raised during the evaluation of a [`GraphPattern`](oxalgebra::GraphPattern).
///
/// Expression type errors are not reported here: they reject the current row of a filter
/// or leave a variable unbound.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EvaluationError {
    /// The underlying storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The evaluation deadline has been exceeded.
    #[error("The evaluation has been cancelled because its deadline was exceeded")]
    Cancelled,
    /// The algebra tree is malformed.
    #[error("Invalid graph pattern: {0}")]
    InvalidPattern(String),
}

impl From<CorruptionError> for EvaluationError {
    #[inline]
    fn from(error: CorruptionError) -> Self {
        Self::Storage(error.into())
    }
}

impl From<EvaluationError> for io::Error {
    #[inline]
    fn from(error: EvaluationError) -> Self {
        match error {
            EvaluationError::Storage(error) => error.into(),
            EvaluationError::Cancelled => Self::new(io::ErrorKind::TimedOut, error.to_string()),
            EvaluationError::InvalidPattern(_) => {
                Self::new(io::ErrorKind::InvalidInput, error.to_string())
            }
        }
    }
}

pub(crate) fn poison_corruption_error<T>(_: PoisonError<T>) -> CorruptionError {
    CorruptionError::msg("Mutex poisoned")
}
