use thiserror::Error;

/// A specialized `Result` type for column-generation operations.
pub type Result<T> = std::result::Result<T, Retcode>;

/// The error type surfaced by the column-generation core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Retcode {
    /// The method was called with inconsistent input data, e.g. a column that
    /// is not a member of the pool it should be deleted from.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The requested code path is not implemented, e.g. the coefficient of a
    /// row-backed extended master constraint without a known payload.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// The growth policy would exceed the host's memory limit.
    #[error("capacity of {requested} entries exceeds the limit of {limit}")]
    CapacityReached {
        /// Number of entries that was requested.
        requested: usize,
        /// Maximal number of entries the host allows.
        limit: usize,
    },
}

impl Retcode {
    /// Creates an invalid-data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Retcode::InvalidData(msg.into())
    }
}
