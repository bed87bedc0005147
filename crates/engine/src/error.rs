use thiserror::Error;

/// The error taxonomy of the database engine.
///
/// Every fallible operation resolves to exactly one of these values; the
/// handle additionally records the value in its last-error slot (see
/// [`Database::last_error`](crate::Database::last_error)), which is reset to
/// [`Error::NoError`] on entry to any operation that can set it.
///
/// A few variants exist for API parity with the on-disk format's origin and
/// are not raised by this implementation (`DatabaseAlreadyOpened` is
/// structurally impossible with owning constructors; `NoRecord`,
/// `SizeMismatch` and `TooManyRecords` have no triggering condition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("database already exists")]
    DatabaseAlreadyExist,
    #[error("database already opened")]
    DatabaseAlreadyOpened,
    #[error("database i/o error")]
    DatabaseIo,
    #[error("empty database")]
    EmptyDatabase,
    #[error("entry not found")]
    EntryNotFound,
    #[error("index corrupt")]
    IndexCorrupt,
    #[error("invalid database")]
    InvalidDatabase,
    #[error("invalid record index")]
    InvalidIndex,
    #[error("invalid search key")]
    InvalidKey,
    #[error("invalid key descriptor")]
    InvalidKeyDescriptor,
    #[error("invalid parameters")]
    InvalidParameters,
    #[error("invalid key id")]
    InvalidKeyIndex,
    #[error("memory allocation limit exceeded")]
    MemoryAllocation,
    #[error("no database")]
    NoDatabase,
    #[error("no error")]
    NoError,
    #[error("no record")]
    NoRecord,
    #[error("record too large")]
    RecordTooLarge,
    #[error("record too small")]
    RecordTooSmall,
    #[error("size mismatch")]
    SizeMismatch,
    #[error("too many records")]
    TooManyRecords,
}

pub type Result<T> = std::result::Result<T, Error>;
