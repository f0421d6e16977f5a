//! Error types shared across the daemon.

use crate::store::PrefField;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A set carried a value outside the field's allowed range. The
    /// request is dropped without touching stored state.
    #[error("invalid value {value} for {field}")]
    InvalidValue { field: PrefField, value: i64 },

    /// I/O failure reading or writing the preference file. Transient for
    /// the scheduler (retried next tick); fatal only at startup.
    #[error("preference store I/O: {0}")]
    Store(#[source] std::io::Error),

    /// The preference file exists but does not parse.
    #[error("preference store encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Unknown verb, or a missing/non-numeric argument. The connection is
    /// closed without a reply.
    #[error("malformed command")]
    MalformedCommand,

    #[error("invalid configuration: {0}")]
    Config(String),
}
