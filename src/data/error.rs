use std::fmt;

/// Errors raised by the store and its collection engine.
///
/// Duplicate inserts, missing updates and unknown view tags are not errors;
/// they are reported through the operation outcomes instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Store configuration rejected at construction time
    InvalidConfig(String),
    /// Query document could not be parsed
    InvalidQuery(String),
    /// No record is stored under the given surrogate key
    RecordNotFound(u64),
    /// Record handed to the engine without a surrogate key
    MissingSurrogateKey,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "Invalid store configuration: {}", msg),
            Error::InvalidQuery(msg) => write!(f, "Invalid query: {}", msg),
            Error::RecordNotFound(key) => write!(f, "Record not found: {}", key),
            Error::MissingSurrogateKey => write!(f, "Record has no surrogate key"),
        }
    }
}

impl std::error::Error for Error {}
