use std::fmt;

/// Result type returned throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while inflating, encoding, or decoding a record.
#[derive(Debug)]
pub enum Error {
    /// Occurs when the input data doesn't line up with the schema: a repeated value handed to the
    /// scalar path, a malformed reference path, a missing required field, an unresolved enum, a
    /// missing ID/PARENT field during key reconstruction, or a non-map value where a nested record
    /// was expected.
    Decoding(String),
    /// A scalar value's runtime shape doesn't match any accepted coercion for its declared type.
    InvalidInput {
        /// Name of the field being assigned.
        field: String,
        /// Short name of the record type holding the field.
        entity: String,
        /// Kind of the value that was found.
        found: &'static str,
    },
    /// A custom dialect was requested, but nothing is registered under that identity.
    DialectNotFound(String),
    /// A custom dialect was registered twice under the same identity.
    DuplicateDialect(String),
    /// The codec was closed before this operation was attempted.
    Closed,
    /// The dialect doesn't support the requested direction (the text dialect can't decode).
    UnsupportedDialect(String),
    /// Basic wire encoding failure: truncated data, bad lengths, bad wire types, invalid UTF-8.
    BadEncode(String),
    /// Decoding hit the nesting depth limit.
    ParseLimit(String),
    /// The schema pool failed to validate when it was built.
    Schema(String),
    /// Failure in the underlying stream.
    Io(std::io::Error),
    /// Failure parsing or printing JSON.
    Json(serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_input(field: &str, entity: &str, found: &'static str) -> Self {
        Error::InvalidInput {
            field: field.to_string(),
            entity: entity.to_string(),
            found,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Decoding(ref msg) => write!(f, "Decoding failed: {}", msg),
            Error::InvalidInput {
                ref field,
                ref entity,
                found,
            } => write!(
                f,
                "Unrecognized {} value for field '{}' on entity '{}'",
                found, field, entity
            ),
            Error::DialectNotFound(ref name) => write!(f, "Dialect not found ('{}')", name),
            Error::DuplicateDialect(ref name) => write!(f, "Duplicate dialect for codec: '{}'", name),
            Error::Closed => f.write_str(
                "The codec instance has been closed and cannot be used for new operations",
            ),
            Error::UnsupportedDialect(ref msg) => write!(f, "Unsupported dialect operation: {}", msg),
            Error::BadEncode(ref err) => write!(f, "Basic data encoding failure: {}", err),
            Error::ParseLimit(ref err) => write!(f, "Hit parsing limit: {}", err),
            Error::Schema(ref err) => write!(f, "Invalid schema: {}", err),
            Error::Io(ref err) => write!(f, "Stream failure: {}", err),
            Error::Json(ref err) => write!(f, "JSON failure: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::Json(ref err) => Some(err),
            _ => None,
        }
    }
}

impl std::convert::From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::convert::From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}
