use std::borrow::Cow;
use std::fmt;
use std::io::{Read, Write};

use crate::error::Result;
use crate::record::{Record, RecordBuilder};

/// The built-in wire dialects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Compact binary encoding, wire-compatible with protocol buffers.
    #[default]
    Binary,
    /// Human-readable text. Write-only.
    Text,
    /// The proto3 JSON mapping.
    Json,
}

impl Dialect {
    /// Upper-case name of the dialect.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Binary => "BINARY",
            Dialect::Text => "TEXT",
            Dialect::Json => "JSON",
        }
    }

    /// The dialect's identity.
    pub fn info(&self) -> DialectInfo {
        DialectInfo {
            name: self.name().to_string(),
            builtin: true,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of a dialect. Two identities are the same dialect if both name and `builtin` match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DialectInfo {
    name: String,
    builtin: bool,
}

impl DialectInfo {
    /// Identity for a caller-supplied dialect.
    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            builtin: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for the identities of [`Dialect`] members.
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }
}

impl From<Dialect> for DialectInfo {
    fn from(d: Dialect) -> Self {
        d.info()
    }
}

impl fmt::Display for DialectInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A strategy for moving whole records on and off a byte stream.
///
/// Implementations should hold no state beyond their configuration, as a single dialect may be
/// used from many threads at once.
pub trait RecordDialect: Send + Sync {
    /// Identity of this dialect.
    fn info(&self) -> DialectInfo;

    /// Read exactly one record from `reader` into `builder`.
    fn decode(&self, reader: &mut dyn Read, builder: RecordBuilder) -> Result<RecordBuilder>;

    /// Write `record` to `writer`.
    fn encode(&self, record: &Record, writer: &mut dyn Write) -> Result<()>;

    /// Adjust a record before it is encoded. Does nothing by default.
    fn prepare<'a>(&self, record: &'a Record) -> Result<Cow<'a, Record>> {
        Ok(Cow::Borrowed(record))
    }

    /// Turn a decoded builder into the final record. Builds it as-is by default.
    fn finalize(&self, builder: RecordBuilder) -> Result<Record> {
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities() {
        assert_eq!(Dialect::default(), Dialect::Binary);
        assert_eq!(Dialect::Json.info().name(), "JSON");
        assert!(Dialect::Text.info().is_builtin());
        let custom = DialectInfo::custom("JSON");
        assert!(!custom.is_builtin());
        assert_ne!(custom, Dialect::Json.info());
        assert_eq!(custom, DialectInfo::custom("JSON"));
    }
}
