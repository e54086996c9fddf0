//! Crate-wide error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while decoding a DBF table, a memo file, or
/// a Shapefile.
///
/// This is deliberately a flat enum rather than a hierarchy of error types:
/// callers match on a single `Error` regardless of which layer raised it.
#[derive(Error, Debug)]
pub enum Error {
    /// The underlying byte source failed to read or seek.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Fewer bytes were available than the format requires at this
    /// position.
    #[error("truncated input: expected {expected} bytes at offset {offset}, found {found}")]
    Truncated {
        /// Byte offset at which the read was attempted.
        offset: u64,
        /// Number of bytes the format requires.
        expected: usize,
        /// Number of bytes actually available.
        found: usize,
    },

    /// The DBF header's first byte does not match any known format variant.
    #[error("unsupported dBase version byte: {0:#04x}")]
    UnsupportedVersion(u8),

    /// The header failed one of its structural invariants.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A field descriptor failed one of its structural invariants.
    #[error("malformed field descriptor {name:?}: {reason}")]
    MalformedField {
        /// The offending field's name.
        name: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// A field's raw bytes could not be decoded into its declared type.
    #[error("failed to parse field {name:?} (raw = {raw:?}): {reason}")]
    FieldParse {
        /// The field's name.
        name: String,
        /// The raw bytes that failed to decode.
        raw: Vec<u8>,
        /// Human-readable explanation.
        reason: String,
    },

    /// The table references a memo file, but it could not be located and
    /// `ignore_missing_memo` is `false`.
    #[error("missing memo file for {dbf_path}: expected {memo_path}")]
    MissingMemoFile {
        /// Path to the DBF table that referenced a memo field.
        dbf_path: PathBuf,
        /// Path at which the memo file was expected.
        memo_path: PathBuf,
    },

    /// A Shapefile geometry record failed a structural invariant.
    #[error("invalid shape record: {0}")]
    InvalidShape(String),

    /// A memo file's header or record layout failed a structural
    /// invariant.
    #[error("malformed memo file: {0}")]
    MalformedMemo(String),

    /// A random-access operation was attempted on a source that only
    /// supports forward reads.
    #[error("this operation requires a seekable byte source")]
    RequiresSeek,
}

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn truncated(offset: u64, expected: usize, found: usize) -> Error {
        Error::Truncated {
            offset,
            expected,
            found,
        }
    }

    pub(crate) fn malformed_field(name: impl Into<String>, reason: impl Into<String>) -> Error {
        Error::MalformedField {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn field_parse(
        name: impl Into<String>,
        raw: &[u8],
        reason: impl Into<String>,
    ) -> Error {
        Error::FieldParse {
            name: name.into(),
            raw: raw.to_vec(),
            reason: reason.into(),
        }
    }
}
