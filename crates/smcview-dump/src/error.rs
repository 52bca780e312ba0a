//! Reader errors.
//!
//! Format errors (bad signature, bad version, truncated tables) are raised by
//! [`SmcDump::open`](crate::SmcDump::open) and mean no store was constructed.
//! Out-of-range errors are raised lazily by the individual queries.

use std::io;

use thiserror::Error;

/// Everything that can go wrong while decoding a dump.
#[derive(Debug, Error)]
pub enum DumpError {
    /// Underlying I/O failure (open, seek, read).
    #[error("dump I/O error: {0}")]
    Io(#[source] io::Error),
    /// The file does not start with the model checker signature.
    #[error("bad format (no initial mark)")]
    BadSignature,
    /// The version byte is not one this reader understands.
    #[error("bad format (unsupported version {0})")]
    BadVersion(u8),
    /// The file ended in the middle of a header, table or record.
    #[error("bad format (truncated {0})")]
    Truncated(&'static str),
    /// A length, offset or index field holds a value no valid dump contains.
    #[error("bad format ({0})")]
    Corrupt(String),
    /// A transition kind tag outside `{0, 1, 2}`.
    #[error("bad format (unknown transition kind {0})")]
    BadTransitionKind(u8),
    /// A state index outside `[0, state_count)`.
    #[error("state index {index} out of range (dump has {count} states)")]
    StateOutOfRange {
        /// Requested index.
        index: u32,
        /// Number of states in the dump.
        count: u32,
    },
    /// A string index outside the string table.
    #[error("string index {index} out of range (dump has {count} strings)")]
    StringOutOfRange {
        /// Requested index.
        index: u32,
        /// Number of interned strings.
        count: u32,
    },
}

impl DumpError {
    /// Map an I/O error, turning a premature EOF into [`DumpError::Truncated`].
    pub(crate) fn from_io(err: io::Error, what: &'static str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated(what)
        } else {
            Self::Io(err)
        }
    }

    /// Whether this is a format error (as opposed to I/O or a bad query).
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::BadSignature
                | Self::BadVersion(_)
                | Self::Truncated(_)
                | Self::Corrupt(_)
                | Self::BadTransitionKind(_)
        )
    }
}
