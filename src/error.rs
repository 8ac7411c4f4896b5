use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy of the crate.
///
/// Every fallible operation returns [`Error`]; callers that need to react to
/// a particular class of failure (a recoverable memory fault, the end of an
/// iteration, a division by zero) dispatch on [`Error::kind`] rather than on
/// message text.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot allocate memory")]
    NoMemory,
    /// End-of-iteration sentinel. Also used internally by the object
    /// pretty-printer to signal "does not fit in the column budget".
    #[error("stop iteration")]
    Stop,
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Overflow(String),
    #[error("maximum recursion depth exceeded")]
    Recursion,
    #[error("division by zero")]
    ZeroDivision,
    #[error("{message}: {}{}", path.as_ref().map(|p| format!("{}: ", p.display())).unwrap_or_default(), std::io::Error::from_raw_os_error(*errno))]
    Os {
        message: String,
        errno: i32,
        path: Option<PathBuf>,
    },
    #[error("{0}")]
    ElfFormat(String),
    #[error("{0}")]
    DwarfFormat(String),
    /// Debug information ran out before a read completed. Kept separate from
    /// [`Error::DwarfFormat`] so the hot parsing paths can report truncation
    /// without formatting a message.
    #[error("debug information is truncated")]
    DwarfEof,
    #[error("{0}")]
    MissingDebug(String),
    #[error("{0}")]
    Syntax(String),
    #[error("{0}")]
    Lookup(String),
    /// A target-memory read failed. Recoverable: the pretty-printer consumes
    /// these when formatting a pointer whose referent cannot be read.
    #[error("could not read memory from {address:#x}")]
    Fault { address: u64 },
    #[error("{0}")]
    Type(String),
    #[error("{0}")]
    Other(String),
}

/// Field-free mirror of the [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NoMemory,
    Stop,
    InvalidArgument,
    Overflow,
    Recursion,
    ZeroDivision,
    Os,
    ElfFormat,
    DwarfFormat,
    DwarfEof,
    MissingDebug,
    Syntax,
    Lookup,
    Fault,
    Type,
    Other,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoMemory => ErrorKind::NoMemory,
            Error::Stop => ErrorKind::Stop,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Overflow(_) => ErrorKind::Overflow,
            Error::Recursion => ErrorKind::Recursion,
            Error::ZeroDivision => ErrorKind::ZeroDivision,
            Error::Os { .. } => ErrorKind::Os,
            Error::ElfFormat(_) => ErrorKind::ElfFormat,
            Error::DwarfFormat(_) => ErrorKind::DwarfFormat,
            Error::DwarfEof => ErrorKind::DwarfEof,
            Error::MissingDebug(_) => ErrorKind::MissingDebug,
            Error::Syntax(_) => ErrorKind::Syntax,
            Error::Lookup(_) => ErrorKind::Lookup,
            Error::Fault { .. } => ErrorKind::Fault,
            Error::Type(_) => ErrorKind::Type,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Error::Fault { .. })
    }

    pub(crate) fn os(message: impl Into<String>, err: std::io::Error, path: Option<PathBuf>) -> Self {
        Error::Os {
            message: message.into(),
            errno: err.raw_os_error().unwrap_or(0),
            path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_is_recoverable() {
        let err = Error::Fault { address: 0xffff_8000_0000_0000 };
        assert!(err.is_fault());
        assert_eq!(err.kind(), ErrorKind::Fault);
        assert_eq!(
            err.to_string(),
            "could not read memory from 0xffff800000000000"
        );
    }

    #[test]
    fn os_error_concatenates_path() {
        let err = Error::os(
            "open",
            std::io::Error::from_raw_os_error(2),
            Some(PathBuf::from("/nonexistent/core")),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("open: /nonexistent/core: "));
        assert_eq!(err.kind(), ErrorKind::Os);
    }

    #[test]
    fn eof_is_distinct_from_dwarf_format() {
        assert_ne!(Error::DwarfEof.kind(), ErrorKind::DwarfFormat);
    }
}
