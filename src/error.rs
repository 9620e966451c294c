//! Error types for the graphic buffer binding.

use crate::status::StatusCode;
use thiserror::Error;

/// Result type alias using this crate's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for binding operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The platform graphics library could not be opened.
    #[error("failed to load library '{name}': {reason}")]
    LibraryNotFound {
        /// Library name or path that was requested.
        name: String,
        /// Loader diagnostic.
        reason: String,
    },

    /// A required entry point is not exported by the loaded library.
    #[error("symbol '{symbol}' not found in '{library}'")]
    SymbolNotFound {
        /// Symbol that failed to resolve.
        symbol: String,
        /// Library the symbol was looked up in.
        library: String,
    },

    /// The native implementation (or a caller-contract check) reported a status.
    #[error("native status: {0}")]
    Status(StatusCode),

    /// The native object does not match the documented ABI.
    #[error("ABI mismatch: {0}")]
    AbiMismatch(String),

    /// Reserving memory for the native object failed.
    #[error("allocation failed: {0}")]
    AllocationFailed(String),

    /// The native implementation returned a null native buffer.
    #[error("native implementation returned a null native buffer")]
    NullNativeBuffer,

    /// The native lock reported success but produced no address.
    #[error("native lock succeeded without a mapping address")]
    NullMapping,

    /// System call error (via rustix).
    #[error("system error: {0}")]
    System(#[from] rustix::io::Errno),
}

impl Error {
    /// The status code carried by this error, if it came from a status check.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status(code) => Some(*code),
            _ => None,
        }
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// The binding never retries on its own; this only classifies.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Status(StatusCode::WouldBlock) | Error::Status(StatusCode::TimedOut)
        )
    }
}

impl From<StatusCode> for Error {
    fn from(code: StatusCode) -> Self {
        Error::Status(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accessor() {
        let err = Error::from(StatusCode::InvalidOperation);
        assert_eq!(err.status(), Some(StatusCode::InvalidOperation));
        assert_eq!(Error::NullNativeBuffer.status(), None);
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Status(StatusCode::WouldBlock).is_transient());
        assert!(Error::Status(StatusCode::TimedOut).is_transient());
        assert!(!Error::Status(StatusCode::BadValue).is_transient());
        assert!(!Error::NullMapping.is_transient());
    }

    #[test]
    fn test_display_mentions_symbol() {
        let err = Error::SymbolNotFound {
            symbol: "_ZN7android13GraphicBuffer6unlockEv".into(),
            library: "libui.so".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("unlockEv"));
        assert!(msg.contains("libui.so"));
    }
}
