//! Native status codes and their translation.
//!
//! The platform reports results as a signed 32-bit `status_t`. Zero is
//! success; everything else is negative. Several codes are negated errno
//! values so they interoperate with plain POSIX error reporting, the rest are
//! packed just above `i32::MIN`.

use crate::error::{Error, Result};
use std::fmt;

const UNKNOWN_ERROR: i32 = i32::MIN;

/// Closed set of outcomes reported by the native implementation.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Success.
    Ok = 0,
    /// Generic failure; also the catch-all for unrecognized codes.
    UnknownError = UNKNOWN_ERROR,
    /// Out of memory (`-ENOMEM`).
    NoMemory = -libc::ENOMEM,
    /// Operation not valid in the current state (`-ENOSYS`).
    InvalidOperation = -libc::ENOSYS,
    /// Invalid argument (`-EINVAL`).
    BadValue = -libc::EINVAL,
    /// Wrong type.
    BadType = UNKNOWN_ERROR + 1,
    /// Not found (`-ENOENT`).
    NameNotFound = -libc::ENOENT,
    /// Permission denied (`-EPERM`).
    PermissionDenied = -libc::EPERM,
    /// Not initialized (`-ENODEV`).
    NoInit = -libc::ENODEV,
    /// Already exists (`-EEXIST`).
    AlreadyExists = -libc::EEXIST,
    /// Remote object is gone (`-EPIPE`).
    DeadObject = -libc::EPIPE,
    /// Transaction failed.
    FailedTransaction = UNKNOWN_ERROR + 2,
    /// Index out of range (`-E2BIG`).
    BadIndex = -libc::E2BIG,
    /// Not enough data.
    NotEnoughData = UNKNOWN_ERROR + 3,
    /// The operation would block.
    WouldBlock = UNKNOWN_ERROR + 4,
    /// The operation timed out.
    TimedOut = UNKNOWN_ERROR + 5,
    /// Unknown transaction code.
    UnknownTransaction = UNKNOWN_ERROR + 6,
    /// File descriptors are not allowed.
    FdsNotAllowed = UNKNOWN_ERROR + 7,
}

impl StatusCode {
    /// Every member of the enumeration.
    pub const ALL: [StatusCode; 18] = [
        StatusCode::Ok,
        StatusCode::UnknownError,
        StatusCode::NoMemory,
        StatusCode::InvalidOperation,
        StatusCode::BadValue,
        StatusCode::BadType,
        StatusCode::NameNotFound,
        StatusCode::PermissionDenied,
        StatusCode::NoInit,
        StatusCode::AlreadyExists,
        StatusCode::DeadObject,
        StatusCode::FailedTransaction,
        StatusCode::BadIndex,
        StatusCode::NotEnoughData,
        StatusCode::WouldBlock,
        StatusCode::TimedOut,
        StatusCode::UnknownTransaction,
        StatusCode::FdsNotAllowed,
    ];

    /// Translate a raw native result.
    ///
    /// Total: zero is always `Ok`, and any value outside the enumeration
    /// (including positive ones) becomes `UnknownError`.
    pub fn from_raw(raw: i32) -> StatusCode {
        if raw == 0 {
            return StatusCode::Ok;
        }
        StatusCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_raw() == raw)
            .unwrap_or(StatusCode::UnknownError)
    }

    /// The raw `status_t` value.
    #[inline]
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Whether this is the success code.
    #[inline]
    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }

    /// Platform name of the code.
    pub fn name(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::UnknownError => "UNKNOWN_ERROR",
            StatusCode::NoMemory => "NO_MEMORY",
            StatusCode::InvalidOperation => "INVALID_OPERATION",
            StatusCode::BadValue => "BAD_VALUE",
            StatusCode::BadType => "BAD_TYPE",
            StatusCode::NameNotFound => "NAME_NOT_FOUND",
            StatusCode::PermissionDenied => "PERMISSION_DENIED",
            StatusCode::NoInit => "NO_INIT",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::DeadObject => "DEAD_OBJECT",
            StatusCode::FailedTransaction => "FAILED_TRANSACTION",
            StatusCode::BadIndex => "BAD_INDEX",
            StatusCode::NotEnoughData => "NOT_ENOUGH_DATA",
            StatusCode::WouldBlock => "WOULD_BLOCK",
            StatusCode::TimedOut => "TIMED_OUT",
            StatusCode::UnknownTransaction => "UNKNOWN_TRANSACTION",
            StatusCode::FdsNotAllowed => "FDS_NOT_ALLOWED",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_raw())
    }
}

/// Translate a raw native result into `Ok(())` or `Error::Status`.
#[inline]
pub fn check(raw: i32) -> Result<()> {
    match StatusCode::from_raw(raw) {
        StatusCode::Ok => Ok(()),
        code => Err(Error::Status(code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_ok() {
        assert_eq!(StatusCode::from_raw(0), StatusCode::Ok);
        assert!(check(0).is_ok());
    }

    #[test]
    fn test_errno_aliases() {
        assert_eq!(StatusCode::NoMemory.as_raw(), -12);
        assert_eq!(StatusCode::InvalidOperation.as_raw(), -38);
        assert_eq!(StatusCode::BadValue.as_raw(), -22);
        assert_eq!(StatusCode::NameNotFound.as_raw(), -2);
        assert_eq!(StatusCode::PermissionDenied.as_raw(), -1);
        assert_eq!(StatusCode::NoInit.as_raw(), -19);
        assert_eq!(StatusCode::AlreadyExists.as_raw(), -17);
        assert_eq!(StatusCode::DeadObject.as_raw(), -32);
        assert_eq!(StatusCode::BadIndex.as_raw(), -7);
    }

    #[test]
    fn test_packed_codes() {
        assert_eq!(StatusCode::UnknownError.as_raw(), i32::MIN);
        assert_eq!(StatusCode::BadType.as_raw(), i32::MIN + 1);
        assert_eq!(StatusCode::WouldBlock.as_raw(), i32::MIN + 4);
        assert_eq!(StatusCode::FdsNotAllowed.as_raw(), i32::MIN + 7);
    }

    #[test]
    fn test_known_codes_translate_to_themselves() {
        for code in StatusCode::ALL {
            assert_eq!(StatusCode::from_raw(code.as_raw()), code);
        }
    }

    #[test]
    fn test_codes_are_distinct() {
        for (i, a) in StatusCode::ALL.iter().enumerate() {
            for b in &StatusCode::ALL[i + 1..] {
                assert_ne!(a.as_raw(), b.as_raw(), "{a} aliases {b}");
            }
        }
    }

    #[test]
    fn test_unrecognized_codes_become_unknown_error() {
        for raw in [-9999, -3, i32::MIN + 100, 1, 42, i32::MAX] {
            let code = StatusCode::from_raw(raw);
            assert_eq!(code, StatusCode::UnknownError);
            assert!(StatusCode::ALL.contains(&code));
        }
    }

    #[test]
    fn test_check_carries_code() {
        let err = check(-libc::EINVAL).unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BadValue));
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::BadValue.to_string(), "BAD_VALUE (-22)");
    }
}
