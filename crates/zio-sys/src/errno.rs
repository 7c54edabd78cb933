//! OS-style error codes.
//!
//! Backends report failures as a numeric code. Codes below [`EUZIONODEV`] are
//! plain OS errno values; the range `EUZIONODEV..EUZIOLAST` holds the
//! framework-specific codes below.

use std::fmt;
use std::io;

/// Base of the framework-specific code range.
pub const EUZIO_BASE: i32 = 1024;
/// No ZIO device available.
pub const EUZIONODEV: i32 = EUZIO_BASE;
/// Incompatible ZIO version.
pub const EUZIOVERSION: i32 = EUZIO_BASE + 1;
/// Module list is not available.
pub const EUZIONOMODLIST: i32 = EUZIO_BASE + 2;
/// Control block is not correct.
pub const EUZIOBLKCTRLWRONG: i32 = EUZIO_BASE + 3;
/// Invalid char-device.
pub const EUZIOICHARDEV: i32 = EUZIO_BASE + 4;
/// Invalid device.
pub const EUZIOIDEV: i32 = EUZIO_BASE + 5;
/// Invalid channel set.
pub const EUZIOICSET: i32 = EUZIO_BASE + 6;
/// Invalid channel.
pub const EUZIOICHAN: i32 = EUZIO_BASE + 7;
/// Wrong I/O direction while using char-device.
pub const EUZIOBLKDIRECTION: i32 = EUZIO_BASE + 8;
/// One past the last framework-specific code.
pub const EUZIOLAST: i32 = EUZIO_BASE + 9;

const ZIO_ERRORS: [&str; (EUZIOLAST - EUZIO_BASE) as usize] = [
    "No ZIO device available",
    "Incompatible ZIO version",
    "Module list is not available",
    "Control block is not correct",
    "Invalid char-device",
    "Invalid device",
    "Invalid channel set",
    "Invalid channel",
    "Wrong I/O direction while using char-device",
];

/// Human-readable message for `code`.
///
/// Framework codes use their own table; everything else is rendered by the OS.
pub fn strerror(code: i32) -> String {
    if (EUZIO_BASE..EUZIOLAST).contains(&code) {
        return ZIO_ERRORS[(code - EUZIO_BASE) as usize].to_string();
    }
    let msg = io::Error::from_raw_os_error(code).to_string();
    // io::Error appends " (os error N)"; keep just the message.
    match msg.rfind(" (os error") {
        Some(idx) => msg[..idx].to_string(),
        None => msg,
    }
}

/// A failed backend operation, carrying its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreError {
    code: i32,
}

impl StoreError {
    /// Wrap a raw code.
    pub fn new(code: i32) -> Self {
        Self { code }
    }

    /// The numeric error code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The rendered message for this code.
    pub fn strerror(&self) -> String {
        strerror(self.code)
    }

    /// True for codes in the framework-specific range.
    pub fn is_zio_specific(&self) -> bool {
        (EUZIO_BASE..EUZIOLAST).contains(&self.code)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.strerror())
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::new(err.raw_os_error().unwrap_or(libc::EIO))
    }
}

/// Result alias for backend operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_messages() {
        assert_eq!(strerror(EUZIONODEV), "No ZIO device available");
        assert_eq!(strerror(EUZIOICHAN), "Invalid channel");
        assert_eq!(
            strerror(EUZIOBLKDIRECTION),
            "Wrong I/O direction while using char-device"
        );
    }

    #[test]
    fn test_os_messages() {
        let msg = strerror(libc::ENOENT);
        assert!(!msg.is_empty());
        assert!(!msg.contains("os error"));
        assert_ne!(msg, strerror(EUZIONODEV));
    }

    #[test]
    fn test_from_io_error() {
        let err: StoreError = io::Error::from_raw_os_error(libc::EACCES).into();
        assert_eq!(err.code(), libc::EACCES);
        assert!(!err.is_zio_specific());

        let err: StoreError = io::Error::new(io::ErrorKind::Other, "synthetic").into();
        assert_eq!(err.code(), libc::EIO);
    }

    #[test]
    fn test_display_matches_strerror() {
        let err = StoreError::new(EUZIOICSET);
        assert_eq!(err.to_string(), "Invalid channel set");
        assert!(err.is_zio_specific());
    }
}
