//! Error types for the ZIO object model.
//!
//! Every failure is returned to the immediate caller; nothing here retries.
//! Backend failures carry the rendered message of the underlying error code
//! so they can be shown without further lookups.

use thiserror::Error;
use zio_sys::{LayoutError, StoreError};

/// Result type alias for ZIO operations.
pub type Result<T> = std::result::Result<T, ZioError>;

/// Errors that can occur while working with a ZIO device tree.
#[derive(Error, Debug)]
pub enum ZioError {
    /// Device name or id could not be resolved by the backend
    #[error("Cannot open device '{name}'{}: {strerror}", id.map(|i| format!(" (id 0x{i:04x})")).unwrap_or_default())]
    OpenFailure {
        name: String,
        id: Option<u32>,
        strerror: String,
    },

    /// Attribute get/set or metadata query failed
    #[error("I/O failure on '{path}': {strerror}")]
    IoFailure { path: String, strerror: String },

    /// Block read failed
    #[error("{context}: {strerror}")]
    ReadFailure { context: String, strerror: String },

    /// Block write failed
    #[error("{context}: {strerror}")]
    WriteFailure { context: String, strerror: String },

    /// Module list could not be read
    #[error("Cannot list {kind} modules: {strerror}")]
    ListFailure { kind: &'static str, strerror: String },

    /// Control record shorter than the fixed header
    #[error("Malformed control header: got {actual} bytes, need {expected}")]
    Malformed { expected: usize, actual: usize },

    /// Payload shorter than `nsamples * ssize`
    #[error("Truncated payload: got {actual} bytes, need {expected}")]
    Truncated { expected: usize, actual: usize },

    /// Sample size is not 1, 2, 4 or 8 bytes
    #[error("Unsupported sample size {0} (expected 1, 2, 4 or 8)")]
    UnsupportedSampleSize(u16),

    /// The device owning this handle has been closed
    #[error("Device '{path}' is closed")]
    DeviceClosed { path: String },

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration loaded but holds invalid values
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ZioError {
    pub(crate) fn io(path: impl Into<String>, err: StoreError) -> Self {
        Self::IoFailure {
            path: path.into(),
            strerror: err.strerror(),
        }
    }

    /// True for failures reported by the backend while talking to the device.
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            Self::OpenFailure { .. }
                | Self::IoFailure { .. }
                | Self::ReadFailure { .. }
                | Self::WriteFailure { .. }
                | Self::ListFailure { .. }
        )
    }

    /// True for violations of the block wire format.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::Malformed { .. } | Self::Truncated { .. } | Self::UnsupportedSampleSize(_)
        )
    }

    /// True if the handle outlived its device.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::DeviceClosed { .. })
    }
}

impl From<LayoutError> for ZioError {
    fn from(err: LayoutError) -> Self {
        match err {
            LayoutError::Malformed { expected, actual } => Self::Malformed { expected, actual },
        }
    }
}

impl From<figment::Error> for ZioError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
