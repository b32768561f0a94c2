use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MendError {
    #[error("Failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Insufficient privileges: {0}")]
    InsufficientPrivileges(String),

    #[error("Device is busy: {0}")]
    DeviceBusy(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Short write at offset {offset:#x}: {written} of {expected} bytes")]
    ShortWrite {
        offset: u64,
        written: usize,
        expected: usize,
    },

    #[error("Volume handle is closed")]
    HandleClosed,

    #[error("Not enough bytes for {structure}: need {needed}, got {actual}")]
    Decode {
        structure: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error("Invalid engine state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

// ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION on Windows, EBUSY on Unix.
#[cfg(windows)]
const BUSY_OS_ERRORS: &[i32] = &[32, 33];
#[cfg(not(windows))]
const BUSY_OS_ERRORS: &[i32] = &[16];

impl MendError {
    /// Classify a failed device open into the open-error family.
    pub fn from_open(path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => MendError::DeviceNotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => {
                MendError::InsufficientPrivileges(format!("{}: {}", path, err))
            }
            _ if err
                .raw_os_error()
                .map_or(false, |code| BUSY_OS_ERRORS.contains(&code)) =>
            {
                MendError::DeviceBusy(format!("{}: {}", path, err))
            }
            _ => MendError::Open {
                path: path.to_string(),
                reason: err.to_string(),
            },
        }
    }

    /// True for the errors raised while acquiring a device handle.
    pub fn is_open_error(&self) -> bool {
        matches!(
            self,
            MendError::Open { .. }
                | MendError::DeviceNotFound(_)
                | MendError::InsufficientPrivileges(_)
                | MendError::DeviceBusy(_)
        )
    }
}
