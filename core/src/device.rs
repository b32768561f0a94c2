use crate::MendError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const PHYSICAL_DRIVE: &str = "PhysicalDrive";

/// A raw volume or disk addressed the way the OS expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeTarget {
    /// A lettered volume, opened as `\\.\X:`
    DriveLetter(char),
    /// A whole disk, opened as `\\.\PhysicalDriveN`
    PhysicalDrive(u32),
    /// Anything else: disk images, `/dev/sdb1`, ...
    Path(PathBuf),
}

impl VolumeTarget {
    pub fn drive_letter(letter: char) -> Result<Self, MendError> {
        if !letter.is_ascii_alphabetic() {
            return Err(MendError::Configuration(format!(
                "Invalid drive letter: {:?}",
                letter
            )));
        }
        Ok(VolumeTarget::DriveLetter(letter.to_ascii_uppercase()))
    }

    /// Path handed to the OS when opening the device.
    pub fn device_path(&self) -> String {
        match self {
            VolumeTarget::DriveLetter(letter) => format!(r"\\.\{}:", letter),
            VolumeTarget::PhysicalDrive(n) => format!(r"\\.\PhysicalDrive{}", n),
            VolumeTarget::Path(path) => path.to_string_lossy().into_owned(),
        }
    }

    /// Short human label used in log lines ("C:", "PhysicalDrive1", or the path).
    pub fn label(&self) -> String {
        match self {
            VolumeTarget::DriveLetter(letter) => format!("{}:", letter),
            VolumeTarget::PhysicalDrive(n) => format!("PhysicalDrive{}", n),
            VolumeTarget::Path(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for VolumeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.device_path())
    }
}

impl FromStr for VolumeTarget {
    type Err = MendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(MendError::Configuration("Empty volume target".to_string()));
        }

        let bare = trimmed.strip_prefix(r"\\.\").unwrap_or(trimmed);

        // "C", "C:", "C:\" and "C:/" all name the same volume; a separator
        // without the colon ("a/") is a relative path.
        let mut chars = bare.chars();
        if let Some(letter) = chars.next().filter(char::is_ascii_alphabetic) {
            if matches!(chars.as_str(), "" | ":" | ":\\" | ":/") {
                return VolumeTarget::drive_letter(letter);
            }
        }

        if let Some(prefix) = bare.get(..PHYSICAL_DRIVE.len()) {
            if prefix.eq_ignore_ascii_case(PHYSICAL_DRIVE) {
                if let Ok(n) = bare[PHYSICAL_DRIVE.len()..].parse::<u32>() {
                    return Ok(VolumeTarget::PhysicalDrive(n));
                }
            }
        }

        Ok(VolumeTarget::Path(PathBuf::from(trimmed)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    /// Shared read access, used for analysis
    ReadOnly,
    /// Exclusive write-through access with a volume lock attempt, used for repair
    ReadWriteLocked,
}

impl AccessMode {
    pub fn from_writable(writable: bool) -> Self {
        if writable {
            AccessMode::ReadWriteLocked
        } else {
            AccessMode::ReadOnly
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::ReadWriteLocked)
    }
}

/// Positioned byte access to an open volume.
///
/// `read_at` may return fewer bytes than requested when the device ends
/// early. `write_at` either writes the whole buffer to stable storage or
/// fails. `unlock` and `dismount` are best effort and only report whether
/// the OS accepted the request.
pub trait BlockDevice {
    fn read_at(&mut self, offset: u64, count: u32) -> Result<Vec<u8>, MendError>;

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), MendError>;

    fn is_locked(&self) -> bool;

    fn unlock(&mut self) -> bool;

    fn dismount(&mut self) -> bool;
}

/// Acquires a [`BlockDevice`] for a target in the requested mode.
pub trait VolumeOpener {
    type Device: BlockDevice;

    fn open(&self, target: &VolumeTarget, mode: AccessMode) -> Result<Self::Device, MendError>;
}
