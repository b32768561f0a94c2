pub mod alignment;

#[cfg(unix)]
pub mod unix;

#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use unix::UnixVolume as VolumeHandle;

#[cfg(windows)]
pub use windows::WindowsVolume as VolumeHandle;

use ntfsmend_core::{AccessMode, MendError, VolumeOpener, VolumeTarget};

/// Opens real devices through the platform's [`VolumeHandle`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformOpener;

impl VolumeOpener for PlatformOpener {
    type Device = VolumeHandle;

    fn open(&self, target: &VolumeTarget, mode: AccessMode) -> Result<VolumeHandle, MendError> {
        match mode {
            AccessMode::ReadOnly => VolumeHandle::open_read_only(target),
            AccessMode::ReadWriteLocked => VolumeHandle::open_read_write_locked(target),
        }
    }
}
