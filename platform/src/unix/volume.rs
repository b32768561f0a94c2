// Raw volume access on Unix: block devices and disk images
// O_SYNC gives write-through, flock stands in for the volume lock.

use ntfsmend_core::{BlockDevice, MendError, VolumeTarget};
use nix::fcntl::{flock, FlockArg, OFlag};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;

pub struct UnixVolume {
    file: Option<File>,
    path: String,
    writable: bool,
    locked: bool,
}

impl UnixVolume {
    /// Open for shared read access
    pub fn open_read_only(target: &VolumeTarget) -> Result<Self, MendError> {
        let path = target.device_path();
        log::debug!("Opening {} for reading", path);

        let file = File::open(&path).map_err(|e| {
            log::error!("Failed to open {} for reading: {}", path, e);
            MendError::from_open(&path, e)
        })?;

        Ok(Self {
            file: Some(file),
            path,
            writable: false,
            locked: false,
        })
    }

    /// Open for synchronous read/write and try to take the exclusive lock.
    /// A failed lock is logged and the handle is returned anyway.
    pub fn open_read_write_locked(target: &VolumeTarget) -> Result<Self, MendError> {
        let path = target.device_path();
        log::debug!("Opening {} for writing", path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_SYNC.bits())
            .open(&path)
            .map_err(|e| {
                log::error!("Failed to open {} for writing: {}", path, e);
                MendError::from_open(&path, e)
            })?;

        let mut volume = Self {
            file: Some(file),
            path,
            writable: true,
            locked: false,
        };
        volume.lock();
        Ok(volume)
    }

    fn lock(&mut self) -> bool {
        let Some(file) = self.file.as_ref() else {
            return false;
        };
        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => {
                log::debug!("Locked {}", self.path);
                self.locked = true;
            }
            Err(errno) => {
                log::warn!("Failed to lock {}: {}", self.path, errno);
            }
        }
        self.locked
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Unlock (when locked) and close the handle.
    pub fn close(&mut self) {
        if self.file.is_none() {
            return;
        }
        if self.locked {
            self.unlock();
        }
        self.file = None;
        log::debug!("Closed {}", self.path);
    }

    fn file(&self) -> Result<&File, MendError> {
        self.file.as_ref().ok_or(MendError::HandleClosed)
    }
}

impl BlockDevice for UnixVolume {
    fn read_at(&mut self, offset: u64, count: u32) -> Result<Vec<u8>, MendError> {
        let file = self.file()?;
        log::trace!("Reading {} bytes at offset {:#x}", count, offset);

        let mut buffer = vec![0u8; count as usize];
        let mut filled = 0;
        while filled < buffer.len() {
            match file.read_at(&mut buffer[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(MendError::IoError(e)),
            }
        }
        buffer.truncate(filled);
        Ok(buffer)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), MendError> {
        let file = self.file()?;
        log::trace!("Writing {} bytes at offset {:#x}", data.len(), offset);

        let mut written = 0;
        while written < data.len() {
            match file.write_at(&data[written..], offset + written as u64) {
                Ok(0) => {
                    return Err(MendError::ShortWrite {
                        offset,
                        written,
                        expected: data.len(),
                    })
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(MendError::IoError(e)),
            }
        }
        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn unlock(&mut self) -> bool {
        let Some(file) = self.file.as_ref() else {
            return false;
        };
        match flock(file.as_raw_fd(), FlockArg::Unlock) {
            Ok(()) => {
                self.locked = false;
                true
            }
            Err(errno) => {
                log::warn!("Failed to unlock {}: {}", self.path, errno);
                false
            }
        }
    }

    fn dismount(&mut self) -> bool {
        log::warn!("Dismount is not supported for {} on this platform", self.path);
        false
    }
}

impl Drop for UnixVolume {
    fn drop(&mut self) {
        self.close();
    }
}
