// Windows raw volume access
// \\.\X: and \\.\PhysicalDriveN handles with FSCTL lock/unlock/dismount

use crate::alignment::{AlignedBuffer, SectorSpan, DEFAULT_SECTOR_SIZE};
use ntfsmend_core::{BlockDevice, MendError, VolumeTarget};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::windows::fs::{FileExt, OpenOptionsExt};
use std::os::windows::io::AsRawHandle;
use std::ptr::null_mut;
use winapi::{
    shared::minwindef::{DWORD, FALSE, LPVOID},
    um::errhandlingapi::GetLastError,
    um::ioapiset::DeviceIoControl,
    um::winbase::{FILE_FLAG_NO_BUFFERING, FILE_FLAG_WRITE_THROUGH},
    um::winioctl::{
        DISK_GEOMETRY, FSCTL_DISMOUNT_VOLUME, FSCTL_LOCK_VOLUME, FSCTL_UNLOCK_VOLUME,
        IOCTL_DISK_GET_DRIVE_GEOMETRY,
    },
    um::winnt::{FILE_SHARE_READ, FILE_SHARE_WRITE, HANDLE},
};

pub struct WindowsVolume {
    file: Option<File>,
    path: String,
    sector_size: u32,
    unbuffered: bool,
    writable: bool,
    locked: bool,
}

impl WindowsVolume {
    /// Open for shared read access
    pub fn open_read_only(target: &VolumeTarget) -> Result<Self, MendError> {
        let path = target.device_path();
        log::debug!("Opening {} for reading", path);

        let file = OpenOptions::new()
            .read(true)
            .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
            .open(&path)
            .map_err(|e| {
                log::error!("Failed to open {} for reading: {} (OS error {:?})", path, e, e.raw_os_error());
                MendError::from_open(&path, e)
            })?;

        Ok(Self {
            file: Some(file),
            path,
            sector_size: DEFAULT_SECTOR_SIZE,
            unbuffered: false,
            writable: false,
            locked: false,
        })
    }

    /// Open for unbuffered write-through access, then try FSCTL_LOCK_VOLUME.
    /// A failed lock is logged and the handle is returned anyway.
    pub fn open_read_write_locked(target: &VolumeTarget) -> Result<Self, MendError> {
        let path = target.device_path();
        log::debug!("Opening {} for writing", path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
            .custom_flags(FILE_FLAG_NO_BUFFERING | FILE_FLAG_WRITE_THROUGH)
            .open(&path)
            .map_err(|e| {
                log::error!("Failed to open {} for writing: {} (OS error {:?})", path, e, e.raw_os_error());
                MendError::from_open(&path, e)
            })?;

        let mut volume = Self {
            file: Some(file),
            path,
            sector_size: DEFAULT_SECTOR_SIZE,
            unbuffered: true,
            writable: true,
            locked: false,
        };
        volume.sector_size = volume.query_sector_size().unwrap_or(DEFAULT_SECTOR_SIZE);
        log::debug!("{} sector size: {} bytes", volume.path, volume.sector_size);

        volume.locked = volume.control(FSCTL_LOCK_VOLUME, "lock");
        Ok(volume)
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

    pub fn sector_size(&self) -> u32 {
        self.sector_size
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

    fn raw_handle(&self) -> Option<HANDLE> {
        self.file.as_ref().map(|f| f.as_raw_handle() as HANDLE)
    }

    /// Issue a buffer-less FSCTL. Returns whether the OS accepted it.
    fn control(&self, code: DWORD, what: &str) -> bool {
        let Some(handle) = self.raw_handle() else {
            return false;
        };
        let mut bytes_returned: DWORD = 0;
        let result = unsafe {
            DeviceIoControl(
                handle,
                code,
                null_mut(),
                0,
                null_mut(),
                0,
                &mut bytes_returned,
                null_mut(),
            )
        };
        if result != FALSE {
            log::debug!("{}: {} succeeded", self.path, what);
            true
        } else {
            let error = unsafe { GetLastError() };
            log::warn!("{}: {} failed with error {} (0x{:X})", self.path, what, error, error);
            false
        }
    }

    fn query_sector_size(&self) -> Option<u32> {
        let handle = self.raw_handle()?;
        let mut geometry: DISK_GEOMETRY = unsafe { std::mem::zeroed() };
        let mut bytes_returned: DWORD = 0;
        let result = unsafe {
            DeviceIoControl(
                handle,
                IOCTL_DISK_GET_DRIVE_GEOMETRY,
                null_mut(),
                0,
                &mut geometry as *mut DISK_GEOMETRY as LPVOID,
                std::mem::size_of::<DISK_GEOMETRY>() as DWORD,
                &mut bytes_returned,
                null_mut(),
            )
        };
        if result == FALSE || geometry.BytesPerSector == 0 {
            return None;
        }
        Some(geometry.BytesPerSector)
    }

    /// Fill `buffer` from `offset`, stopping early at end of device.
    fn read_into(&self, offset: u64, buffer: &mut [u8]) -> Result<usize, MendError> {
        let file = self.file()?;
        let mut filled = 0;
        while filled < buffer.len() {
            match file.seek_read(&mut buffer[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(MendError::IoError(e)),
            }
        }
        Ok(filled)
    }

    fn write_from(&self, offset: u64, data: &[u8]) -> Result<(), MendError> {
        let file = self.file()?;
        let mut written = 0;
        while written < data.len() {
            match file.seek_write(&data[written..], offset + written as u64) {
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
}

impl BlockDevice for WindowsVolume {
    fn read_at(&mut self, offset: u64, count: u32) -> Result<Vec<u8>, MendError> {
        log::trace!("Reading {} bytes at offset {:#x} from {}", count, offset, self.path);

        if !self.unbuffered {
            let mut buffer = vec![0u8; count as usize];
            let filled = self.read_into(offset, &mut buffer)?;
            buffer.truncate(filled);
            return Ok(buffer);
        }

        let span = SectorSpan::covering(offset, count as usize, self.sector_size);
        let mut aligned = AlignedBuffer::zeroed(span.len, self.sector_size as usize);
        let filled = self.read_into(span.start, &mut aligned)?;

        let end = (span.lead + count as usize).min(filled);
        if end <= span.lead {
            return Ok(Vec::new());
        }
        Ok(aligned[span.lead..end].to_vec())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), MendError> {
        log::trace!("Writing {} bytes at offset {:#x} to {}", data.len(), offset, self.path);

        if !self.unbuffered {
            return self.write_from(offset, data);
        }

        let span = SectorSpan::covering(offset, data.len(), self.sector_size);
        let mut aligned = AlignedBuffer::zeroed(span.len, self.sector_size as usize);
        if !span.is_exact(data.len()) {
            // Read-modify-write the partial sectors at either end
            let filled = self.read_into(span.start, &mut aligned)?;
            if filled < span.len {
                return Err(MendError::ShortWrite {
                    offset,
                    written: 0,
                    expected: data.len(),
                });
            }
        }
        aligned[span.lead..span.lead + data.len()].copy_from_slice(data);
        self.write_from(span.start, &aligned)
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn unlock(&mut self) -> bool {
        let unlocked = self.control(FSCTL_UNLOCK_VOLUME, "unlock");
        if unlocked {
            self.locked = false;
        }
        unlocked
    }

    fn dismount(&mut self) -> bool {
        self.control(FSCTL_DISMOUNT_VOLUME, "dismount")
    }
}

impl Drop for WindowsVolume {
    fn drop(&mut self) {
        self.close();
    }
}
