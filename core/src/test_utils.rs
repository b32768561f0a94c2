/// In-memory volumes for exercising engines without touching real hardware
use crate::{AccessMode, BlockDevice, MendError, VolumeOpener, VolumeTarget};
use std::io;
use std::ops::Range;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct DiskState {
    data: Vec<u8>,
    writes: Vec<(u64, Vec<u8>)>,
    opens: Vec<AccessMode>,
    failing_reads: Vec<Range<u64>>,
    fail_writes: bool,
    refuse_lock: bool,
    refuse_open: bool,
    locked: bool,
    dismounts: usize,
    releases: usize,
}

/// A volume image held in memory. Clones share the same bytes, so a test can
/// keep one copy to inspect what an engine wrote through another.
#[derive(Clone, Debug, Default)]
pub struct MemoryDisk {
    state: Arc<Mutex<DiskState>>,
}

impl MemoryDisk {
    pub fn new(size: usize) -> Self {
        Self::from_bytes(vec![0u8; size])
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        let disk = Self::default();
        disk.state.lock().unwrap().data = data;
        disk
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.state.lock().unwrap().data.clone()
    }

    pub fn slice(&self, offset: usize, len: usize) -> Vec<u8> {
        self.state.lock().unwrap().data[offset..offset + len].to_vec()
    }

    /// Overwrite bytes directly, bypassing the write log.
    pub fn poke(&self, offset: usize, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Every `write_at` that reached the disk, in order.
    pub fn writes(&self) -> Vec<(u64, Vec<u8>)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn opens(&self) -> Vec<AccessMode> {
        self.state.lock().unwrap().opens.clone()
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().unwrap().locked
    }

    pub fn dismount_count(&self) -> usize {
        self.state.lock().unwrap().dismounts
    }

    /// Number of handles that have been dropped or closed.
    pub fn release_count(&self) -> usize {
        self.state.lock().unwrap().releases
    }

    /// Reads touching `range` fail with an I/O error.
    pub fn fail_reads_in(&self, range: Range<u64>) {
        self.state.lock().unwrap().failing_reads.push(range);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn refuse_lock(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_lock = refuse;
    }

    pub fn refuse_open(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_open = refuse;
    }
}

impl VolumeOpener for MemoryDisk {
    type Device = MemoryHandle;

    fn open(&self, target: &VolumeTarget, mode: AccessMode) -> Result<MemoryHandle, MendError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_open {
            return Err(MendError::InsufficientPrivileges(target.device_path()));
        }
        state.opens.push(mode);

        let mut locked = false;
        if mode.is_writable() && !state.refuse_lock {
            state.locked = true;
            locked = true;
        }

        Ok(MemoryHandle {
            disk: self.clone(),
            writable: mode.is_writable(),
            locked,
            closed: false,
        })
    }
}

/// Open handle onto a [`MemoryDisk`].
#[derive(Debug)]
pub struct MemoryHandle {
    disk: MemoryDisk,
    writable: bool,
    locked: bool,
    closed: bool,
}

impl MemoryHandle {
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.locked {
            self.unlock();
        }
        self.closed = true;
        self.disk.state.lock().unwrap().releases += 1;
    }
}

impl BlockDevice for MemoryHandle {
    fn read_at(&mut self, offset: u64, count: u32) -> Result<Vec<u8>, MendError> {
        if self.closed {
            return Err(MendError::HandleClosed);
        }
        let state = self.disk.state.lock().unwrap();
        let end = offset.saturating_add(count as u64);
        if state
            .failing_reads
            .iter()
            .any(|r| offset < r.end && r.start < end)
        {
            return Err(MendError::IoError(io::Error::new(
                io::ErrorKind::Other,
                format!("injected read failure at {:#x}", offset),
            )));
        }

        let len = state.data.len() as u64;
        if offset >= len {
            return Ok(Vec::new());
        }
        let end = end.min(len);
        Ok(state.data[offset as usize..end as usize].to_vec())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), MendError> {
        if self.closed {
            return Err(MendError::HandleClosed);
        }
        if !self.writable {
            return Err(MendError::IoError(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "handle opened read-only",
            )));
        }
        let mut state = self.disk.state.lock().unwrap();
        if state.fail_writes {
            return Err(MendError::IoError(io::Error::new(
                io::ErrorKind::Other,
                "injected write failure",
            )));
        }

        let len = state.data.len() as u64;
        let end = offset + data.len() as u64;
        if end > len {
            let written = len.saturating_sub(offset) as usize;
            return Err(MendError::ShortWrite {
                offset,
                written,
                expected: data.len(),
            });
        }
        state.data[offset as usize..end as usize].copy_from_slice(data);
        state.writes.push((offset, data.to_vec()));
        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn unlock(&mut self) -> bool {
        if !self.locked {
            return false;
        }
        self.locked = false;
        self.disk.state.lock().unwrap().locked = false;
        true
    }

    fn dismount(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.disk.state.lock().unwrap().dismounts += 1;
        true
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> VolumeTarget {
        VolumeTarget::Path("memory".into())
    }

    #[test]
    fn test_short_read_at_end() {
        let disk = MemoryDisk::from_bytes((0u8..=255).collect());
        let mut handle = disk.open(&target(), AccessMode::ReadOnly).unwrap();

        assert_eq!(handle.read_at(250, 10).unwrap(), vec![250, 251, 252, 253, 254, 255]);
        assert!(handle.read_at(300, 4).unwrap().is_empty());
    }

    #[test]
    fn test_read_only_handle_cannot_write() {
        let disk = MemoryDisk::new(1024);
        let mut handle = disk.open(&target(), AccessMode::ReadOnly).unwrap();
        assert!(handle.write_at(0, &[1, 2, 3]).is_err());
        assert!(disk.writes().is_empty());
    }

    #[test]
    fn test_drop_releases_lock() {
        let disk = MemoryDisk::new(1024);
        {
            let handle = disk.open(&target(), AccessMode::ReadWriteLocked).unwrap();
            assert!(handle.is_locked());
            assert!(disk.is_locked());
        }
        assert!(!disk.is_locked());
        assert_eq!(disk.release_count(), 1);
    }

    #[test]
    fn test_injected_failures() {
        let disk = MemoryDisk::new(4096);
        disk.fail_reads_in(1024..2048);
        disk.fail_writes(true);
        let mut handle = disk.open(&target(), AccessMode::ReadWriteLocked).unwrap();

        assert!(handle.read_at(0, 512).is_ok());
        assert!(handle.read_at(1000, 100).is_err());
        assert!(handle.write_at(0, &[0; 16]).is_err());

        handle.close();
        assert!(matches!(handle.read_at(0, 1), Err(MendError::HandleClosed)));
    }
}
