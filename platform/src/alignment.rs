// Sector alignment for unbuffered device I/O
// Windows rejects FILE_FLAG_NO_BUFFERING transfers whose offset, length or
// buffer address is not a multiple of the sector size.

use std::ops::{Deref, DerefMut};

pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// Round down to previous multiple of alignment
pub fn align_down(value: u64, alignment: u64) -> u64 {
    value / alignment * alignment
}

/// Round up to next multiple of alignment
pub fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) / alignment * alignment
}

/// The sector-aligned window that covers a byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorSpan {
    /// Aligned device offset the transfer starts at
    pub start: u64,
    /// Aligned transfer length
    pub len: usize,
    /// Where the caller's first byte sits inside the window
    pub lead: usize,
}

impl SectorSpan {
    pub fn covering(offset: u64, count: usize, sector_size: u32) -> Self {
        let sector = sector_size.max(1) as u64;
        let start = align_down(offset, sector);
        let end = align_up(offset + count as u64, sector);
        Self {
            start,
            len: (end - start) as usize,
            lead: (offset - start) as usize,
        }
    }

    pub fn is_exact(&self, count: usize) -> bool {
        self.lead == 0 && self.len == count
    }
}

/// Zeroed heap buffer whose first byte sits on an `align` boundary.
pub struct AlignedBuffer {
    storage: Vec<u8>,
    start: usize,
    len: usize,
}

impl AlignedBuffer {
    pub fn zeroed(len: usize, align: usize) -> Self {
        let align = align.max(1);
        let storage = vec![0u8; len + align];
        let addr = storage.as_ptr() as usize;
        let start = (align - addr % align) % align;
        Self { storage, start, len }
    }

    pub fn from_slice(data: &[u8], align: usize) -> Self {
        let mut buffer = Self::zeroed(data.len(), align);
        buffer.copy_from_slice(data);
        buffer
    }

    pub fn is_aligned(&self, align: usize) -> bool {
        self.as_ptr() as usize % align == 0
    }
}

impl Deref for AlignedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.storage[self.start..self.start + self.len]
    }
}

impl DerefMut for AlignedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.start..self.start + self.len]
    }
}
