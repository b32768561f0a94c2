// Byte offsets derived from a (possibly corrupt) boot sector
// All arithmetic is checked: a garbage field yields None rather than a
// wrapped offset somewhere else on the disk.

use crate::ntfs::boot_sector::BootSector;
use crate::ntfs::structures::{BOOT_SECTOR_SIZE, MIRRORED_RECORD_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeGeometry {
    pub bytes_per_sector: u16,
    pub cluster_size: u64,
    pub record_size: u32,
    pub volume_size: Option<u64>,
    pub mft_offset: Option<u64>,
    pub mirror_offset: Option<u64>,
}

impl VolumeGeometry {
    pub fn from_boot_sector(boot: &BootSector) -> Self {
        let cluster_size = boot.cluster_size();
        Self {
            bytes_per_sector: boot.bytes_per_sector,
            cluster_size,
            record_size: boot.mft_record_size(),
            volume_size: boot.volume_size(),
            mft_offset: boot.mft_cluster.checked_mul(cluster_size),
            mirror_offset: boot.mft_mirror_cluster.checked_mul(cluster_size),
        }
    }

    /// Offset of MFT record `index`
    pub fn record_offset(&self, index: u64) -> Option<u64> {
        let mft = self.mft_offset?;
        index
            .checked_mul(self.record_size as u64)
            .and_then(|delta| mft.checked_add(delta))
    }

    /// The backup boot sector occupies the last sector-sized slot of the volume.
    pub fn backup_boot_sector_offset(&self) -> Option<u64> {
        self.volume_size?.checked_sub(BOOT_SECTOR_SIZE as u64)
    }

    /// Bytes copied from the MFT into the mirror
    pub fn mirror_copy_len(&self) -> Option<u32> {
        match self.record_size.checked_mul(MIRRORED_RECORD_COUNT) {
            Some(0) | None => None,
            len => len,
        }
    }
}
