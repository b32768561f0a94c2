// NTFS boot sector codec
// Field-by-field decode/encode of the first 512 bytes of a volume. No I/O.

use crate::ntfs::structures::*;
use byteorder::{ByteOrder, LittleEndian};
use ntfsmend_core::{BootSectorDefect, MendError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootSector {
    pub jump: [u8; 3],
    pub oem_id: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub total_sectors: u64,
    pub mft_cluster: u64,
    pub mft_mirror_cluster: u64,
    /// Positive: clusters per record. Negative: record is `1 << -code` bytes.
    pub mft_record_size_code: i8,
    pub index_block_size_code: i8,
    pub volume_serial: u64,
    pub end_marker: u16,
}

impl BootSector {
    /// OEM id as text with surrounding padding removed
    pub fn oem_id_string(&self) -> String {
        String::from_utf8_lossy(&self.oem_id).trim().to_string()
    }

    pub fn cluster_size(&self) -> u64 {
        self.sectors_per_cluster as u64 * self.bytes_per_sector as u64
    }

    /// `None` when the declared geometry overflows a u64
    pub fn volume_size(&self) -> Option<u64> {
        self.total_sectors.checked_mul(self.bytes_per_sector as u64)
    }

    pub fn mft_record_size(&self) -> u32 {
        size_from_code(self.mft_record_size_code, self.cluster_size())
    }

    pub fn index_block_size(&self) -> u32 {
        size_from_code(self.index_block_size_code, self.cluster_size())
    }

    /// The first invariant this sector breaks, checked in the order
    /// OEM id, end marker, bytes per sector, sectors per cluster.
    pub fn first_defect(&self) -> Option<BootSectorDefect> {
        let oem_id = self.oem_id_string();
        if oem_id != NTFS_OEM_ID {
            return Some(BootSectorDefect::OemId { actual: oem_id });
        }
        if self.end_marker != BOOT_SECTOR_END_MARKER {
            return Some(BootSectorDefect::EndMarker { actual: self.end_marker });
        }
        if self.bytes_per_sector < MIN_BYTES_PER_SECTOR {
            return Some(BootSectorDefect::BytesPerSector { actual: self.bytes_per_sector });
        }
        if self.sectors_per_cluster == 0 {
            return Some(BootSectorDefect::SectorsPerCluster);
        }
        None
    }

    pub fn is_valid(&self) -> bool {
        self.first_defect().is_none()
    }
}

/// NTFS size encoding shared by the MFT record and index block fields.
/// Shifts past the width of a u32 yield 0, which no reader can satisfy.
fn size_from_code(code: i8, cluster_size: u64) -> u32 {
    if code > 0 {
        (code as u64 * cluster_size).min(u32::MAX as u64) as u32
    } else {
        1u32.checked_shl(code.unsigned_abs() as u32).unwrap_or(0)
    }
}

/// Decode the boot sector fields without validating them.
pub fn decode_boot_sector(bytes: &[u8]) -> Result<BootSector, MendError> {
    if bytes.len() < BOOT_SECTOR_SIZE {
        return Err(MendError::Decode {
            structure: "boot sector",
            needed: BOOT_SECTOR_SIZE,
            actual: bytes.len(),
        });
    }

    let mut jump = [0u8; 3];
    jump.copy_from_slice(&bytes[BS_JUMP..BS_JUMP + 3]);
    let mut oem_id = [0u8; 8];
    oem_id.copy_from_slice(&bytes[BS_OEM_ID..BS_OEM_ID + 8]);

    Ok(BootSector {
        jump,
        oem_id,
        bytes_per_sector: LittleEndian::read_u16(&bytes[BS_BYTES_PER_SECTOR..]),
        sectors_per_cluster: bytes[BS_SECTORS_PER_CLUSTER],
        total_sectors: LittleEndian::read_u64(&bytes[BS_TOTAL_SECTORS..]),
        mft_cluster: LittleEndian::read_u64(&bytes[BS_MFT_CLUSTER..]),
        mft_mirror_cluster: LittleEndian::read_u64(&bytes[BS_MFT_MIRROR_CLUSTER..]),
        mft_record_size_code: bytes[BS_MFT_RECORD_SIZE] as i8,
        index_block_size_code: bytes[BS_INDEX_BLOCK_SIZE] as i8,
        volume_serial: LittleEndian::read_u64(&bytes[BS_VOLUME_SERIAL..]),
        end_marker: LittleEndian::read_u16(&bytes[BS_END_MARKER..]),
    })
}

/// Write the decoded fields over `sector`, leaving every other byte
/// (bootstrap code, reserved fields) as it was.
pub fn encode_boot_sector(boot: &BootSector, sector: &mut [u8]) -> Result<(), MendError> {
    if sector.len() < BOOT_SECTOR_SIZE {
        return Err(MendError::Decode {
            structure: "boot sector",
            needed: BOOT_SECTOR_SIZE,
            actual: sector.len(),
        });
    }

    sector[BS_JUMP..BS_JUMP + 3].copy_from_slice(&boot.jump);
    sector[BS_OEM_ID..BS_OEM_ID + 8].copy_from_slice(&boot.oem_id);
    LittleEndian::write_u16(&mut sector[BS_BYTES_PER_SECTOR..], boot.bytes_per_sector);
    sector[BS_SECTORS_PER_CLUSTER] = boot.sectors_per_cluster;
    LittleEndian::write_u64(&mut sector[BS_TOTAL_SECTORS..], boot.total_sectors);
    LittleEndian::write_u64(&mut sector[BS_MFT_CLUSTER..], boot.mft_cluster);
    LittleEndian::write_u64(&mut sector[BS_MFT_MIRROR_CLUSTER..], boot.mft_mirror_cluster);
    sector[BS_MFT_RECORD_SIZE] = boot.mft_record_size_code as u8;
    sector[BS_INDEX_BLOCK_SIZE] = boot.index_block_size_code as u8;
    LittleEndian::write_u64(&mut sector[BS_VOLUME_SERIAL..], boot.volume_serial);
    LittleEndian::write_u16(&mut sector[BS_END_MARKER..], boot.end_marker);
    Ok(())
}

pub fn boot_sector_is_valid(boot: &BootSector) -> bool {
    boot.is_valid()
}

pub fn mft_record_size_bytes(boot: &BootSector) -> u32 {
    boot.mft_record_size()
}
