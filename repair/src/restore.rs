// Binary repairs: boot sector restore and MFT mirror resync
// Each returns whether the repair was applied. Failures are written to the
// operation log and never abort the caller.

use crate::ntfs::structures::BOOT_SECTOR_SIZE;
use crate::ntfs::{decode_boot_sector, VolumeGeometry};
use ntfsmend_core::{BlockDevice, EngineConfig, OperationLog};

/// Copy the backup boot sector from the end of the volume over sector 0.
///
/// The backup location comes from the primary sector's own geometry, so a
/// primary whose `total_sectors` or `bytes_per_sector` is corrupt points at
/// the wrong place; the validity check on the backup catches that case.
pub fn restore_boot_sector<D: BlockDevice + ?Sized>(
    device: &mut D,
    geometry: &VolumeGeometry,
    log: &mut OperationLog,
    config: &EngineConfig,
) -> bool {
    let Some(backup_offset) = geometry.backup_boot_sector_offset() else {
        log.record("Boot sector geometry does not locate a backup boot sector");
        return false;
    };

    log.record(format!("Reading backup boot sector from offset {}...", backup_offset));
    let backup = match device.read_at(backup_offset, BOOT_SECTOR_SIZE as u32) {
        Ok(bytes) => bytes,
        Err(e) => {
            log.record(format!("Failed to read backup boot sector: {}", e));
            return false;
        }
    };

    let sector = match decode_boot_sector(&backup) {
        Ok(sector) => sector,
        Err(e) => {
            log.record(format!("Failed to read backup boot sector: {}", e));
            return false;
        }
    };
    if let Some(defect) = sector.first_defect() {
        log.record(format!("Backup boot sector is also invalid ({})", defect));
        return false;
    }

    log.record("Writing backup boot sector to primary location...");
    if let Err(e) = device.write_at(0, &backup) {
        log.record(format!("Failed to write boot sector: {}", e));
        return false;
    }
    if config.verify_writes && !verify_written(device, 0, &backup, log) {
        return false;
    }

    log.record("Boot sector restored successfully");
    true
}

/// Copy the first four MFT records verbatim over the MFT mirror.
///
/// Records larger than `max_record_probe` are refused.
pub fn resync_mft_mirror<D: BlockDevice + ?Sized>(
    device: &mut D,
    geometry: &VolumeGeometry,
    log: &mut OperationLog,
    config: &EngineConfig,
) -> bool {
    let (Some(mft_offset), Some(mirror_offset), Some(len)) = (
        geometry.mft_offset,
        geometry.mirror_offset,
        geometry.mirror_copy_len(),
    ) else {
        log.record("Boot sector geometry does not locate the MFT and its mirror");
        return false;
    };

    if geometry.record_size > config.max_record_probe {
        log.record(format!(
            "MFT record size {} exceeds the {} byte limit; MFT Mirror not copied",
            geometry.record_size, config.max_record_probe
        ));
        return false;
    }

    log.record("Copying MFT records to MFT Mirror...");
    let records = match device.read_at(mft_offset, len) {
        Ok(bytes) if bytes.len() == len as usize => bytes,
        Ok(bytes) => {
            log.record(format!(
                "Failed to read MFT data: got {} of {} bytes",
                bytes.len(),
                len
            ));
            return false;
        }
        Err(e) => {
            log.record(format!("Failed to read MFT data: {}", e));
            return false;
        }
    };

    if let Err(e) = device.write_at(mirror_offset, &records) {
        log.record(format!("Failed to write MFT Mirror: {}", e));
        return false;
    }
    if config.verify_writes && !verify_written(device, mirror_offset, &records, log) {
        return false;
    }

    log.record("MFT Mirror updated successfully");
    true
}

fn verify_written<D: BlockDevice + ?Sized>(
    device: &mut D,
    offset: u64,
    expected: &[u8],
    log: &mut OperationLog,
) -> bool {
    match device.read_at(offset, expected.len() as u32) {
        Ok(actual) if actual == expected => true,
        Ok(_) => {
            log.record(format!("Verification failed: data at offset {} differs after write", offset));
            false
        }
        Err(e) => {
            log.record(format!("Verification failed: cannot read back offset {}: {}", offset, e));
            false
        }
    }
}
