// Test helpers for building NTFS volume images in memory

use crate::ntfs::structures::*;
use crate::ntfs::{encode_boot_sector, encode_mft_record_header, BootSector, MftRecordHeader};
use ntfsmend_core::test_utils::MemoryDisk;

/// Records written into a test MFT (system files plus a few user records)
const TEST_RECORD_COUNT: u64 = 16;

/// Builder for small, structurally valid NTFS images.
#[derive(Debug, Clone)]
pub struct TestVolumeBuilder {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub total_sectors: u64,
    pub mft_cluster: u64,
    pub mirror_cluster: u64,
    pub record_size_code: i8,
}

impl Default for TestVolumeBuilder {
    fn default() -> Self {
        // 256 KiB volume, 4 KiB clusters, 1 KiB records
        Self {
            bytes_per_sector: 512,
            sectors_per_cluster: 8,
            total_sectors: 512,
            mft_cluster: 4,
            mirror_cluster: 32,
            record_size_code: -10,
        }
    }
}

impl TestVolumeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_size_code(mut self, code: i8) -> Self {
        self.record_size_code = code;
        self
    }

    pub fn total_sectors(mut self, total_sectors: u64) -> Self {
        self.total_sectors = total_sectors;
        self
    }

    pub fn build(&self) -> TestVolume {
        let boot = BootSector {
            jump: [0xEB, 0x52, 0x90],
            oem_id: *b"NTFS    ",
            bytes_per_sector: self.bytes_per_sector,
            sectors_per_cluster: self.sectors_per_cluster,
            total_sectors: self.total_sectors,
            mft_cluster: self.mft_cluster,
            mft_mirror_cluster: self.mirror_cluster,
            mft_record_size_code: self.record_size_code,
            index_block_size_code: -12,
            volume_serial: 0x5A5A_1234_0BAD_F00D,
            end_marker: BOOT_SECTOR_END_MARKER,
        };

        let size = (self.total_sectors * self.bytes_per_sector as u64) as usize;
        let mut volume = TestVolume {
            bytes: vec![0u8; size],
            boot,
        };

        let mut sector = vec![0u8; BOOT_SECTOR_SIZE];
        // Recognisable bootstrap filler
        for (i, b) in sector.iter_mut().enumerate().skip(0x54).take(426) {
            *b = (i % 199) as u8;
        }
        encode_boot_sector(&volume.boot, &mut sector).expect("sector is 512 bytes");
        volume.write(0, &sector);
        volume.write(volume.backup_offset() as usize, &sector);

        let record_size = volume.record_size();
        for index in 0..TEST_RECORD_COUNT {
            let mut record = vec![index as u8 ^ 0xA5; record_size];
            let mut flags = MFT_RECORD_IN_USE;
            if index == 5 {
                flags |= MFT_RECORD_IS_DIRECTORY;
            }
            let header = MftRecordHeader {
                signature: MFT_RECORD_SIGNATURE,
                usa_offset: 0x30,
                usa_count: (record_size / 512 + 1) as u16,
                lsn: 0x10_0000 + index,
                sequence_number: index.max(1) as u16,
                hard_link_count: 1,
                first_attribute_offset: 0x38,
                flags,
                used_size: 0x1A0,
                allocated_size: record_size as u32,
                base_record: 0,
                next_attribute_id: 4,
                record_number: index as u32,
            };
            encode_mft_record_header(&header, &mut record).expect("record holds a header");
            volume.write(volume.record_offset(index), &record);
        }

        let mirrored = volume.read(volume.mft_offset(), volume.mirror_len());
        volume.write(volume.mirror_offset(), &mirrored);
        volume
    }
}

/// An in-memory NTFS image plus the boot sector it was built from.
#[derive(Debug, Clone)]
pub struct TestVolume {
    pub bytes: Vec<u8>,
    pub boot: BootSector,
}

impl TestVolume {
    pub fn healthy() -> Self {
        TestVolumeBuilder::default().build()
    }

    pub fn cluster_size(&self) -> usize {
        self.boot.cluster_size() as usize
    }

    pub fn record_size(&self) -> usize {
        self.boot.mft_record_size() as usize
    }

    pub fn mft_offset(&self) -> usize {
        self.boot.mft_cluster as usize * self.cluster_size()
    }

    pub fn mirror_offset(&self) -> usize {
        self.boot.mft_mirror_cluster as usize * self.cluster_size()
    }

    pub fn record_offset(&self, index: u64) -> usize {
        self.mft_offset() + index as usize * self.record_size()
    }

    pub fn mirror_len(&self) -> usize {
        MIRRORED_RECORD_COUNT as usize * self.record_size()
    }

    pub fn backup_offset(&self) -> u64 {
        self.boot.total_sectors * self.boot.bytes_per_sector as u64 - BOOT_SECTOR_SIZE as u64
    }

    pub fn read(&self, offset: usize, len: usize) -> Vec<u8> {
        self.bytes[offset..offset + len].to_vec()
    }

    pub fn write(&mut self, offset: usize, data: &[u8]) {
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn primary_boot_sector(&self) -> Vec<u8> {
        self.read(0, BOOT_SECTOR_SIZE)
    }

    pub fn backup_boot_sector(&self) -> Vec<u8> {
        self.read(self.backup_offset() as usize, BOOT_SECTOR_SIZE)
    }

    pub fn corrupt_primary_end_marker(&mut self) {
        self.write(BS_END_MARKER, &[0x00, 0x00]);
    }

    pub fn corrupt_primary_oem_id(&mut self, oem_id: &[u8; 8]) {
        self.write(BS_OEM_ID, oem_id);
    }

    pub fn corrupt_backup_end_marker(&mut self) {
        let offset = self.backup_offset() as usize + BS_END_MARKER;
        self.write(offset, &[0x12, 0x34]);
    }

    pub fn corrupt_record_signature(&mut self, index: u64) {
        let offset = self.record_offset(index);
        self.write(offset, b"BAAD");
    }

    pub fn clear_in_use(&mut self, index: u64) {
        let offset = self.record_offset(index) + MR_FLAGS;
        self.write(offset, &[0x00, 0x00]);
    }

    pub fn corrupt_mirror_signature(&mut self) {
        let offset = self.mirror_offset();
        self.write(offset, b"\0\0\0\0");
    }

    /// Make the mirror stale without breaking its signature.
    pub fn stale_mirror_body(&mut self) {
        let offset = self.mirror_offset() + 0x100;
        self.write(offset, &[0xEE; 64]);
    }

    pub fn disk(&self) -> MemoryDisk {
        MemoryDisk::from_bytes(self.bytes.clone())
    }
}
