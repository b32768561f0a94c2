// NTFS on-disk constants
// Offsets are relative to the start of the structure, all fields little endian.

use static_assertions::const_assert;

pub const BOOT_SECTOR_SIZE: usize = 512;
pub const NTFS_OEM_ID: &str = "NTFS";
pub const BOOT_SECTOR_END_MARKER: u16 = 0xAA55;
pub const MIN_BYTES_PER_SECTOR: u16 = 512;

// Boot sector field offsets
pub const BS_JUMP: usize = 0x00;
pub const BS_OEM_ID: usize = 0x03;
pub const BS_BYTES_PER_SECTOR: usize = 0x0B;
pub const BS_SECTORS_PER_CLUSTER: usize = 0x0D;
pub const BS_TOTAL_SECTORS: usize = 0x28;
pub const BS_MFT_CLUSTER: usize = 0x30;
pub const BS_MFT_MIRROR_CLUSTER: usize = 0x38;
pub const BS_MFT_RECORD_SIZE: usize = 0x40;
pub const BS_INDEX_BLOCK_SIZE: usize = 0x44;
pub const BS_VOLUME_SERIAL: usize = 0x48;
pub const BS_END_MARKER: usize = 0x1FE;

/// "FILE" read as a little-endian u32
pub const MFT_RECORD_SIGNATURE: u32 = 0x454C_4946;
pub const MFT_RECORD_HEADER_SIZE: usize = 48;

// MFT record header field offsets
pub const MR_SIGNATURE: usize = 0x00;
pub const MR_USA_OFFSET: usize = 0x04;
pub const MR_USA_COUNT: usize = 0x06;
pub const MR_LSN: usize = 0x08;
pub const MR_SEQUENCE_NUMBER: usize = 0x10;
pub const MR_HARD_LINK_COUNT: usize = 0x12;
pub const MR_FIRST_ATTRIBUTE: usize = 0x14;
pub const MR_FLAGS: usize = 0x16;
pub const MR_USED_SIZE: usize = 0x18;
pub const MR_ALLOCATED_SIZE: usize = 0x1C;
pub const MR_BASE_RECORD: usize = 0x20;
pub const MR_NEXT_ATTRIBUTE_ID: usize = 0x28;
pub const MR_RECORD_NUMBER: usize = 0x2C;

// MFT record flags
pub const MFT_RECORD_IN_USE: u16 = 0x0001;
pub const MFT_RECORD_IS_DIRECTORY: u16 = 0x0002;

/// Records $MFT, $MFTMirr, $LogFile and $Volume, the set the mirror holds
pub const MIRRORED_RECORD_COUNT: u32 = 4;

/// Conventional names of MFT records 0 to 9
pub const SYSTEM_FILES: [&str; 10] = [
    "$MFT", "$MFTMirr", "$LogFile", "$Volume", "$AttrDef",
    "$Root", "$Bitmap", "$Boot", "$BadClus", "$Secure",
];

const_assert!(BS_END_MARKER + 2 == BOOT_SECTOR_SIZE);
const_assert!(BS_VOLUME_SERIAL + 8 <= BOOT_SECTOR_SIZE);
const_assert!(MR_RECORD_NUMBER + 4 == MFT_RECORD_HEADER_SIZE);
const_assert!(MIRRORED_RECORD_COUNT as usize <= SYSTEM_FILES.len());
