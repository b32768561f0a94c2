// NTFS layout codec - boot sector and MFT record header

pub mod boot_sector;
pub mod geometry;
pub mod mft_record;
pub mod structures;

pub use boot_sector::{
    boot_sector_is_valid, decode_boot_sector, encode_boot_sector, mft_record_size_bytes, BootSector,
};
pub use geometry::VolumeGeometry;
pub use mft_record::{
    decode_mft_record_header, encode_mft_record_header, mft_record_is_valid, MftRecordHeader,
};
