// NTFS volume analysis and targeted repair
pub mod engine;
pub mod ntfs;
pub mod restore;
pub mod test_helpers;

pub use engine::{EngineState, RepairEngine};
pub use ntfs::{BootSector, MftRecordHeader, VolumeGeometry};
pub use restore::{restore_boot_sector, resync_mft_mirror};
