pub mod config;
pub mod device;
pub mod error;
pub mod oplog;
pub mod report;
pub mod test_utils;

pub use config::EngineConfig;
pub use device::{AccessMode, BlockDevice, VolumeOpener, VolumeTarget};
pub use error::MendError;
pub use oplog::{LogEntry, OperationLog};
pub use report::{BootSectorDefect, Finding, IssueKind, RepairResult, Severity};
