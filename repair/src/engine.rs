// NTFS analysis and repair engine
// Owns one volume handle at a time and the operation log for its lifetime.

use crate::ntfs::structures::{
    BOOT_SECTOR_SIZE, MFT_RECORD_HEADER_SIZE, MFT_RECORD_SIGNATURE, SYSTEM_FILES,
};
use crate::ntfs::{decode_boot_sector, decode_mft_record_header, MftRecordHeader, VolumeGeometry};
use crate::restore::{restore_boot_sector, resync_mft_mirror};
use ntfsmend_core::{
    AccessMode, BlockDevice, EngineConfig, Finding, IssueKind, MendError, OperationLog,
    RepairResult, VolumeOpener, VolumeTarget,
};
use ntfsmend_platform::PlatformOpener;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Closed,
    OpenForAnalysis,
    OpenForRepair,
}

struct Session<D> {
    device: D,
    mode: AccessMode,
}

pub struct RepairEngine<O: VolumeOpener = PlatformOpener> {
    target: VolumeTarget,
    opener: O,
    config: EngineConfig,
    session: Option<Session<O::Device>>,
    log: OperationLog,
    geometry: Option<VolumeGeometry>,
}

impl RepairEngine<PlatformOpener> {
    /// Engine for a real device on this machine.
    pub fn new(target: VolumeTarget) -> Self {
        Self::with_opener(target, PlatformOpener)
    }
}

impl<O: VolumeOpener> RepairEngine<O> {
    pub fn with_opener(target: VolumeTarget, opener: O) -> Self {
        Self {
            target,
            opener,
            config: EngineConfig::default(),
            session: None,
            log: OperationLog::new(),
            geometry: None,
        }
    }

    /// Replace the default configuration. Rejects settings that
    /// `EngineConfig::validate` rejects.
    pub fn with_config(mut self, config: EngineConfig) -> Result<Self, MendError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn target(&self) -> &VolumeTarget {
        &self.target
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        match &self.session {
            None => EngineState::Closed,
            Some(s) if s.mode.is_writable() => EngineState::OpenForRepair,
            Some(_) => EngineState::OpenForAnalysis,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Trace lines recorded so far, `[HH:MM:SS] message`.
    pub fn operation_log(&self) -> Vec<String> {
        self.log.lines()
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    /// Open the volume, read-only for analysis or locked read-write for repair.
    ///
    /// A failed volume lock is only a warning. Switching modes requires
    /// `close` first.
    pub fn open(&mut self, writable: bool) -> Result<(), MendError> {
        if self.session.is_some() {
            return Err(MendError::InvalidState(format!(
                "{} is already open; close it before reopening",
                self.target.label()
            )));
        }

        let mode = AccessMode::from_writable(writable);
        let mut device = match self.opener.open(&self.target, mode) {
            Ok(device) => device,
            Err(e) => {
                let purpose = if writable { "writing" } else { "reading" };
                self.log.record(format!("Failed to open volume for {}: {}", purpose, e));
                return Err(e);
            }
        };

        if writable {
            self.log.record("Locking volume for exclusive access...");
            if !device.is_locked() {
                self.log.record("Warning: Could not lock volume");
            }
            if self.config.dismount_before_repair {
                if device.dismount() {
                    self.log.record("Volume dismounted");
                } else {
                    self.log.record("Warning: Could not dismount volume");
                }
            }
        }

        self.log.record(format!(
            "Opened {} for {}",
            self.target.label(),
            if writable { "repair" } else { "analysis" }
        ));
        self.session = Some(Session { device, mode });
        Ok(())
    }

    /// Release the handle (unlock, then close). No-op when already closed.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            drop(session);
            self.log.record(format!("Closed {}", self.target.label()));
        }
    }

    /// Inspect the boot sector, MFT, MFT mirror and system file records.
    pub fn analyze(&mut self) -> RepairResult {
        let Some(session) = self.session.as_mut() else {
            return RepairResult::with_message("Volume not open");
        };

        let (result, geometry) = analyze_volume(&mut session.device, &mut self.log, &self.config);
        self.geometry = geometry;
        result
    }

    /// Analyze, then restore the boot sector and resync the MFT mirror where
    /// the analysis calls for it.
    pub fn repair(&mut self) -> RepairResult {
        if self.state() != EngineState::OpenForRepair {
            return RepairResult::with_message("Volume not open for writing");
        }

        self.log.record("=== NTFS Repair ===");
        let analysis = self.analyze();

        let mut result = RepairResult::new();
        result.errors_found = analysis.errors_found;

        if analysis.errors_found == 0 {
            result.success = true;
            result.message = "No errors to repair".to_string();
            return result;
        }

        self.log.record(format!(
            "Attempting to repair {} issue(s)...",
            analysis.errors_found
        ));

        let (Some(session), Some(geometry)) = (self.session.as_mut(), self.geometry) else {
            self.log.record("Boot sector unreadable; nothing can be located for repair");
            result.message = format!("Repaired 0 of {} issues", result.errors_found);
            return result;
        };

        let mft_usable = !analysis.issues().any(|issue| {
            matches!(issue, IssueKind::UnreadableMft | IssueKind::InvalidMftSignature { .. })
        });

        for issue in analysis.issues() {
            match issue {
                IssueKind::InvalidBootSector(_) => {
                    self.log.record("Attempting boot sector repair from backup...");
                    if restore_boot_sector(&mut session.device, &geometry, &mut self.log, &self.config) {
                        result.errors_fixed += 1;
                        result.push(Finding::info("Boot sector restored from backup"));
                    }
                }
                IssueKind::MftMirrorUnverified if !mft_usable => {
                    self.log.record("MFT failed analysis; leaving the MFT Mirror as it is");
                }
                IssueKind::UnreadableMftMirror
                | IssueKind::InvalidMftMirror { .. }
                | IssueKind::MftMirrorUnverified => {
                    self.log.record("Attempting MFT Mirror repair...");
                    if resync_mft_mirror(&mut session.device, &geometry, &mut self.log, &self.config) {
                        result.errors_fixed += 1;
                        result.push(Finding::info("MFT Mirror repaired from MFT"));
                    }
                }
                IssueKind::UnreadableBootSector
                | IssueKind::UnreadableMft
                | IssueKind::InvalidMftSignature { .. }
                | IssueKind::CorruptSystemFile { .. }
                | IssueKind::SystemFileNotInUse { .. } => {}
            }
        }

        result.success = result.errors_fixed > 0;
        result.message = format!(
            "Repaired {} of {} issues",
            result.errors_fixed, result.errors_found
        );
        self.log.record(result.message.clone());
        result
    }
}

enum RecordProbe {
    Missing,
    Found(MftRecordHeader),
}

/// Read the header of the record at `offset`. Anything short of a full
/// header counts as missing.
fn probe_record<D: BlockDevice + ?Sized>(
    device: &mut D,
    offset: Option<u64>,
    record_size: u32,
    config: &EngineConfig,
) -> RecordProbe {
    let Some(offset) = offset else {
        return RecordProbe::Missing;
    };
    let count = record_size.min(config.max_record_probe);
    if (count as usize) < MFT_RECORD_HEADER_SIZE {
        return RecordProbe::Missing;
    }

    match device.read_at(offset, count) {
        Ok(bytes) => match decode_mft_record_header(&bytes) {
            Ok(header) => RecordProbe::Found(header),
            Err(e) => {
                log::debug!("MFT record at {:#x}: {}", offset, e);
                RecordProbe::Missing
            }
        },
        Err(e) => {
            log::debug!("MFT record at {:#x} unreadable: {}", offset, e);
            RecordProbe::Missing
        }
    }
}

fn analyze_volume<D: BlockDevice + ?Sized>(
    device: &mut D,
    log: &mut OperationLog,
    config: &EngineConfig,
) -> (RepairResult, Option<VolumeGeometry>) {
    let mut result = RepairResult::new();
    log.record("=== NTFS Volume Analysis ===");

    // 1. Boot sector
    log.record("Reading boot sector...");
    let boot = match device
        .read_at(0, BOOT_SECTOR_SIZE as u32)
        .and_then(|bytes| decode_boot_sector(&bytes))
    {
        Ok(boot) => boot,
        Err(e) => {
            log.record(format!("Failed to read boot sector: {}", e));
            result.push(Finding::critical(
                IssueKind::UnreadableBootSector,
                "Cannot read boot sector",
            ));
            result.errors_found = result.error_findings();
            result.message = "Failed to read boot sector".to_string();
            return (result, None);
        }
    };

    // 2. Boot sector invariants
    match boot.first_defect() {
        Some(defect) => {
            log.record(format!("Boot sector: INVALID ({})", defect));
            let message = format!("Invalid boot sector: {}", defect);
            result.push(Finding::critical(IssueKind::InvalidBootSector(defect), message));
        }
        None => {
            log.record("Boot sector: VALID");
            result.push(Finding::info("Boot sector: OK"));
        }
    }

    // 3. Geometry, taken from the sector even when it failed validation
    let geometry = VolumeGeometry::from_boot_sector(&boot);
    log.record(format!("  Bytes per sector: {}", boot.bytes_per_sector));
    log.record(format!("  Sectors per cluster: {}", boot.sectors_per_cluster));
    log.record(format!("  Cluster size: {} bytes", geometry.cluster_size));
    log.record(format!("  MFT record size: {} bytes", geometry.record_size));
    match geometry.volume_size {
        Some(size) => log.record(format!(
            "  Volume size: {:.2} GB",
            size as f64 / (1024.0 * 1024.0 * 1024.0)
        )),
        None => log.record("  Volume size: out of range"),
    }
    log.record(format!("  MFT starts at cluster: {}", boot.mft_cluster));
    log.record(format!("  MFT mirror at cluster: {}", boot.mft_mirror_cluster));

    // 4. $MFT
    log.record("Checking Master File Table (MFT)...");
    match probe_record(device, geometry.mft_offset, geometry.record_size, config) {
        RecordProbe::Missing => {
            result.push(Finding::critical(IssueKind::UnreadableMft, "Cannot read MFT"));
        }
        RecordProbe::Found(header) if !header.is_valid() => {
            log::debug!("MFT record 0 signature bytes: {}", header.signature_hex());
            result.push(Finding::critical(
                IssueKind::InvalidMftSignature { signature: header.signature },
                format!(
                    "MFT record signature invalid: 0x{:08X} (expected 0x{:08X} 'FILE')",
                    header.signature, MFT_RECORD_SIGNATURE
                ),
            ));
        }
        RecordProbe::Found(_) => {
            log.record("MFT record 0 ($MFT): VALID");
            result.push(Finding::info("MFT: OK"));
        }
    }

    // 5. $MFTMirr
    log.record("Checking MFT Mirror...");
    match probe_record(device, geometry.mirror_offset, geometry.record_size, config) {
        RecordProbe::Missing => {
            result.push(Finding::warning(
                IssueKind::UnreadableMftMirror,
                "Cannot read MFT Mirror",
            ));
        }
        RecordProbe::Found(header) if !header.is_valid() => {
            log::debug!("MFT mirror signature bytes: {}", header.signature_hex());
            result.push(Finding::warning(
                IssueKind::InvalidMftMirror { signature: header.signature },
                format!(
                    "MFT Mirror signature invalid: 0x{:08X} (expected 0x{:08X} 'FILE')",
                    header.signature, MFT_RECORD_SIGNATURE
                ),
            ));
        }
        RecordProbe::Found(_) => {
            log.record("MFT Mirror: VALID");
            result.push(Finding::note(IssueKind::MftMirrorUnverified, "MFT Mirror: OK"));
        }
    }

    // 6. System file records 0-9
    log.record("Checking critical system files...");
    let before = result.error_findings();
    for (index, name) in SYSTEM_FILES.iter().enumerate() {
        let offset = geometry.record_offset(index as u64);
        let index = index as u8;
        match probe_record(device, offset, geometry.record_size, config) {
            RecordProbe::Found(header) if header.is_valid() && header.is_in_use() => {}
            RecordProbe::Found(header) if header.is_valid() => {
                result.push(Finding::warning(
                    IssueKind::SystemFileNotInUse { index },
                    format!("System file {} (record {}) not marked as in use", name, index),
                ));
            }
            _ => {
                result.push(Finding::warning(
                    IssueKind::CorruptSystemFile { index },
                    format!("System file {} (record {}) corrupted", name, index),
                ));
            }
        }
    }
    if result.error_findings() == before {
        log.record("All critical system files: VALID");
    }

    // 7. Summary
    result.errors_found = result.error_findings();
    result.success = result.errors_found == 0;
    result.message = if result.success {
        "Volume appears healthy".to_string()
    } else {
        format!("Found {} issue(s) requiring attention", result.errors_found)
    };
    log.record("=== Analysis Complete ===");
    log.record(format!("Errors found: {}", result.errors_found));

    (result, Some(geometry))
}
