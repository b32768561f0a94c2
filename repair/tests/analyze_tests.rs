// Analysis against in-memory NTFS images

use ntfsmend_core::test_utils::MemoryDisk;
use ntfsmend_core::{BootSectorDefect, IssueKind, Severity, VolumeTarget};
use ntfsmend_repair::test_helpers::{TestVolume, TestVolumeBuilder};
use ntfsmend_repair::RepairEngine;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn analysis_engine(disk: &MemoryDisk) -> anyhow::Result<RepairEngine<MemoryDisk>> {
    init_logging();
    let mut engine = RepairEngine::with_opener(VolumeTarget::drive_letter('D')?, disk.clone());
    engine.open(false)?;
    Ok(engine)
}

#[test]
fn test_healthy_volume() -> anyhow::Result<()> {
    let disk = TestVolume::healthy().disk();
    let mut engine = analysis_engine(&disk)?;

    let result = engine.analyze();
    assert!(result.success);
    assert_eq!(result.errors_found, 0);
    assert_eq!(result.errors_fixed, 0);
    assert_eq!(result.message, "Volume appears healthy");
    assert_eq!(
        result.details(),
        vec!["Boot sector: OK", "MFT: OK", "MFT Mirror: OK"]
    );
    assert!(disk.writes().is_empty());
    assert_eq!(result.findings[2].issue, Some(IssueKind::MftMirrorUnverified));
    assert_eq!(result.findings[2].severity, Severity::Info);

    let log = engine.operation_log();
    assert!(log.iter().any(|l| l.ends_with("Boot sector: VALID")));
    assert!(log.iter().any(|l| l.ends_with("Cluster size: 4096 bytes")));
    assert!(log.iter().any(|l| l.ends_with("MFT record size: 1024 bytes")));
    assert!(log.iter().any(|l| l.ends_with("All critical system files: VALID")));
    assert!(log.iter().all(|l| l.starts_with('[') && l.as_bytes()[9] == b']'));
    Ok(())
}

#[test]
fn test_large_record_size_code() -> anyhow::Result<()> {
    // +2 clusters per record: 8 KiB records on this geometry
    let volume = TestVolumeBuilder::new()
        .record_size_code(2)
        .total_sectors(1024)
        .build();
    assert_eq!(volume.record_size(), 8192);

    let mut engine = analysis_engine(&volume.disk())?;
    let result = engine.analyze();
    assert!(result.success, "{:?}", result.details());
    Ok(())
}

#[test]
fn test_bad_end_marker_is_critical() -> anyhow::Result<()> {
    let mut volume = TestVolume::healthy();
    volume.corrupt_primary_end_marker();
    let mut engine = analysis_engine(&volume.disk())?;

    let result = engine.analyze();
    assert!(!result.success);
    assert!(result.has_critical());
    assert_eq!(result.errors_found, 1);
    assert_eq!(
        result.findings[0].issue,
        Some(IssueKind::InvalidBootSector(BootSectorDefect::EndMarker { actual: 0 }))
    );
    assert_eq!(
        result.details()[0],
        "CRITICAL: Invalid boot sector: end marker is 0x0000 (expected 0xAA55)"
    );
    assert_eq!(result.message, "Found 1 issue(s) requiring attention");
    Ok(())
}

#[test]
fn test_analysis_continues_after_invalid_boot_sector() -> anyhow::Result<()> {
    // Geometry still comes from the rejected sector, so the MFT checks run.
    let mut volume = TestVolume::healthy();
    volume.corrupt_primary_oem_id(b"MSDOS5.0");
    let mut engine = analysis_engine(&volume.disk())?;

    let result = engine.analyze();
    assert_eq!(result.errors_found, 1);
    assert_eq!(
        result.details(),
        vec![
            "CRITICAL: Invalid boot sector: OEM ID is 'MSDOS5.0' (expected 'NTFS')",
            "MFT: OK",
            "MFT Mirror: OK",
        ]
    );
    Ok(())
}

#[test]
fn test_unreadable_boot_sector_stops_analysis() -> anyhow::Result<()> {
    let disk = TestVolume::healthy().disk();
    disk.fail_reads_in(0..512);
    let mut engine = analysis_engine(&disk)?;

    let result = engine.analyze();
    assert!(!result.success);
    assert_eq!(result.message, "Failed to read boot sector");
    assert_eq!(result.errors_found, 1);
    assert_eq!(result.details(), vec!["CRITICAL: Cannot read boot sector"]);
    assert_eq!(result.findings[0].issue, Some(IssueKind::UnreadableBootSector));
    Ok(())
}

#[test]
fn test_truncated_device_is_unreadable() -> anyhow::Result<()> {
    let disk = MemoryDisk::new(100);
    let mut engine = analysis_engine(&disk)?;

    let result = engine.analyze();
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].issue, Some(IssueKind::UnreadableBootSector));
    Ok(())
}

#[test]
fn test_invalid_mft_signature() -> anyhow::Result<()> {
    let mut volume = TestVolume::healthy();
    volume.corrupt_record_signature(0);
    let mut engine = analysis_engine(&volume.disk())?;

    let result = engine.analyze();
    assert!(!result.success);
    assert_eq!(result.errors_found, 2);
    assert_eq!(
        result.details(),
        vec![
            "Boot sector: OK",
            "CRITICAL: MFT record signature invalid: 0x44414142 (expected 0x454C4946 'FILE')",
            "MFT Mirror: OK",
            "WARNING: System file $MFT (record 0) corrupted",
        ]
    );
    Ok(())
}

#[test]
fn test_unreadable_mft() -> anyhow::Result<()> {
    let volume = TestVolume::healthy();
    let disk = volume.disk();
    let start = volume.mft_offset() as u64;
    disk.fail_reads_in(start..start + 1);
    let mut engine = analysis_engine(&disk)?;

    let result = engine.analyze();
    let issues: Vec<_> = result.issues().cloned().collect();
    assert_eq!(
        issues,
        vec![
            IssueKind::UnreadableMft,
            IssueKind::MftMirrorUnverified,
            IssueKind::CorruptSystemFile { index: 0 },
        ]
    );
    assert_eq!(result.findings[1].severity, Severity::Critical);
    assert_eq!(result.findings[1].detail(), "CRITICAL: Cannot read MFT");
    Ok(())
}

#[test]
fn test_invalid_mirror_is_a_warning() -> anyhow::Result<()> {
    let mut volume = TestVolume::healthy();
    volume.corrupt_mirror_signature();
    let mut engine = analysis_engine(&volume.disk())?;

    let result = engine.analyze();
    assert!(!result.success);
    assert!(!result.has_critical());
    assert_eq!(result.errors_found, 1);
    assert_eq!(
        result.findings[2].issue,
        Some(IssueKind::InvalidMftMirror { signature: 0 })
    );
    assert_eq!(
        result.details()[2],
        "WARNING: MFT Mirror signature invalid: 0x00000000 (expected 0x454C4946 'FILE')"
    );
    Ok(())
}

#[test]
fn test_unreadable_mirror() -> anyhow::Result<()> {
    let volume = TestVolume::healthy();
    let disk = volume.disk();
    let start = volume.mirror_offset() as u64;
    disk.fail_reads_in(start..start + 512);
    let mut engine = analysis_engine(&disk)?;

    let result = engine.analyze();
    assert_eq!(result.errors_found, 1);
    assert_eq!(result.findings[2].issue, Some(IssueKind::UnreadableMftMirror));
    assert_eq!(result.details()[2], "WARNING: Cannot read MFT Mirror");
    Ok(())
}

#[test]
fn test_system_file_not_in_use() -> anyhow::Result<()> {
    let mut volume = TestVolume::healthy();
    volume.clear_in_use(3);
    let mut engine = analysis_engine(&volume.disk())?;

    let result = engine.analyze();
    assert_eq!(result.errors_found, 1);
    let last = result.findings.last().unwrap();
    assert_eq!(last.issue, Some(IssueKind::SystemFileNotInUse { index: 3 }));
    assert_eq!(
        last.detail(),
        "WARNING: System file $Volume (record 3) not marked as in use"
    );
    Ok(())
}

#[test]
fn test_corrupt_system_files_are_each_reported() -> anyhow::Result<()> {
    let mut volume = TestVolume::healthy();
    volume.corrupt_record_signature(6);
    volume.corrupt_record_signature(9);
    // Records past the system range are not inspected
    volume.corrupt_record_signature(12);
    let mut engine = analysis_engine(&volume.disk())?;

    let result = engine.analyze();
    let issues: Vec<_> = result.issues().cloned().collect();
    assert_eq!(
        issues,
        vec![
            IssueKind::MftMirrorUnverified,
            IssueKind::CorruptSystemFile { index: 6 },
            IssueKind::CorruptSystemFile { index: 9 },
        ]
    );
    assert!(result
        .details()
        .contains(&"WARNING: System file $Bitmap (record 6) corrupted".to_string()));
    Ok(())
}

#[test]
fn test_analyze_is_idempotent() -> anyhow::Result<()> {
    let mut volume = TestVolume::healthy();
    volume.corrupt_primary_end_marker();
    volume.corrupt_mirror_signature();
    volume.clear_in_use(7);
    let mut engine = analysis_engine(&volume.disk())?;

    let first = engine.analyze();
    let second = engine.analyze();
    assert_eq!(first, second);
    assert_eq!(first.errors_found, 3);
    Ok(())
}

#[test]
fn test_result_serializes_to_json() -> anyhow::Result<()> {
    let mut volume = TestVolume::healthy();
    volume.corrupt_primary_end_marker();
    let mut engine = analysis_engine(&volume.disk())?;

    let json = engine.analyze().to_json()?;
    assert!(json.contains("\"errors_found\": 1"));
    assert!(json.contains("end marker is 0x0000"));
    Ok(())
}
