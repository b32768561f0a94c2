// File-backed volume handle tests
// Exercise the Unix handle against disk images; never touches real devices.

#![cfg(unix)]

use ntfsmend_core::{AccessMode, BlockDevice, MendError, VolumeOpener, VolumeTarget};
use ntfsmend_platform::{PlatformOpener, VolumeHandle};
use std::io::Write;
use tempfile::NamedTempFile;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn image(len: usize) -> anyhow::Result<(NamedTempFile, VolumeTarget)> {
    let mut file = NamedTempFile::new()?;
    let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    file.write_all(&bytes)?;
    file.flush()?;
    let target = VolumeTarget::Path(file.path().to_path_buf());
    Ok((file, target))
}

#[test]
fn test_read_only_positioned_reads() -> anyhow::Result<()> {
    init_logging();
    let (_file, target) = image(4096)?;

    let mut volume = VolumeHandle::open_read_only(&target)?;
    assert!(!volume.is_writable());
    assert!(!volume.is_locked());

    let bytes = volume.read_at(512, 16)?;
    let expected: Vec<u8> = (512..528).map(|i| (i % 251) as u8).collect();
    assert_eq!(bytes, expected);
    Ok(())
}

#[test]
fn test_short_read_at_end_of_image() -> anyhow::Result<()> {
    init_logging();
    let (_file, target) = image(1000)?;
    let mut volume = VolumeHandle::open_read_only(&target)?;

    assert_eq!(volume.read_at(900, 512)?.len(), 100);
    assert!(volume.read_at(5000, 512)?.is_empty());
    Ok(())
}

#[test]
fn test_read_only_handle_rejects_writes() -> anyhow::Result<()> {
    init_logging();
    let (_file, target) = image(1024)?;
    let mut volume = VolumeHandle::open_read_only(&target)?;

    assert!(volume.write_at(0, &[0xAA; 4]).is_err());
    Ok(())
}

#[test]
fn test_locked_write_roundtrip() -> anyhow::Result<()> {
    init_logging();
    let (file, target) = image(8192)?;

    {
        let mut volume = PlatformOpener.open(&target, AccessMode::ReadWriteLocked)?;
        assert!(volume.is_writable());
        assert!(volume.is_locked());

        volume.write_at(1024, b"FILE0")?;
        assert_eq!(volume.read_at(1024, 5)?, b"FILE0");

        // Dismount has no Unix equivalent
        assert!(!volume.dismount());
    }

    let on_disk = std::fs::read(file.path())?;
    assert_eq!(&on_disk[1024..1029], b"FILE0");
    Ok(())
}

#[test]
fn test_second_writer_cannot_take_lock() -> anyhow::Result<()> {
    init_logging();
    let (_file, target) = image(1024)?;

    let first = VolumeHandle::open_read_write_locked(&target)?;
    assert!(first.is_locked());

    // Lock failure is not fatal: the handle still opens, just unlocked
    let second = VolumeHandle::open_read_write_locked(&target)?;
    assert!(!second.is_locked());

    drop(first);
    let third = VolumeHandle::open_read_write_locked(&target)?;
    assert!(third.is_locked());
    Ok(())
}

#[test]
fn test_close_releases_and_rejects_io() -> anyhow::Result<()> {
    init_logging();
    let (_file, target) = image(1024)?;

    let mut volume = VolumeHandle::open_read_write_locked(&target)?;
    volume.close();
    assert!(!volume.is_open());
    assert!(!volume.is_locked());
    assert!(matches!(volume.read_at(0, 4), Err(MendError::HandleClosed)));
    assert!(matches!(volume.write_at(0, &[1]), Err(MendError::HandleClosed)));

    // Closing twice is harmless
    volume.close();
    Ok(())
}

#[test]
fn test_missing_device_is_open_error() {
    init_logging();
    let target = VolumeTarget::Path("/nonexistent/ntfsmend/volume.img".into());
    let err = VolumeHandle::open_read_only(&target).err().expect("open should fail");
    assert!(err.is_open_error());
    assert!(matches!(err, MendError::DeviceNotFound(_)));
}
