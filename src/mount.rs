//! open an image file and mount the volume on it, replaying its journal
use std::path::Path;

use anyhow::Context;
use log::warn;

use crate::{block_store::ImageFile, fs::Volume};

pub fn mount<P>(image_path: P) -> anyhow::Result<Volume<ImageFile>>
where
    P: AsRef<Path>,
{
    let image_path = image_path.as_ref();
    let image = ImageFile::open(image_path)?;
    let volume = Volume::mount(image)
        .with_context(|| format!("mounting {} failed", image_path.display()))?;
    if !volume.recovery().is_clean() {
        warn!("{}: {}", image_path.display(), volume.recovery());
    }
    Ok(volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fs::FsError, mkfs::mkfs, RecoveryReport, VOLUME_SIZE};

    #[test]
    fn test_mount_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let err = mount(dir.path().join("absent.img")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FsError>(),
            Some(FsError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_crash_recovery_across_processes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let image = dir.path().join("vdisk.bin");
        mkfs(&image, VOLUME_SIZE)?;
        {
            let mut volume = mount(&image)?;
            volume.create("kept", b"kept")?;
            assert!(volume.create_with_fault("x", b"0123456789").is_err());
        }
        let volume = mount(&image)?;
        assert!(matches!(
            volume.recovery(),
            RecoveryReport::Recovered { .. }
        ));
        assert_eq!(volume.read("recovered_x")?, b"0123456789");
        assert_eq!(volume.read("kept")?, b"kept");
        Ok(())
    }
}
