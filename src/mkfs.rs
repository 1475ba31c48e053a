//! create our filesystem
use crate::{
    block_store::ImageFile,
    fs::{Volume, BLOCK_SIZE, RESERVED_BLOCKS},
    utils::fs_size_calculator,
};
use anyhow::anyhow;
use byte_unit::{Byte, ByteUnit};
use log::info;
use std::path::Path;

/// create a new filesystem,given the path of the image file and the image file size
/// # Params
/// - `image_file_path`: the path of the image file, an existing file is overwritten
/// - `volume_size`: the size of the image file, rounded down to whole blocks
///
/// # Return
/// an [anyhow::Result] type to indicate whether the operation is successful
pub fn mkfs<P>(image_file_path: P, volume_size: u64) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    // the reserved blocks plus at least one data block
    let total_blocks = fs_size_calculator::total_blocks(volume_size, BLOCK_SIZE as u32);
    if total_blocks <= RESERVED_BLOCKS as u64 {
        let space_needed = (RESERVED_BLOCKS as u64 + 1) * BLOCK_SIZE as u64;
        return Err(anyhow!(
            "Volume size must be at least {} for block size {}",
            Byte::from_bytes(space_needed as _).get_appropriate_unit(true),
            Byte::from_bytes(BLOCK_SIZE as _).get_adjusted_unit(ByteUnit::B),
        ));
    }
    let total_blocks = u32::try_from(total_blocks)
        .map_err(|_| anyhow!("{total_blocks} blocks do not fit a 32 bit block index"))?;

    let mut image = ImageFile::create(image_file_path.as_ref(), total_blocks)?;
    Volume::format(&mut image)?;
    info!(
        "{} formatted: {}",
        image_file_path.as_ref().display(),
        Byte::from_bytes((total_blocks as u64 * BLOCK_SIZE as u64) as _).get_appropriate_unit(true)
    );
    Ok(())
}
