//! This module contains functions to calculate the size of differennt fs components

use crate::fs::{DIRECT_POINTERS, INODE_COUNT, INODE_RECORD_SIZE};

/// length prefix bincode writes in front of the inode array
const TABLE_LENGTH_PREFIX: u32 = 8;
/// blake3 digest stored after the inode array
const TABLE_DIGEST_SIZE: u32 = 32;

/// calculate how many blocks are needed to hold `len` bytes
/// # Arguments
/// - `len`: the content length in bytes
/// - `block_size`: the block size of the filesystem
/// # Return
/// `ceil(len / block_size)`
/// # Example
/// ```
/// use journalfs::utils::fs_size_calculator::blocks_needed;
/// assert_eq!(blocks_needed(0, 4096), 0);
/// assert_eq!(blocks_needed(1, 4096), 1);
/// assert_eq!(blocks_needed(4096, 4096), 1);
/// assert_eq!(blocks_needed(4097, 4096), 2);
/// ```
pub const fn blocks_needed(len: u64, block_size: u32) -> u64 {
    len.div_ceil(block_size as u64)
}

/// calculate how many blocks a volume image holds
/// # Arguments
/// - `volume_size`: the size of the image file in bytes
/// - `block_size`: the block size of the filesystem
/// # Return
/// the number of whole blocks, a trailing partial block is ignored
/// # Example
/// ```
/// use journalfs::utils::fs_size_calculator::total_blocks;
/// assert_eq!(total_blocks(10 * 1024 * 1024, 4096), 2560);
/// assert_eq!(total_blocks(4096 * 5 + 100, 4096), 5);
/// ```
pub const fn total_blocks(volume_size: u64, block_size: u32) -> u64 {
    volume_size / block_size as u64
}

/// calculate the largest file the direct pointers of an inode can address
/// # Example
/// ```
/// use journalfs::utils::fs_size_calculator::max_file_size;
/// assert_eq!(max_file_size(4096), 49152);
/// ```
pub const fn max_file_size(block_size: u32) -> u64 {
    DIRECT_POINTERS as u64 * block_size as u64
}

/// calculate how many inode slots the inode table block really holds
/// # Arguments
/// - `block_size`: the block size of the filesystem
/// # Return
/// the configured inode count, capped by what fits in a single block
/// # Example
/// ```
/// use journalfs::utils::fs_size_calculator::inode_table_capacity;
/// assert_eq!(inode_table_capacity(4096), 45);
/// assert_eq!(inode_table_capacity(16384), 100);
/// ```
pub const fn inode_table_capacity(block_size: u32) -> usize {
    let fits = (block_size - TABLE_LENGTH_PREFIX - TABLE_DIGEST_SIZE) as usize / INODE_RECORD_SIZE;
    if fits < INODE_COUNT as usize {
        fits
    } else {
        INODE_COUNT as usize
    }
}
