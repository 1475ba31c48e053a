//! our journaled filesystem
pub mod defrag;
pub mod error;
pub mod fault;
pub mod fs_layout;
pub mod inode;
pub mod inspect;
pub mod journal;
pub mod space_map;
pub mod superblock;
mod fs_api_impl;
pub use defrag::*;
pub use error::*;
pub use fault::*;
pub use fs_layout::*;
pub use inode::*;
pub use inspect::*;
pub use journal::*;
pub use space_map::*;
pub use superblock::*;

const FS_MAGIC: u32 = 0xDEAD_BEEF;
pub const BLOCK_SIZE: usize = 4096;
pub const VOLUME_SIZE: u64 = 10 * 1024 * 1024;
pub const TOTAL_BLOCKS: u32 = (VOLUME_SIZE / BLOCK_SIZE as u64) as u32;
pub const INODE_COUNT: u32 = 100;
pub const DIRECT_POINTERS: usize = 12;
pub const MAX_FILE_SIZE: usize = DIRECT_POINTERS * BLOCK_SIZE;
/// on-disk filename field, NUL padded
pub const FILENAME_FIELD_LEN: usize = 32;
pub const MAX_FILENAME_LEN: usize = FILENAME_FIELD_LEN - 1;

// fixed block layout
pub const SUPERBLOCK_INDEX: u32 = 0;
pub const INODE_TABLE_INDEX: u32 = 1;
pub const JOURNAL_INDEX: u32 = 2;
pub const SHADOW_INDEX: u32 = 3;
pub const RESERVED_BLOCKS: u32 = 4;

/// id + is_used + filename + file_size + direct blocks, as bincode writes them
pub const INODE_RECORD_SIZE: usize = 4 + 1 + FILENAME_FIELD_LEN + 4 + 4 * DIRECT_POINTERS;

/// one block of raw volume data
pub type Block = [u8; BLOCK_SIZE];
