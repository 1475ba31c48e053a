use serde::{Deserialize, Serialize};

use crate::utils::{
    digest,
    time_util::{self, *},
    traits::{DigestInSelf, SerializeAndDigest},
};

use super::{FS_MAGIC, INODE_COUNT, RESERVED_BLOCKS};

/// The superblock of this filesystem, stored in block 0
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SuperBlock {
    /// magic number
    pub magic: u32,
    pub total_blocks: u32,
    pub inode_count: u32,
    /// advisory, maintained by file operations and never recomputed at mount
    pub free_blocks_count: u32,
    pub created_at: TimeDurationStruct,
    pub last_mounted_at: Option<TimeDurationStruct>,
    /// to verify the integrity of this superblock
    pub digest: [u8; 32],
}
impl SuperBlock {
    /// a fresh superblock, block 0 itself counts as the only used block
    pub fn new(total_blocks: u32) -> Self {
        let mut superblock = Self {
            magic: FS_MAGIC,
            total_blocks,
            inode_count: INODE_COUNT,
            free_blocks_count: total_blocks - 1,
            created_at: time_util::now(),
            last_mounted_at: None,
            digest: [0u8; 32],
        };
        superblock.digest();
        superblock
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == FS_MAGIC
    }
}
impl SuperBlock {
    pub fn update_last_mounted_at(&mut self) {
        self.last_mounted_at = Some(time_util::now());
    }

    pub fn take_blocks(&mut self, count: u32) {
        self.free_blocks_count = self.free_blocks_count.saturating_sub(count);
    }

    pub fn return_blocks(&mut self, count: u32) {
        self.free_blocks_count = self.free_blocks_count.saturating_add(count);
    }

    /// every non-reserved block counts as free again
    pub fn reset_free_blocks(&mut self) {
        self.free_blocks_count = self.total_blocks - RESERVED_BLOCKS;
    }
}

impl DigestInSelf for SuperBlock {
    fn digest(&mut self) {
        self.digest = [0u8; 32];
        self.digest = digest::digest(self).expect("calculate digest failed");
    }

    fn verify_digest(&mut self) -> bool {
        let current_digest = self.digest;
        self.digest = [0u8; 32];
        let ok = current_digest == digest::digest(self).expect("calculate digest failed");
        self.digest = current_digest;
        ok
    }
}

impl SerializeAndDigest for SuperBlock {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::TOTAL_BLOCKS;

    #[test]
    fn test_new_superblock() {
        let superblock = SuperBlock::new(TOTAL_BLOCKS);
        assert!(superblock.has_valid_magic());
        assert_eq!(superblock.total_blocks, 2560);
        assert_eq!(superblock.inode_count, 100);
        assert_eq!(superblock.free_blocks_count, 2559);
        assert_eq!(superblock.last_mounted_at, None);
    }

    #[test]
    fn test_superblock_block_round_trip() -> anyhow::Result<()> {
        let mut superblock = SuperBlock::new(TOTAL_BLOCKS);
        superblock.take_blocks(3);
        superblock.update_last_mounted_at();
        let block = superblock.serialize_to_block()?;
        let (decoded, _) = SuperBlock::deserialize_block(&block)?;
        assert_eq!(decoded, superblock);
        assert_eq!(decoded.free_blocks_count, 2556);
        Ok(())
    }

    #[test]
    fn test_tampered_superblock_is_rejected() -> anyhow::Result<()> {
        let mut superblock = SuperBlock::new(TOTAL_BLOCKS);
        let mut block = superblock.serialize_to_block()?;
        // magic is the first little endian field
        block[0] ^= 0xff;
        assert!(SuperBlock::deserialize_block(&block).is_err());
        Ok(())
    }

    #[test]
    fn test_verification_keeps_the_stored_digest() {
        let mut superblock = SuperBlock::new(16);
        assert!(superblock.verify_digest());
        superblock.digest[0] ^= 0xff;
        let stored = superblock.digest;
        assert!(!superblock.verify_digest());
        assert_eq!(superblock.digest, stored);
    }

    #[test]
    fn test_free_block_counter_saturates() {
        let mut superblock = SuperBlock::new(8);
        superblock.take_blocks(100);
        assert_eq!(superblock.free_blocks_count, 0);
        superblock.reset_free_blocks();
        assert_eq!(superblock.free_blocks_count, 4);
    }
}
