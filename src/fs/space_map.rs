use bitvec::prelude::*;
use log::warn;

use super::{FsError, InodeTable, RESERVED_BLOCKS};

/// which blocks of the volume are in use, never persisted and rebuilt at every mount
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceMap {
    bitmap: BitVec<u8, Lsb0>,
}

impl SpaceMap {
    /// a map of `total_blocks` with only the reserved blocks in use
    pub fn new(total_blocks: u32) -> Self {
        let mut space_map = SpaceMap {
            bitmap: bitvec![u8, Lsb0; 0; total_blocks as usize],
        };
        space_map.reset();
        space_map
    }

    /// mark blocks 0-3 used, the rest free
    pub fn reset(&mut self) {
        self.bitmap.fill(false);
        let reserved = (RESERVED_BLOCKS as usize).min(self.bitmap.len());
        self.bitmap[..reserved].fill(true);
    }

    /// derive the map from every used inode of `table`
    pub fn rebuild_from_inodes(&mut self, table: &InodeTable) {
        self.reset();
        for (slot, inode) in table.used() {
            for block in inode.blocks() {
                match self.bitmap.get_mut(*block as usize) {
                    Some(mut bit) => *bit = true,
                    None => warn!(
                        "inode {slot} ({}) references block {block} outside the volume",
                        inode.name()
                    ),
                }
            }
        }
    }

    /// first-fit allocation of `n` blocks from block 4 upward
    /// # Return
    /// the blocks in ascending order, they are not necessarily contiguous
    pub fn allocate(&mut self, n: usize) -> Result<Vec<u32>, FsError> {
        let start = (RESERVED_BLOCKS as usize).min(self.bitmap.len());
        let mut blocks = Vec::with_capacity(n);
        for index in self.bitmap[start..].iter_zeros().take(n) {
            blocks.push((start + index) as u32);
        }
        // nothing was marked yet, so a short scan needs no rollback
        if blocks.len() < n {
            return Err(FsError::InsufficientSpace {
                needed: n,
                available: blocks.len(),
            });
        }
        for block in &blocks {
            self.bitmap.set(*block as usize, true);
        }
        Ok(blocks)
    }

    /// release data blocks
    pub fn free(&mut self, blocks: &[u32]) {
        for block in blocks {
            if let Some(mut bit) = self.bitmap.get_mut(*block as usize) {
                *bit = false;
            }
        }
    }

    pub fn is_used(&self, block: u32) -> bool {
        self.bitmap
            .get(block as usize)
            .as_deref()
            .copied()
            .unwrap_or(false)
    }

    pub fn free_count(&self) -> usize {
        self.bitmap.count_zeros()
    }

    /// highest block in use, the reserved blocks count
    pub fn last_used(&self) -> u32 {
        self.bitmap.last_one().unwrap_or_default() as u32
    }

    pub fn total_blocks(&self) -> u32 {
        self.bitmap.len() as u32
    }

    /// one `1`/`0` character per block, the format of the disk map visualizer
    pub fn render(&self) -> String {
        self.bitmap
            .iter()
            .map(|bit| if *bit { '1' } else { '0' })
            .collect()
    }
}
