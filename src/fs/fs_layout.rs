//! what does our filesystem look like in the memory

use crate::{
    block_store::BlockStore,
    utils::traits::{is_zeroed, SerializeAndDigest},
};

use super::{
    superblock::SuperBlock, Block, FsError, InodeTable, JournalState, RecoveryReport, SpaceMap,
    BLOCK_SIZE, INODE_TABLE_INDEX, RESERVED_BLOCKS, SUPERBLOCK_INDEX,
};
use log::{info, warn};

/// a mounted volume, it has the following layout:
/// - block 0: superblock
/// - block 1: inode table
/// - block 2: journal slot
/// - block 3: shadow block
/// - block 4 and up: file data
#[derive(Debug)]
pub struct Volume<S: BlockStore> {
    /// the raw storage, owned exclusively by this volume
    pub(crate) store: S,
    pub(crate) superblock: SuperBlock,
    pub(crate) inodes: InodeTable,
    /// derived from `inodes`, never written to the store
    pub(crate) space_map: SpaceMap,
    pub(crate) journal: JournalState,
    recovery: RecoveryReport,
    /// set once a fault was injected, the in-memory state is then stale
    pub(crate) halted: bool,
}

/// one live file, as listed by [Volume::list]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub slot: usize,
    pub name: String,
    pub size: u32,
    pub blocks: Vec<u32>,
    /// contiguous runs in `blocks`
    pub extents: usize,
}

impl<S: BlockStore> Volume<S> {
    /// zero every block of `store` and write a fresh superblock
    pub fn format(store: &mut S) -> Result<(), FsError> {
        let total_blocks = store.total_blocks();
        if total_blocks <= RESERVED_BLOCKS {
            return Err(FsError::InsufficientSpace {
                needed: RESERVED_BLOCKS as usize + 1,
                available: total_blocks as usize,
            });
        }
        let zeros: Block = [0u8; BLOCK_SIZE];
        for index in 0..total_blocks {
            store.write_block(index, &zeros)?;
        }
        let block = SuperBlock::new(total_blocks)
            .serialize_to_block()
            .map_err(|e| FsError::corrupted("superblock", e))?;
        store.write_block(SUPERBLOCK_INDEX, &block)?;
        info!("formatted volume with {total_blocks} blocks of {BLOCK_SIZE} bytes");
        Ok(())
    }

    /// load the metadata, rebuild the space map and replay the journal
    /// # Return
    /// a usable volume, even when recovery could only salvage part of the
    /// interrupted operation; see [Volume::recovery]
    pub fn mount(store: S) -> Result<Self, FsError> {
        let block = store.read_block(SUPERBLOCK_INDEX)?;
        if is_zeroed(&block) {
            return Err(FsError::StoreUnavailable(
                "the volume was never formatted".to_owned(),
            ));
        }
        let (superblock, _) = SuperBlock::deserialize_block(&block)
            .map_err(|e| FsError::corrupted("superblock unreadable", e))?;
        if !superblock.has_valid_magic() {
            return Err(FsError::Corrupted(format!(
                "bad magic number {:#x}",
                superblock.magic
            )));
        }
        if superblock.total_blocks != store.total_blocks() {
            return Err(FsError::Corrupted(format!(
                "superblock describes {} blocks, the store has {}",
                superblock.total_blocks,
                store.total_blocks()
            )));
        }

        let inodes = InodeTable::load(&store.read_block(INODE_TABLE_INDEX)?)?;
        let mut space_map = SpaceMap::new(superblock.total_blocks);
        space_map.rebuild_from_inodes(&inodes);

        let mut volume = Volume {
            store,
            superblock,
            inodes,
            space_map,
            journal: JournalState::Idle,
            recovery: RecoveryReport::Clean,
            halted: false,
        };
        volume.recovery = volume.recover();
        if let RecoveryReport::Incomplete { reason } = &volume.recovery {
            warn!("mounted with incomplete recovery: {reason}");
        }

        volume.superblock.update_last_mounted_at();
        volume.save_superblock()?;
        info!(
            "mounted volume: {} files, {} free blocks",
            volume.inodes.used_count(),
            volume.superblock.free_blocks_count
        );
        Ok(volume)
    }

    /// give the store back, like a process exiting without any cleanup
    pub fn into_store(self) -> S {
        self.store
    }
}
/// get the components of this filesystem
impl<S: BlockStore> Volume<S> {
    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    #[inline]
    pub fn inode_table(&self) -> &InodeTable {
        &self.inodes
    }

    #[inline]
    pub fn space_map(&self) -> &SpaceMap {
        &self.space_map
    }

    #[inline]
    pub fn journal_state(&self) -> &JournalState {
        &self.journal
    }

    /// what the journal replay at mount did
    #[inline]
    pub fn recovery(&self) -> &RecoveryReport {
        &self.recovery
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}
/// persist metadata
impl<S: BlockStore> Volume<S> {
    pub(crate) fn save_superblock(&mut self) -> Result<(), FsError> {
        let block = self
            .superblock
            .serialize_to_block()
            .map_err(|e| FsError::corrupted("superblock", e))?;
        self.store.write_block(SUPERBLOCK_INDEX, &block)
    }

    /// persist the superblock after a free block counter change
    ///
    /// The counter is advisory: a failed write is only logged, the file
    /// operation that changed it has already committed.
    pub(crate) fn save_free_blocks_count(&mut self) {
        if let Err(e) = self.save_superblock() {
            warn!(
                "free block counter {} not persisted: {e}",
                self.superblock.free_blocks_count
            );
        }
    }

    pub(crate) fn save_inode_table(&mut self) -> Result<(), FsError> {
        let block = self
            .inodes
            .serialize_to_block()
            .map_err(|e| FsError::corrupted("inode table", e))?;
        self.store.write_block(INODE_TABLE_INDEX, &block)
    }

    pub(crate) fn ensure_running(&self) -> Result<(), FsError> {
        if self.halted {
            return Err(FsError::Halted);
        }
        Ok(())
    }
}
