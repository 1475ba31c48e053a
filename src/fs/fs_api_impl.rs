//! create, read and delete, every mutation bracketed by the journal
use log::{debug, error, info, warn};

use crate::{block_store::BlockStore, utils::fs_size_calculator};

use super::{
    inode::validate_filename, FaultInjector, FileEntry, FsError, Inode, JournalOp, MidpointFault,
    NoFault, Volume, BLOCK_SIZE, MAX_FILE_SIZE,
};

impl<S: BlockStore> Volume<S> {
    /// create a file holding `content`
    ///
    /// Either the whole file becomes visible or nothing does: the inode is
    /// the last thing written.
    pub fn create(&mut self, name: &str, content: &[u8]) -> Result<(), FsError> {
        self.create_with(name, content, &mut NoFault)
    }

    /// like [Volume::create], but stop before writing the halfway chunk,
    /// leaving the journal active as a killed process would
    pub fn create_with_fault(&mut self, name: &str, content: &[u8]) -> Result<(), FsError> {
        self.create_with(name, content, &mut MidpointFault)
    }

    /// create a file, asking `faults` before every chunk write
    pub fn create_with(
        &mut self,
        name: &str,
        content: &[u8],
        faults: &mut dyn FaultInjector,
    ) -> Result<(), FsError> {
        self.ensure_running()?;
        validate_filename(name)?;
        if content.len() > MAX_FILE_SIZE {
            return Err(FsError::FileTooLarge {
                size: content.len(),
                max: MAX_FILE_SIZE,
            });
        }
        info!("create() called with {name:?}, {} bytes", content.len());

        self.begin_op(JournalOp::Create, name, Some(content))?;
        match self.write_file(name, content, faults) {
            Ok(blocks) => {
                self.end_op()?;
                debug!("{name:?} stored in blocks {blocks:?}");
                Ok(())
            }
            Err(e @ FsError::InjectedFault { .. }) => {
                // the process is considered dead from here on
                self.halted = true;
                warn!("{e}");
                Err(e)
            }
            Err(e) => {
                self.end_op()?;
                Err(e)
            }
        }
    }

    fn write_file(
        &mut self,
        name: &str,
        content: &[u8],
        faults: &mut dyn FaultInjector,
    ) -> Result<Vec<u32>, FsError> {
        let needed =
            fs_size_calculator::blocks_needed(content.len() as u64, BLOCK_SIZE as u32) as usize;
        let blocks = self.space_map.allocate(needed)?;

        let committed = self
            .write_chunks(&blocks, content, faults)
            .and_then(|()| self.persist_inode(name, content.len() as u32, &blocks));
        match committed {
            Ok(_slot) => {}
            Err(e @ FsError::InjectedFault { .. }) => return Err(e),
            Err(e) => {
                self.space_map.free(&blocks);
                return Err(e);
            }
        }

        self.superblock.take_blocks(needed as u32);
        self.save_free_blocks_count();
        Ok(blocks)
    }

    /// write `content` chunk by chunk, chunk `i` goes to `blocks[i]`
    fn write_chunks(
        &mut self,
        blocks: &[u32],
        content: &[u8],
        faults: &mut dyn FaultInjector,
    ) -> Result<(), FsError> {
        let chunks = blocks.len();
        for (chunk, (block_index, data)) in blocks.iter().zip(content.chunks(BLOCK_SIZE)).enumerate()
        {
            if faults.should_fail(chunk, chunks) {
                return Err(FsError::InjectedFault { chunk, chunks });
            }
            let mut block = [0u8; BLOCK_SIZE];
            block[..data.len()].copy_from_slice(data);
            self.store.write_block(*block_index, &block)?;
        }
        Ok(())
    }

    /// the step that makes a file visible
    fn persist_inode(&mut self, name: &str, size: u32, blocks: &[u32]) -> Result<usize, FsError> {
        let slot = self.inodes.save_inode(Inode::new(name, size, blocks)?)?;
        if let Err(e) = self.save_inode_table() {
            self.inodes.release(slot);
            return Err(e);
        }
        Ok(slot)
    }

    /// the whole content of `name`
    pub fn read(&self, name: &str) -> Result<Vec<u8>, FsError> {
        self.ensure_running()?;
        let (_, inode) = self.inodes.find(name)?;
        self.read_content(inode)
    }

    pub(crate) fn read_content(&self, inode: &Inode) -> Result<Vec<u8>, FsError> {
        let size = inode.file_size as usize;
        let mut content = Vec::with_capacity(size);
        for block_index in inode.blocks() {
            let block = self.store.read_block(*block_index)?;
            let remaining = size - content.len();
            content.extend_from_slice(&block[..remaining.min(BLOCK_SIZE)]);
        }
        Ok(content)
    }

    /// delete `name`, its blocks become free again
    pub fn delete(&mut self, name: &str) -> Result<(), FsError> {
        self.ensure_running()?;
        // such a name can't be stored, so it can't exist
        if validate_filename(name).is_err() {
            return Err(FsError::NotFound(name.to_owned()));
        }
        info!("delete() called with {name:?}");

        self.begin_op(JournalOp::Delete, name, None)?;
        match self.remove_file(name) {
            Ok(()) => {
                self.end_op()?;
                Ok(())
            }
            Err(e @ FsError::NotFound(_)) => {
                self.end_op()?;
                Err(e)
            }
            Err(e) => {
                // the slot stays active on disk, the next mount rolls the delete forward
                self.halted = true;
                error!("delete of {name:?} not persisted: {e}");
                Err(e)
            }
        }
    }

    /// release the inode on disk first, memory follows once the table is written
    fn remove_file(&mut self, name: &str) -> Result<(), FsError> {
        let (slot, inode) = self.inodes.find(name)?;
        let inode = inode.clone();
        self.inodes.release(slot);
        if let Err(e) = self.save_inode_table() {
            self.inodes.restore(slot, inode);
            return Err(e);
        }

        let blocks = inode.blocks();
        self.space_map.free(blocks);
        self.superblock.return_blocks(blocks.len() as u32);
        self.save_free_blocks_count();
        debug!("{name:?} released blocks {blocks:?}");
        Ok(())
    }

    /// every live file in table order
    pub fn list(&self) -> Vec<FileEntry> {
        self.inodes
            .used()
            .map(|(slot, inode)| FileEntry {
                slot,
                name: inode.name(),
                size: inode.file_size,
                blocks: inode.blocks().to_vec(),
                extents: inode.extents(),
            })
            .collect()
    }
}
