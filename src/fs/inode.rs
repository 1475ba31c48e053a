use serde::{Deserialize, Serialize};

use crate::utils::{
    self,
    fs_size_calculator,
    traits::{is_zeroed, DigestInSelf, SerializeAndDigest},
};

use super::{Block, FsError, BLOCK_SIZE, DIRECT_POINTERS, FILENAME_FIELD_LEN, MAX_FILENAME_LEN};

/// a fixed size file record, its identity is the table slot it lives in
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Inode {
    pub id: u32,
    pub is_used: bool,
    pub filename: [u8; FILENAME_FIELD_LEN],
    pub file_size: u32,
    pub direct_blocks: [u32; DIRECT_POINTERS],
}

/// check a name can be stored in the filename field
pub fn validate_filename(name: &str) -> Result<(), FsError> {
    if name.is_empty() || name.len() > MAX_FILENAME_LEN || name.contains('\0') {
        return Err(FsError::InvalidName(name.to_owned()));
    }
    Ok(())
}

/// NUL padded filename field
pub(crate) fn encode_filename(name: &str) -> Result<[u8; FILENAME_FIELD_LEN], FsError> {
    validate_filename(name)?;
    let mut field = [0u8; FILENAME_FIELD_LEN];
    field[..name.len()].copy_from_slice(name.as_bytes());
    Ok(field)
}

/// the bytes of a filename field before its first NUL
pub(crate) fn filename_bytes(field: &[u8; FILENAME_FIELD_LEN]) -> &[u8] {
    let end = field.iter().position(|b| *b == 0).unwrap_or(FILENAME_FIELD_LEN);
    &field[..end]
}

pub(crate) fn decode_filename(field: &[u8; FILENAME_FIELD_LEN]) -> String {
    String::from_utf8_lossy(filename_bytes(field)).into_owned()
}

impl Inode {
    /// a used inode for `name`, `blocks` must be listed in content order
    pub fn new(name: &str, file_size: u32, blocks: &[u32]) -> Result<Self, FsError> {
        let filename = encode_filename(name)?;
        if blocks.len() > DIRECT_POINTERS {
            return Err(FsError::FileTooLarge {
                size: file_size as usize,
                max: fs_size_calculator::max_file_size(BLOCK_SIZE as u32) as usize,
            });
        }
        let mut direct_blocks = [0u32; DIRECT_POINTERS];
        direct_blocks[..blocks.len()].copy_from_slice(blocks);
        Ok(Inode {
            id: 0,
            is_used: true,
            filename,
            file_size,
            direct_blocks,
        })
    }

    pub fn name(&self) -> String {
        decode_filename(&self.filename)
    }

    pub fn name_matches(&self, name: &str) -> bool {
        filename_bytes(&self.filename) == name.as_bytes()
    }

    /// number of direct blocks holding content, `ceil(file_size / BLOCK_SIZE)`
    pub fn block_count(&self) -> usize {
        (fs_size_calculator::blocks_needed(self.file_size as u64, BLOCK_SIZE as u32) as usize)
            .min(DIRECT_POINTERS)
    }

    /// the data blocks of this file in content order
    pub fn blocks(&self) -> &[u32] {
        &self.direct_blocks[..self.block_count()]
    }

    /// number of contiguous block runs, `0` for an empty file
    pub fn extents(&self) -> usize {
        let blocks = self.blocks();
        match blocks.first() {
            None => 0,
            Some(_) => 1 + blocks.windows(2).filter(|w| w[0].checked_add(1) != Some(w[1])).count(),
        }
    }

    pub fn references(&self, block: u32) -> bool {
        self.is_used && self.blocks().contains(&block)
    }

    /// Get the size of the inode in disk
    pub fn inode_size_in_disk() -> usize {
        let config = bincode::config::legacy();
        bincode::serde::encode_to_vec(Inode::default(), config)
            .map(|bytes| bytes.len())
            .unwrap_or_default()
    }
}

/// the inode array stored in block 1
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InodeTable {
    inodes: Vec<Inode>,
    /// to verify the integrity of the whole table
    digest: [u8; 32],
}

impl Default for InodeTable {
    fn default() -> Self {
        InodeTable::new()
    }
}

impl InodeTable {
    /// a table with every slot unused
    pub fn new() -> Self {
        InodeTable {
            inodes: vec![Inode::default(); Self::capacity()],
            digest: [0u8; 32],
        }
    }

    pub const fn capacity() -> usize {
        fs_size_calculator::inode_table_capacity(BLOCK_SIZE as u32)
    }

    /// decode the table block, a block never written since format is an empty table
    pub fn load(block: &Block) -> Result<Self, FsError> {
        if is_zeroed(block) {
            return Ok(InodeTable::new());
        }
        let (mut table, _) = InodeTable::deserialize_block(block)
            .map_err(|e| FsError::corrupted("inode table unreadable", e))?;
        if table.inodes.len() > Self::capacity() {
            return Err(FsError::Corrupted(format!(
                "inode table has {} slots, at most {} fit",
                table.inodes.len(),
                Self::capacity()
            )));
        }
        table.inodes.resize(Self::capacity(), Inode::default());
        Ok(table)
    }

    /// put `inode` into the first unused slot
    /// # Return
    /// the slot index, or [FsError::TableFull]
    pub fn save_inode(&mut self, mut inode: Inode) -> Result<usize, FsError> {
        let slot = self
            .inodes
            .iter()
            .position(|i| !i.is_used)
            .ok_or(FsError::TableFull {
                capacity: Self::capacity(),
            })?;
        inode.id = slot as u32;
        self.inodes[slot] = inode;
        Ok(slot)
    }

    /// linear scan for the first used slot named `name`
    pub fn find_inode(&self, name: &str) -> Result<usize, FsError> {
        self.inodes
            .iter()
            .position(|i| i.is_used && i.name_matches(name))
            .ok_or_else(|| FsError::NotFound(name.to_owned()))
    }

    /// like [InodeTable::find_inode], also handing out the record
    pub fn find(&self, name: &str) -> Result<(usize, &Inode), FsError> {
        let slot = self.find_inode(name)?;
        Ok((slot, &self.inodes[slot]))
    }

    pub fn get(&self, slot: usize) -> Option<&Inode> {
        self.inodes.get(slot)
    }

    /// mark a slot unused, the record is cleared rather than removed
    pub fn release(&mut self, slot: usize) {
        if let Some(inode) = self.inodes.get_mut(slot) {
            *inode = Inode::default();
        }
    }

    /// put a released record back into its slot
    pub(crate) fn restore(&mut self, slot: usize, inode: Inode) {
        if let Some(entry) = self.inodes.get_mut(slot) {
            *entry = inode;
        }
    }

    pub fn clear(&mut self) {
        self.inodes.fill(Inode::default());
    }

    pub fn used(&self) -> impl Iterator<Item = (usize, &Inode)> {
        self.inodes.iter().enumerate().filter(|(_, i)| i.is_used)
    }

    pub fn used_count(&self) -> usize {
        self.used().count()
    }

    /// the first used inode referencing `block`
    pub fn owner_of(&self, block: u32) -> Option<&Inode> {
        self.inodes.iter().find(|i| i.references(block))
    }
}

impl DigestInSelf for InodeTable {
    fn digest(&mut self) {
        self.digest = [0u8; 32];
        self.digest = utils::digest::digest(&self).expect("calculate digest failed");
    }

    fn verify_digest(&mut self) -> bool {
        let current_digest = self.digest;
        self.digest = [0u8; 32];
        let ok = current_digest == utils::digest::digest(&self).expect("calculate digest failed");
        self.digest = current_digest;
        ok
    }
}
// This block is about serialization and deserialization
impl SerializeAndDigest for InodeTable {}
