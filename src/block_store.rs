//! the raw block storage a volume lives on: an image file mapped into memory,
//! or a plain in-memory buffer for tests and scratch volumes.
use std::{fs::OpenOptions, io::ErrorKind, path::Path};

use log::debug;
use memmap2::MmapMut;

use crate::fs::{Block, FsError, BLOCK_SIZE};

/// fixed size block storage, every read and write moves exactly one block
pub trait BlockStore {
    /// number of blocks, valid indices are `0..total_blocks()`
    fn total_blocks(&self) -> u32;

    fn read_block(&self, index: u32) -> Result<Block, FsError>;

    fn write_block(&mut self, index: u32, block: &Block) -> Result<(), FsError>;

    /// fail with [FsError::InvalidBlockIndex] unless `index` is on the store
    fn check_index(&self, index: u32) -> Result<(), FsError> {
        if index >= self.total_blocks() {
            return Err(FsError::InvalidBlockIndex {
                index,
                total: self.total_blocks(),
            });
        }
        Ok(())
    }
}

/// an image file, something like a `Block Device`, mapped into memory
#[derive(Debug)]
pub struct ImageFile {
    mmap: MmapMut,
    total_blocks: u32,
}

impl ImageFile {
    /// create (or truncate) an image of `total_blocks` zero filled blocks
    pub fn create<P>(image_path: P, total_blocks: u32) -> Result<Self, FsError>
    where
        P: AsRef<Path>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(image_path.as_ref())?;
        // all regions are set to zero by `set_len`
        file.set_len(total_blocks as u64 * BLOCK_SIZE as u64)?;
        debug!(
            "created image {} with {total_blocks} blocks",
            image_path.as_ref().display()
        );
        Self::map(&file, total_blocks)
    }

    /// open an existing image, a missing file means the store was never formatted
    pub fn open<P>(image_path: P) -> Result<Self, FsError>
    where
        P: AsRef<Path>,
    {
        let image_path = image_path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(image_path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => FsError::StoreUnavailable(format!(
                    "{} does not exist, format it first",
                    image_path.display()
                )),
                _ => FsError::Io(e),
            })?;
        let len = file.metadata()?.len();
        if len == 0 || len % BLOCK_SIZE as u64 != 0 {
            return Err(FsError::StoreUnavailable(format!(
                "{} is {len} bytes, not a whole number of {BLOCK_SIZE} byte blocks",
                image_path.display()
            )));
        }
        Self::map(&file, (len / BLOCK_SIZE as u64) as u32)
    }

    fn map(file: &std::fs::File, total_blocks: u32) -> Result<Self, FsError> {
        // Safety
        // The mapping is only valid while nobody else truncates the image file,
        // the volume owns the image exclusively for its whole lifetime.
        let mmap = unsafe { MmapMut::map_mut(file)? };
        Ok(ImageFile { mmap, total_blocks })
    }

    #[inline]
    fn offset(index: u32) -> usize {
        index as usize * BLOCK_SIZE
    }
}

impl BlockStore for ImageFile {
    fn total_blocks(&self) -> u32 {
        self.total_blocks
    }

    fn read_block(&self, index: u32) -> Result<Block, FsError> {
        self.check_index(index)?;
        let offset = Self::offset(index);
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(&self.mmap[offset..offset + BLOCK_SIZE]);
        Ok(block)
    }

    fn write_block(&mut self, index: u32, block: &Block) -> Result<(), FsError> {
        self.check_index(index)?;
        let offset = Self::offset(index);
        self.mmap[offset..offset + BLOCK_SIZE].copy_from_slice(block);
        // every block write is durable before the next one starts
        self.mmap.flush_range(offset, BLOCK_SIZE)?;
        Ok(())
    }
}

/// a volume kept entirely in memory
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStore {
    blocks: Vec<Block>,
}

impl MemoryStore {
    pub fn new(total_blocks: u32) -> Self {
        MemoryStore {
            blocks: vec![[0u8; BLOCK_SIZE]; total_blocks as usize],
        }
    }
}

impl BlockStore for MemoryStore {
    fn total_blocks(&self) -> u32 {
        self.blocks.len() as u32
    }

    fn read_block(&self, index: u32) -> Result<Block, FsError> {
        self.check_index(index)?;
        Ok(self.blocks[index as usize])
    }

    fn write_block(&mut self, index: u32, block: &Block) -> Result<(), FsError> {
        self.check_index(index)?;
        self.blocks[index as usize] = *block;
        Ok(())
    }
}
