use std::fmt;

use crate::block_store::BlockStore;

use super::{
    Block, FsError, Volume, BLOCK_SIZE, INODE_TABLE_INDEX, JOURNAL_INDEX, SHADOW_INDEX,
    SUPERBLOCK_INDEX,
};

/// the system structure a reserved block holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemRegion {
    Superblock,
    InodeTable,
    Journal,
    Shadow,
}

impl SystemRegion {
    fn of(index: u32) -> Option<Self> {
        match index {
            SUPERBLOCK_INDEX => Some(SystemRegion::Superblock),
            INODE_TABLE_INDEX => Some(SystemRegion::InodeTable),
            JOURNAL_INDEX => Some(SystemRegion::Journal),
            SHADOW_INDEX => Some(SystemRegion::Shadow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockStatus {
    Reserved(SystemRegion),
    Free,
    Used {
        /// the first file referencing the block
        owner: Option<String>,
        /// the block up to its first NUL, when that is printable text
        text: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    pub index: u32,
    pub status: BlockStatus,
}

impl fmt::Display for BlockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- BLOCK {} ---", self.index)?;
        match &self.status {
            BlockStatus::Reserved(region) => {
                writeln!(f, "Type: SYSTEM ({region:?})")?;
                write!(f, "Status: USED")
            }
            BlockStatus::Free => write!(f, "Status: FREE"),
            BlockStatus::Used { owner, text } => {
                write!(f, "Status: USED")?;
                if let Some(owner) = owner {
                    write!(f, "\nOwner File: {owner}")?;
                }
                if let Some(text) = text {
                    write!(f, "\nRaw Data: {text}")?;
                }
                Ok(())
            }
        }
    }
}

/// leading text of a block, `None` for binary or empty blocks
fn printable_text(block: &Block) -> Option<String> {
    let end = block.iter().position(|b| *b == 0).unwrap_or(BLOCK_SIZE);
    let text = std::str::from_utf8(&block[..end]).ok()?;
    if text.is_empty() || text.chars().any(|c| c.is_control() && !c.is_whitespace()) {
        return None;
    }
    Some(text.to_owned())
}

impl<S: BlockStore> Volume<S> {
    /// classify a block and describe what it holds, never modifies the volume
    pub fn inspect(&self, index: u32) -> Result<BlockReport, FsError> {
        let total = self.superblock.total_blocks;
        if index >= total {
            return Err(FsError::InvalidBlockIndex { index, total });
        }
        // the reserved blocks 0..RESERVED_BLOCKS are exactly the system regions
        let status = if let Some(region) = SystemRegion::of(index) {
            BlockStatus::Reserved(region)
        } else if !self.space_map.is_used(index) {
            BlockStatus::Free
        } else {
            BlockStatus::Used {
                owner: self.inodes.owner_of(index).map(|inode| inode.name()),
                text: printable_text(&self.store.read_block(index)?),
            }
        };
        Ok(BlockReport { index, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{fs_layout::tests::formatted, TOTAL_BLOCKS};

    #[test]
    fn test_reserved_blocks() -> anyhow::Result<()> {
        let volume = Volume::mount(formatted(TOTAL_BLOCKS))?;
        assert_eq!(
            volume.inspect(0)?.status,
            BlockStatus::Reserved(SystemRegion::Superblock)
        );
        assert_eq!(
            volume.inspect(3)?.status,
            BlockStatus::Reserved(SystemRegion::Shadow)
        );
        Ok(())
    }

    #[test]
    fn test_free_and_used_blocks() -> anyhow::Result<()> {
        let mut volume = Volume::mount(formatted(TOTAL_BLOCKS))?;
        volume.create("notes", b"hello world")?;
        volume.create("bin", &[0xffu8, 0x01, 0x02])?;

        let report = volume.inspect(4)?;
        assert_eq!(
            report.status,
            BlockStatus::Used {
                owner: Some("notes".to_owned()),
                text: Some("hello world".to_owned())
            }
        );
        assert_eq!(
            report.to_string(),
            "--- BLOCK 4 ---\nStatus: USED\nOwner File: notes\nRaw Data: hello world"
        );
        assert_eq!(
            volume.inspect(5)?.status,
            BlockStatus::Used {
                owner: Some("bin".to_owned()),
                text: None
            }
        );
        assert_eq!(volume.inspect(6)?.status, BlockStatus::Free);
        Ok(())
    }

    #[test]
    fn test_out_of_range() {
        let volume = Volume::mount(formatted(16)).unwrap();
        assert!(matches!(
            volume.inspect(16),
            Err(FsError::InvalidBlockIndex { index: 16, total: 16 })
        ));
    }

    #[test]
    fn test_printable_text() {
        let mut block = [0u8; BLOCK_SIZE];
        assert_eq!(printable_text(&block), None);
        block[..6].copy_from_slice(b"a\tb\nc\x07");
        assert_eq!(printable_text(&block), None);
        block[5] = b'!';
        assert_eq!(printable_text(&block), Some("a\tb\nc!".to_owned()));
    }
}
