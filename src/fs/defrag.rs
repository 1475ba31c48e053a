use std::fmt;

use log::{error, info};

use crate::block_store::BlockStore;

use super::{FsError, Volume};

/// what a defragmentation pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefragReport {
    pub files: usize,
    /// highest used block before and after the pass
    pub last_block_before: u32,
    pub last_block_after: u32,
}

/// extent count of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFragmentation {
    pub name: String,
    pub extents: usize,
}

/// per file extent counts, in table order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FragmentationReport {
    pub files: Vec<FileFragmentation>,
}

impl FragmentationReport {
    /// files split over more than one run of blocks
    pub fn fragmented_files(&self) -> usize {
        self.files.iter().filter(|f| f.extents > 1).count()
    }
}

impl fmt::Display for FragmentationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fragmentation Report:")?;
        for file in &self.files {
            write!(f, "\n{} -> extents: {}", file.name, file.extents)?;
        }
        Ok(())
    }
}

impl<S: BlockStore> Volume<S> {
    /// count the contiguous block runs of every file, read-only
    pub fn fragmentation(&self) -> FragmentationReport {
        FragmentationReport {
            files: self
                .inodes
                .used()
                .map(|(_, inode)| FileFragmentation {
                    name: inode.name(),
                    extents: inode.extents(),
                })
                .collect(),
        }
    }

    /// rewrite every file, in table order, into the lowest free blocks
    ///
    /// Not atomic: files are staged in memory and re-created one journaled
    /// create at a time, a crash halfway loses the files not re-created yet.
    pub fn optimize(&mut self) -> Result<DefragReport, FsError> {
        self.ensure_running()?;
        let last_block_before = self.space_map.last_used();

        let mut staged = Vec::with_capacity(self.inodes.used_count());
        for (_, inode) in self.inodes.used() {
            staged.push((inode.name(), self.read_content(inode)?));
        }
        info!("optimize() staged {} files", staged.len());

        self.space_map.reset();
        self.inodes.clear();
        self.save_inode_table()?;
        self.superblock.reset_free_blocks();
        self.save_superblock()?;

        for (done, (name, content)) in staged.iter().enumerate() {
            if let Err(e) = self.create(name, content) {
                error!(
                    "optimize() lost {} files starting with {name:?}: {e}",
                    staged.len() - done
                );
                return Err(e);
            }
        }

        let report = DefragReport {
            files: staged.len(),
            last_block_before,
            last_block_after: self.space_map.last_used(),
        };
        info!(
            "optimize() moved {} files, last used block {} -> {}",
            report.files, report.last_block_before, report.last_block_after
        );
        Ok(report)
    }
}
