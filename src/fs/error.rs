use thiserror::Error;

/// everything a volume operation can report back to its caller
#[derive(Debug, Error)]
pub enum FsError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("not enough space: {needed} blocks needed, {available} free")]
    InsufficientSpace { needed: usize, available: usize },

    #[error("inode table is full ({capacity} slots in use)")]
    TableFull { capacity: usize },

    #[error("block index {index} is out of range, the volume has {total} blocks")]
    InvalidBlockIndex { index: u32, total: u32 },

    #[error("block store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("journal recovery incomplete: {0}")]
    RecoveryIncomplete(String),

    #[error("file of {size} bytes exceeds the direct pointer limit of {max} bytes")]
    FileTooLarge { size: usize, max: usize },

    #[error("invalid file name {0:?}")]
    InvalidName(String),

    #[error("volume metadata corrupted: {0}")]
    Corrupted(String),

    #[error("injected fault before writing chunk {chunk} of {chunks}")]
    InjectedFault { chunk: usize, chunks: usize },

    #[error("volume halted after an injected fault, remount it to run recovery")]
    Halted,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FsError {
    pub(crate) fn corrupted(what: &str, e: anyhow::Error) -> Self {
        FsError::Corrupted(format!("{what}: {e:#}"))
    }
}
