//! single slot write-ahead journal and the recovery run at mount.
//!
//! Block 2 holds at most one active [JournalSlot]. A CREATE also copies the
//! first block of its payload into the shadow block (block 3), which is all
//! recovery can rescue of an interrupted create. An interrupted DELETE is
//! rolled forward.
use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    block_store::BlockStore,
    utils::{
        self,
        digest::digest_bytes,
        traits::{is_zeroed, DigestInSelf, SerializeAndDigest},
    },
};

use super::{
    inode::{decode_filename, encode_filename},
    FsError, Volume, BLOCK_SIZE, FILENAME_FIELD_LEN, JOURNAL_INDEX, MAX_FILENAME_LEN,
    SHADOW_INDEX,
};

pub const RECOVERED_PREFIX: &str = "recovered_";

/// the mutation a journal slot protects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalOp {
    Create,
    Delete,
}

impl JournalOp {
    const CREATE_TAG: u8 = 1;
    const DELETE_TAG: u8 = 2;

    pub fn tag(self) -> u8 {
        match self {
            JournalOp::Create => Self::CREATE_TAG,
            JournalOp::Delete => Self::DELETE_TAG,
        }
    }

    /// any tag other than CREATE replays as a delete
    pub fn from_tag(tag: u8) -> Self {
        if tag == Self::CREATE_TAG {
            JournalOp::Create
        } else {
            JournalOp::Delete
        }
    }
}

/// in-memory view of the journal
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JournalState {
    #[default]
    Idle,
    Active { op: JournalOp, filename: String },
}

/// the record stored in block 2, an all zero block is an idle journal
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct JournalSlot {
    pub is_active: bool,
    pub operation: u8,
    pub filename: [u8; FILENAME_FIELD_LEN],
    /// payload bytes copied into the shadow block
    pub payload_len: u32,
    /// blake3 of the whole shadow block
    pub shadow_digest: [u8; 32],
    pub digest: [u8; 32],
}

impl JournalSlot {
    pub fn new(
        op: JournalOp,
        filename: &str,
        payload_len: u32,
        shadow_digest: [u8; 32],
    ) -> Result<Self, FsError> {
        Ok(JournalSlot {
            is_active: true,
            operation: op.tag(),
            filename: encode_filename(filename)?,
            payload_len,
            shadow_digest,
            digest: [0u8; 32],
        })
    }

    pub fn op(&self) -> JournalOp {
        JournalOp::from_tag(self.operation)
    }

    pub fn filename(&self) -> String {
        decode_filename(&self.filename)
    }
}

impl DigestInSelf for JournalSlot {
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
impl SerializeAndDigest for JournalSlot {}

/// what recovery did with the journal at mount
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecoveryReport {
    /// the journal was idle
    #[default]
    Clean,
    /// an interrupted create, its first block saved under a new name
    Recovered {
        original: String,
        recovered_as: String,
        bytes: usize,
    },
    /// an interrupted create without any payload to rescue
    Discarded { filename: String },
    /// an interrupted delete, now completed
    RolledForward { filename: String },
    /// an interrupted delete whose file was already gone
    AlreadyComplete { filename: String },
    /// the journal or shadow block could not be used, the volume is mounted anyway
    Incomplete { reason: String },
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        matches!(self, RecoveryReport::Clean)
    }

    /// the [FsError::RecoveryIncomplete] behind an incomplete recovery
    pub fn error(&self) -> Option<FsError> {
        match self {
            RecoveryReport::Incomplete { reason } => {
                Some(FsError::RecoveryIncomplete(reason.clone()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for RecoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryReport::Clean => write!(f, "journal clean"),
            RecoveryReport::Recovered {
                original,
                recovered_as,
                bytes,
            } => write!(
                f,
                "interrupted create of {original:?}: {bytes} bytes saved to {recovered_as:?}"
            ),
            RecoveryReport::Discarded { filename } => {
                write!(f, "interrupted create of {filename:?}: nothing to rescue")
            }
            RecoveryReport::RolledForward { filename } => {
                write!(f, "interrupted delete of {filename:?}: completed")
            }
            RecoveryReport::AlreadyComplete { filename } => {
                write!(f, "interrupted delete of {filename:?}: file already gone")
            }
            RecoveryReport::Incomplete { reason } => write!(f, "recovery incomplete: {reason}"),
        }
    }
}

/// `recovered_` + `filename`, cut down to the longest name an inode can hold
pub fn recovered_name(filename: &str) -> String {
    let mut name = format!("{RECOVERED_PREFIX}{filename}");
    if name.len() > MAX_FILENAME_LEN {
        let mut end = MAX_FILENAME_LEN;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}

/// journal operations
impl<S: BlockStore> Volume<S> {
    /// write the journal slot, and for CREATE the shadow copy of the payload
    pub(crate) fn begin_op(
        &mut self,
        op: JournalOp,
        filename: &str,
        payload: Option<&[u8]>,
    ) -> Result<(), FsError> {
        debug_assert_eq!(self.journal, JournalState::Idle, "overlapping mutations");
        let (payload_len, shadow_digest) = match op {
            JournalOp::Create => {
                let payload = payload.unwrap_or_default();
                let len = payload.len().min(BLOCK_SIZE);
                let mut shadow = [0u8; BLOCK_SIZE];
                shadow[..len].copy_from_slice(&payload[..len]);
                // the shadow lands before the slot that vouches for it
                self.store.write_block(SHADOW_INDEX, &shadow)?;
                (len as u32, digest_bytes(&shadow))
            }
            JournalOp::Delete => (0, [0u8; 32]),
        };
        let block = JournalSlot::new(op, filename, payload_len, shadow_digest)?
            .serialize_to_block()
            .map_err(|e| FsError::corrupted("journal slot", e))?;
        self.store.write_block(JOURNAL_INDEX, &block)?;
        debug!("journal: begin {op:?} {filename:?}");
        self.journal = JournalState::Active {
            op,
            filename: filename.to_owned(),
        };
        Ok(())
    }

    /// zero the journal slot, the operation is committed
    pub(crate) fn end_op(&mut self) -> Result<(), FsError> {
        self.store.write_block(JOURNAL_INDEX, &[0u8; BLOCK_SIZE])?;
        if let JournalState::Active { op, filename } = &self.journal {
            debug!("journal: end {op:?} {filename:?}");
        }
        self.journal = JournalState::Idle;
        Ok(())
    }

    /// the active journal slot, if any
    pub(crate) fn read_journal_slot(&self) -> Result<Option<JournalSlot>, FsError> {
        let block = self.store.read_block(JOURNAL_INDEX).map_err(|e| {
            FsError::RecoveryIncomplete(format!("journal block unreadable: {e}"))
        })?;
        if is_zeroed(&block) {
            return Ok(None);
        }
        let (slot, _) = JournalSlot::deserialize_block(&block).map_err(|e| {
            FsError::RecoveryIncomplete(format!("journal slot unreadable: {e:#}"))
        })?;
        Ok(slot.is_active.then_some(slot))
    }

    /// replay the journal once, before the volume is handed out
    pub(crate) fn recover(&mut self) -> RecoveryReport {
        let report = match self.read_journal_slot() {
            Ok(None) => return RecoveryReport::Clean,
            Ok(Some(slot)) => {
                warn!(
                    "system crash detected: {:?} of {:?} was interrupted",
                    slot.op(),
                    slot.filename()
                );
                match slot.op() {
                    JournalOp::Create => self.recover_create(&slot),
                    JournalOp::Delete => self.roll_forward_delete(&slot.filename()),
                }
            }
            Err(e) => RecoveryReport::Incomplete {
                reason: e.to_string(),
            },
        };
        let report = match self.end_op() {
            Ok(()) => report,
            Err(e) => RecoveryReport::Incomplete {
                reason: format!("{report}; clearing the journal failed: {e}"),
            },
        };
        info!("{report}");
        report
    }

    fn recover_create(&mut self, slot: &JournalSlot) -> RecoveryReport {
        let original = slot.filename();
        let shadow = match self.store.read_block(SHADOW_INDEX) {
            Ok(block) => block,
            Err(e) => {
                return RecoveryReport::Incomplete {
                    reason: format!("shadow block unreadable: {e}"),
                }
            }
        };
        if digest_bytes(&shadow) != slot.shadow_digest {
            return RecoveryReport::Incomplete {
                reason: format!("shadow block of {original:?} does not match the journal"),
            };
        }
        let bytes = (slot.payload_len as usize).min(BLOCK_SIZE);
        if bytes == 0 {
            return RecoveryReport::Discarded { filename: original };
        }
        let recovered_as = recovered_name(&original);
        match self.create(&recovered_as, &shadow[..bytes]) {
            Ok(()) => RecoveryReport::Recovered {
                original,
                recovered_as,
                bytes,
            },
            Err(e) => RecoveryReport::Incomplete {
                reason: format!("saving {recovered_as:?} failed: {e}"),
            },
        }
    }

    fn roll_forward_delete(&mut self, filename: &str) -> RecoveryReport {
        if self.inodes.find_inode(filename).is_err() {
            return RecoveryReport::AlreadyComplete {
                filename: filename.to_owned(),
            };
        }
        match self.delete(filename) {
            Ok(()) => RecoveryReport::RolledForward {
                filename: filename.to_owned(),
            },
            Err(e) => {
                // the inode was put back, memory matches the store again
                self.halted = false;
                RecoveryReport::Incomplete {
                    reason: format!("completing delete of {filename:?} failed: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{fs_layout::tests::formatted, TOTAL_BLOCKS};

    fn crash<S: BlockStore>(volume: Volume<S>) -> Volume<S> {
        Volume::mount(volume.into_store()).unwrap()
    }

    #[test]
    fn test_journal_op_tags() {
        assert_eq!(JournalOp::from_tag(JournalOp::Create.tag()), JournalOp::Create);
        assert_eq!(JournalOp::from_tag(JournalOp::Delete.tag()), JournalOp::Delete);
        assert_eq!(JournalOp::from_tag(0x7f), JournalOp::Delete);
    }

    #[test]
    fn test_recovered_name() {
        assert_eq!(recovered_name("x"), "recovered_x");
        let long = "abcdefghijklmnopqrstuvwxyz01234";
        assert_eq!(recovered_name(long).len(), MAX_FILENAME_LEN);
        assert!(recovered_name(long).starts_with("recovered_abc"));
        // never cut a character in half
        let name = recovered_name("ééééééééééééé");
        assert!(name.len() <= MAX_FILENAME_LEN);
        assert!(name.ends_with('é'));
    }

    #[test]
    fn test_begin_and_end_op() -> anyhow::Result<()> {
        let mut volume = Volume::mount(formatted(16))?;
        volume.begin_op(JournalOp::Create, "f", Some(b"payload"))?;
        assert_eq!(
            volume.journal_state(),
            &JournalState::Active {
                op: JournalOp::Create,
                filename: "f".to_owned()
            }
        );
        let slot = volume.read_journal_slot()?.expect("slot is active");
        assert_eq!(slot.op(), JournalOp::Create);
        assert_eq!(slot.filename(), "f");
        assert_eq!(slot.payload_len, 7);
        assert_eq!(&volume.store().read_block(SHADOW_INDEX)?[..8], b"payload\0");

        volume.end_op()?;
        assert_eq!(volume.journal_state(), &JournalState::Idle);
        assert_eq!(volume.store().read_block(JOURNAL_INDEX)?, [0u8; BLOCK_SIZE]);
        assert!(volume.read_journal_slot()?.is_none());
        Ok(())
    }

    #[test]
    fn test_shadow_keeps_only_the_first_block() -> anyhow::Result<()> {
        let mut volume = Volume::mount(formatted(16))?;
        let mut payload = vec![b'a'; BLOCK_SIZE];
        payload.extend_from_slice(b"tail");
        volume.begin_op(JournalOp::Create, "big", Some(&payload))?;
        assert_eq!(volume.store().read_block(SHADOW_INDEX)?, [b'a'; BLOCK_SIZE]);
        assert_eq!(
            volume.read_journal_slot()?.map(|s| s.payload_len),
            Some(BLOCK_SIZE as u32)
        );
        Ok(())
    }

    #[test]
    fn test_clean_journal_needs_no_recovery() -> anyhow::Result<()> {
        let mut volume = Volume::mount(formatted(16))?;
        volume.create("a", b"a")?;
        let volume = crash(volume);
        assert!(volume.recovery().is_clean());
        assert!(volume.recovery().error().is_none());
        Ok(())
    }

    #[test]
    fn test_interrupted_create_is_recovered() -> anyhow::Result<()> {
        let mut volume = Volume::mount(formatted(TOTAL_BLOCKS))?;
        volume.begin_op(JournalOp::Create, "x", Some(b"0123456789"))?;
        let mut volume = crash(volume);
        assert_eq!(
            volume.recovery(),
            &RecoveryReport::Recovered {
                original: "x".to_owned(),
                recovered_as: "recovered_x".to_owned(),
                bytes: 10
            }
        );
        assert_eq!(volume.read("recovered_x")?, b"0123456789");
        assert!(matches!(volume.read("x"), Err(FsError::NotFound(_))));
        assert!(volume.read_journal_slot()?.is_none());
        // the recovery was a regular journaled create
        assert_eq!(volume.superblock().free_blocks_count, TOTAL_BLOCKS - 2);
        volume.delete("recovered_x")?;
        Ok(())
    }

    #[test]
    fn test_interrupted_empty_create_leaves_no_trace() -> anyhow::Result<()> {
        let mut volume = Volume::mount(formatted(16))?;
        volume.begin_op(JournalOp::Create, "empty", Some(b""))?;
        let volume = crash(volume);
        assert_eq!(
            volume.recovery(),
            &RecoveryReport::Discarded {
                filename: "empty".to_owned()
            }
        );
        assert_eq!(volume.inode_table().used_count(), 0);
        Ok(())
    }

    #[test]
    fn test_interrupted_delete_rolls_forward() -> anyhow::Result<()> {
        let mut volume = Volume::mount(formatted(16))?;
        volume.create("keep", b"k")?;
        volume.create("gone", &[7u8; BLOCK_SIZE + 1])?;
        let free_before = volume.superblock().free_blocks_count;
        volume.begin_op(JournalOp::Delete, "gone", None)?;
        let mut volume = crash(volume);
        assert_eq!(
            volume.recovery(),
            &RecoveryReport::RolledForward {
                filename: "gone".to_owned()
            }
        );
        assert!(matches!(volume.read("gone"), Err(FsError::NotFound(_))));
        assert_eq!(volume.read("keep")?, b"k");
        assert_eq!(volume.superblock().free_blocks_count, free_before + 2);
        assert!(!volume.space_map().is_used(5));
        assert!(!volume.space_map().is_used(6));
        volume.create("again", b"again")?;
        Ok(())
    }

    #[test]
    fn test_delete_after_inode_was_released_converges() -> anyhow::Result<()> {
        let mut volume = Volume::mount(formatted(16))?;
        volume.create("gone", b"g")?;
        volume.begin_op(JournalOp::Delete, "gone", None)?;
        // the crash hit after the table write, before the journal was cleared
        volume.inodes.release(0);
        volume.save_inode_table()?;
        let volume = crash(volume);
        assert_eq!(
            volume.recovery(),
            &RecoveryReport::AlreadyComplete {
                filename: "gone".to_owned()
            }
        );
        assert_eq!(volume.inode_table().used_count(), 0);
        assert_eq!(volume.space_map().free_count(), 12);
        Ok(())
    }

    #[test]
    fn test_unknown_tag_replays_as_delete() -> anyhow::Result<()> {
        let mut volume = Volume::mount(formatted(16))?;
        volume.create("odd", b"o")?;
        let mut slot = JournalSlot::new(JournalOp::Delete, "odd", 0, [0u8; 32])?;
        slot.operation = 9;
        let block = slot.serialize_to_block()?;
        let mut store = volume.into_store();
        store.write_block(JOURNAL_INDEX, &block)?;
        let volume = Volume::mount(store)?;
        assert_eq!(
            volume.recovery(),
            &RecoveryReport::RolledForward {
                filename: "odd".to_owned()
            }
        );
        Ok(())
    }

    #[test]
    fn test_unreadable_journal_still_mounts() -> anyhow::Result<()> {
        let mut store = formatted(16);
        store.write_block(JOURNAL_INDEX, &[0xeeu8; BLOCK_SIZE])?;
        let mut volume = Volume::mount(store)?;
        assert!(matches!(
            volume.recovery().error(),
            Some(FsError::RecoveryIncomplete(_))
        ));
        assert!(volume.read_journal_slot()?.is_none());
        volume.create("usable", b"yes")?;
        assert_eq!(volume.read("usable")?, b"yes");
        Ok(())
    }

    #[test]
    fn test_damaged_shadow_block_is_reported() -> anyhow::Result<()> {
        let mut volume = Volume::mount(formatted(16))?;
        volume.begin_op(JournalOp::Create, "x", Some(b"0123456789"))?;
        let mut store = volume.into_store();
        store.write_block(SHADOW_INDEX, &[b'?'; BLOCK_SIZE])?;
        let volume = Volume::mount(store)?;
        assert!(matches!(
            volume.recovery(),
            RecoveryReport::Incomplete { .. }
        ));
        assert_eq!(volume.inode_table().used_count(), 0);
        assert!(volume.read_journal_slot()?.is_none());
        Ok(())
    }

    #[test]
    fn test_failed_recovery_create_is_reported() -> anyhow::Result<()> {
        // 5 blocks leave a single data block, already taken
        let mut volume = Volume::mount(formatted(5))?;
        volume.create("full", b"f")?;
        volume.begin_op(JournalOp::Create, "x", Some(b"data"))?;
        let volume = crash(volume);
        assert!(matches!(
            volume.recovery(),
            RecoveryReport::Incomplete { .. }
        ));
        assert_eq!(volume.read("full")?, b"f");
        Ok(())
    }

    #[test]
    fn test_idle_mount_only_touches_the_superblock() -> anyhow::Result<()> {
        let store = formatted(16);
        let volume = Volume::mount(store.clone())?;
        // only the superblock changed (last mount time)
        let after = volume.into_store();
        for index in 1..16 {
            assert_eq!(after.read_block(index)?, store.read_block(index)?);
        }
        Ok(())
    }
}
