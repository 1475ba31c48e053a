use anyhow::{anyhow, Ok};
use serde::{de::DeserializeOwned, Serialize};

use crate::fs::{Block, BLOCK_SIZE};

/// Trait for digesting an object which stores digest in the object itself
pub trait DigestInSelf {
    fn digest(&mut self);
    fn verify_digest(&mut self) -> bool;
}

/// Trait for serializing and deserializing an object which stores digest in the object itself
/// # Note
/// This trait is implemented for all on-disk records of this filesystem,
/// which are [Serialize] and [DeserializeOwned] and [DigestInSelf]
pub trait SerializeAndDigest: Serialize + DeserializeOwned + DigestInSelf {
    /// serialize into a [Vec](std::vec::Vec)
    fn serialize(&mut self) -> anyhow::Result<Vec<u8>> {
        self.digest();
        let config = bincode::config::legacy();
        bincode::serde::encode_to_vec(self, config).map_err(|e| e.into())
    }

    /// serialize into a zero padded block
    fn serialize_to_block(&mut self) -> anyhow::Result<Block> {
        let bytes = self.serialize()?;
        if bytes.len() > BLOCK_SIZE {
            return Err(anyhow!(
                "serialized record is {} bytes, a block only holds {BLOCK_SIZE}",
                bytes.len()
            ));
        }
        let mut block = [0u8; BLOCK_SIZE];
        block[..bytes.len()].copy_from_slice(&bytes);
        Ok(block)
    }

    /// deserialize from a block (or any slice starting with the record)
    /// # Returns
    /// A tuple containing the deserialized object and the number of bytes read
    fn deserialize_block(buf: &[u8]) -> anyhow::Result<(Self, usize)> {
        let config = bincode::config::legacy();
        let (mut object, bytes_read): (Self, usize) =
            bincode::serde::decode_from_slice(buf, config)?;
        if !object.verify_digest() {
            Err(anyhow!("deserialized object digest verification failed"))
        } else {
            Ok((object, bytes_read))
        }
    }
}

/// `true` if a block was never written since format
pub fn is_zeroed(block: &[u8]) -> bool {
    block.iter().all(|b| *b == 0)
}
