use bincode::config;
use serde::Serialize;

/// [blake3] hash of a record, as bincode encodes it
pub fn digest<T: Serialize>(t: &T) -> anyhow::Result<[u8; 32]> {
    let mut hasher = blake3::Hasher::new();
    let config = config::legacy();
    hasher.update(&bincode::serde::encode_to_vec(t, config)?);
    let mut hash = hasher.finalize_xof();
    let mut output = [0u8; 32];
    hash.fill(&mut output);
    Ok(output)
}

/// [blake3] hash of raw block contents, used for the shadow block
pub fn digest_bytes(bytes: &[u8]) -> [u8; 32] {
    *blake3::hash(bytes).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable_and_content_sensitive() {
        let a = digest(&(1u32, [7u8; 4])).unwrap();
        let b = digest(&(1u32, [7u8; 4])).unwrap();
        let c = digest(&(2u32, [7u8; 4])).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_digest_bytes() {
        assert_eq!(digest_bytes(b"shadow"), digest_bytes(b"shadow"));
        assert_ne!(digest_bytes(b"shadow"), digest_bytes(b"shadoW"));
    }
}
