//! Default key hashing.
//!
//! The map needs a 64-bit digest of which it uses the low 60 bits, split
//! into ten 6-bit chunks (one per trie level, see [`crate::MAX_LEVEL`]).
//! When a caller does not supply their own `K -> u64` function we fall
//! back to a keyed SipHash, with the key drawn once from the process's
//! randomness source so that two runs of the same program do not hash
//! identically (and so that pathological input cannot be constructed
//! ahead of time against a fixed key).

use std::hash::{Hash, Hasher};
use std::sync::Once;

use siphasher::sip::SipHasher13;

static mut SIP_KEY: [u8; 16] = [0; 16];
static INIT: Once = Once::new();

fn sip_key() -> [u8; 16] {
    INIT.call_once(|| {
        let mut key = [0u8; 16];
        rand::Rng::fill(&mut rand::thread_rng(), &mut key);
        unsafe {
            SIP_KEY = key;
        }
    });
    unsafe { SIP_KEY }
}

/// Hashes `key` with the default, process-randomized SipHash.
pub(crate) fn default_hash<K: Hash + ?Sized>(key: &K) -> u64 {
    let key_bytes = sip_key();
    let mut hasher = SipHasher13::new_with_key(&key_bytes);
    key.hash(&mut hasher);
    hasher.finish()
}

/// Clears the top four bits of a 64-bit hash, leaving the sixty bits the
/// trie actually consumes (ten levels of six bits each).
pub(crate) const HASH_MASK: u64 = 0x0FFF_FFFF_FFFF_FFFF;

/// Width in bits of one trie level's routing key.
pub(crate) const CHUNK_BITS: u32 = 6;

/// Mask selecting one chunk's worth of bits.
const CHUNK_MASK: u64 = (1u64 << CHUNK_BITS) - 1;

/// Extracts the 6-bit chunk that routes `h` at `level`. Level 0 is the
/// six lowest bits of `h`.
#[inline]
pub(crate) fn chunk(h: u64, level: usize) -> u8 {
    ((h >> (CHUNK_BITS as usize * level)) & CHUNK_MASK) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_extracts_low_bits_at_level_zero() {
        assert_eq!(chunk(0b111_111, 0), 0b111_111);
        assert_eq!(chunk(0b1_000_000, 0), 0);
    }

    #[test]
    fn chunk_walks_up_six_bits_at_a_time() {
        let h = 0x0123_4567_89AB_CDEFu64 & HASH_MASK;
        for level in 0..10 {
            let c = chunk(h, level);
            assert!(c < 64);
        }
    }

    #[test]
    fn default_hash_is_stable_within_a_process() {
        let a = default_hash(&"same key");
        let b = default_hash(&"same key");
        assert_eq!(a, b);
    }

    #[test]
    fn default_hash_differs_across_distinct_keys_with_overwhelming_probability() {
        assert_ne!(default_hash(&1u64), default_hash(&2u64));
    }
}
