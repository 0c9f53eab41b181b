//! Name hashing
//!
//! Generated guards compare against [`hash_name_i`] (methods, classes) or
//! [`hash_name`] (properties, constants), so the values must be stable across
//! builds and platforms. `std`'s hasher makes no such promise, hence a fixed
//! MurmurHash64A.

/// Hash function used to key dispatch tables
pub type NameHasher = fn(&str) -> u64;

const MURMUR_M: u64 = 0xc6a4_a793_5bd1_e995;
const MURMUR_R: u32 = 47;

/// MurmurHash64A over raw bytes
pub fn murmur_hash_64a(data: &[u8], seed: u64) -> u64 {
    let mut h = seed ^ (data.len() as u64).wrapping_mul(MURMUR_M);

    let mut chunks = data.chunks_exact(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let mut k = u64::from_le_bytes(word);
        k = k.wrapping_mul(MURMUR_M);
        k ^= k >> MURMUR_R;
        k = k.wrapping_mul(MURMUR_M);
        h ^= k;
        h = h.wrapping_mul(MURMUR_M);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        for (i, byte) in tail.iter().enumerate() {
            h ^= (*byte as u64) << (8 * i);
        }
        h = h.wrapping_mul(MURMUR_M);
    }

    h ^= h >> MURMUR_R;
    h = h.wrapping_mul(MURMUR_M);
    h ^= h >> MURMUR_R;
    h
}

/// Name hash with the sign bit cleared
pub fn hash_name(name: &str) -> u64 {
    murmur_hash_64a(name.as_bytes(), 0) & (i64::MAX as u64)
}

/// ASCII case-insensitive name hash with the sign bit cleared.
///
/// Bytes outside ASCII are hashed unchanged.
pub fn hash_name_i(name: &str) -> u64 {
    murmur_hash_64a(name.to_ascii_lowercase().as_bytes(), 0) & (i64::MAX as u64)
}

/// `0x%016XLL` literal for generated code
pub fn hash_literal(hash: u64) -> String {
    format!("0x{:016X}LL", hash)
}
