//! The 64-bit non-cryptographic hash used for key ordering and bloom salting.
//!
//! A single seeded `xxh64` instance backs both roles named in the external
//! interface: ordering keys by `(hash, bytes, length)` and salting the bytes
//! fed to every per-index bloom filter. Using one hash for both keeps the
//! bloom filter's false-positive behavior independent of key distribution
//! skew in the ordering hash.

use xxhash_rust::xxh64::xxh64;

/// The seed baked into every on-disk hash. Changing this changes the sort
/// order and bloom behavior of every existing store, so it is a format
/// constant, not a configuration knob.
pub const SEED: u64 = 0x544F_5344_4253_4231; // "TOSDBSB1" as bytes, reinterpreted

/// Hash `bytes` with the engine's seeded xxh64 instance.
#[inline]
pub fn hash64(bytes: &[u8]) -> u64 {
    xxh64(bytes, SEED)
}
