//! XXH3 hashing for the in-memory key tables.
use std::hash::{BuildHasher, Hasher};
use xxhash_rust::xxh3::{xxh3_128, Xxh3};

#[derive(Default, Clone)]
pub struct Xxh3Hasher(Xxh3);

impl Hasher for Xxh3Hasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0.finish()
    }
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.0.write(bytes);
    }
}

/// `BuildHasher` plugging XXH3 into std collections.
#[derive(Clone, Default, Debug)]
pub struct Xxh3Builder;

impl BuildHasher for Xxh3Builder {
    type Hasher = Xxh3Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        Xxh3Hasher(Xxh3::new())
    }
}

/// Splits the 128-bit XXH3 digest of `bytes` into two independent 64-bit halves.
///
/// Used for Kirsch-Mitzenmacher double hashing: probe `i` is `h1 + i * h2`.
#[inline]
pub fn xxh3_pair(bytes: &[u8]) -> (u64, u64) {
    let digest = xxh3_128(bytes);
    let h1 = digest as u64;
    // An even step would only visit half the slots of a power of two table.
    let h2 = ((digest >> 64) as u64) | 1;
    (h1, h2)
}
