use crate::utils::hasher::xxh3_pair;

/// Bloom filter used to rule keys out before an authoritative lookup.
///
/// Never returns a false negative. The false-positive rate grows once more
/// than `expected_items` keys are inserted, which only costs extra lookups.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
}

impl BloomFilter {
    /// Size the filter for `expected_items` keys at `false_positive_rate`.
    ///
    /// m = -n ln(p) / ln(2)^2 bits, k = (m / n) ln(2) probes.
    pub fn with_rate(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(1e-9, 0.5);
        let ln2 = std::f64::consts::LN_2;
        let num_bits = (-(n * p.ln()) / (ln2 * ln2)).ceil().max(64.0) as u64;
        let num_hashes = ((num_bits as f64 / n) * ln2).round().clamp(1.0, 16.0) as u32;
        Self::new(num_bits, num_hashes)
    }

    pub fn new(num_bits: u64, num_hashes: u32) -> Self {
        let words = num_bits.div_ceil(64).max(1) as usize;
        Self {
            bits: vec![0u64; words],
            num_bits: words as u64 * 64,
            num_hashes: num_hashes.max(1),
        }
    }

    #[inline]
    fn probes(&self, key: &[u8]) -> impl Iterator<Item = u64> + '_ {
        let (h1, h2) = xxh3_pair(key);
        (0..self.num_hashes as u64)
            .map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits)
    }

    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = xxh3_pair(key);
        for i in 0..self.num_hashes as u64 {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
            self.bits[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
    }

    /// `false` means the key was definitely never inserted.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        self.probes(key)
            .all(|bit| self.bits[(bit / 64) as usize] & (1u64 << (bit % 64)) != 0)
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub fn memory_bytes(&self) -> usize {
        self.bits.len() * std::mem::size_of::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let mut filter = BloomFilter::with_rate(1_000, 0.01);
        for i in 0..5_000u32 {
            filter.insert(&i.to_le_bytes());
        }
        for i in 0..5_000u32 {
            assert!(filter.may_contain(&i.to_le_bytes()));
        }
    }

    #[test]
    fn test_false_positive_rate_is_reasonable() {
        let mut filter = BloomFilter::with_rate(10_000, 0.01);
        for i in 0..10_000u32 {
            filter.insert(format!("key-{i}").as_bytes());
        }
        let false_positives = (0..10_000u32)
            .filter(|i| filter.may_contain(format!("other-{i}").as_bytes()))
            .count();
        assert!(false_positives < 500, "{false_positives} false positives");
    }

    #[test]
    fn test_sizing() {
        let filter = BloomFilter::with_rate(1_000, 0.01);
        // ~9.6 bits per item and ~7 probes at 1%
        assert!(filter.num_bits() >= 9_585);
        assert_eq!(filter.num_hashes(), 7);
        assert_eq!(filter.memory_bytes() as u64 * 8, filter.num_bits());
    }

    #[test]
    fn test_empty_filter_contains_nothing() {
        let filter = BloomFilter::new(128, 3);
        assert!(!filter.may_contain(b"anything"));
    }
}
