//! Bounded-memory membership filter for visited ids
//!
//! Standard Bloom filter with double hashing (`h1 + i * h2`). A `true` from
//! `contains` may be a false positive; a `false` is always exact, so an id
//! that was inserted is never reported as unseen.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    inserted: usize,
}

impl BloomFilter {
    /// Size the filter for `expected_items` at the target false-positive rate
    pub fn with_rate(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(1e-9, 0.5);
        let ln2 = std::f64::consts::LN_2;

        let num_bits = (-(n * p.ln()) / (ln2 * ln2)).ceil().max(64.0) as u64;
        let num_hashes = ((num_bits as f64 / n) * ln2).round().clamp(1.0, 32.0) as u32;
        let words = ((num_bits + 63) / 64) as usize;

        Self {
            bits: vec![0; words],
            num_bits,
            num_hashes,
            inserted: 0,
        }
    }

    fn hash_pair(item: &str) -> (u64, u64) {
        let mut first = DefaultHasher::new();
        0x51_u8.hash(&mut first);
        item.hash(&mut first);

        let mut second = DefaultHasher::new();
        0xA7_u8.hash(&mut second);
        item.hash(&mut second);

        // Odd step so every probe sequence covers distinct positions
        (first.finish(), second.finish() | 1)
    }

    fn positions(&self, item: &str) -> impl Iterator<Item = u64> + '_ {
        let (h1, h2) = Self::hash_pair(item);
        (0..self.num_hashes as u64).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits)
    }

    pub fn contains(&self, item: &str) -> bool {
        self.positions(item)
            .all(|bit| self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0)
    }

    /// Insert `item`, returning `true` when it was not already (apparently) present
    pub fn insert(&mut self, item: &str) -> bool {
        let positions: Vec<u64> = self.positions(item).collect();
        let mut newly_set = false;

        for bit in positions {
            let word = &mut self.bits[(bit / 64) as usize];
            let mask = 1 << (bit % 64);
            if *word & mask == 0 {
                *word |= mask;
                newly_set = true;
            }
        }

        if newly_set {
            self.inserted += 1;
        }
        newly_set
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|word| *word = 0);
        self.inserted = 0;
    }

    /// Number of insertions that set at least one new bit
    pub fn len(&self) -> usize {
        self.inserted
    }

    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inserted_items_always_found() {
        let mut filter = BloomFilter::with_rate(10_000, 0.001);
        for i in 0..10_000 {
            filter.insert(&format!("NA1_{}", i));
        }
        for i in 0..10_000 {
            assert!(filter.contains(&format!("NA1_{}", i)));
        }
    }

    #[test]
    fn test_insert_reports_novelty() {
        let mut filter = BloomFilter::with_rate(100, 0.01);
        assert!(filter.insert("player-a"));
        assert!(!filter.insert("player-a"));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_false_positive_rate_near_target() {
        let mut filter = BloomFilter::with_rate(5_000, 0.01);
        for i in 0..5_000 {
            filter.insert(&format!("seen-{}", i));
        }

        let false_positives = (0..20_000)
            .filter(|i| filter.contains(&format!("unseen-{}", i)))
            .count();

        // 1% target; allow generous slack for hash variance
        assert!(false_positives < 600, "too many false positives: {}", false_positives);
    }

    #[test]
    fn test_clear_resets_membership() {
        let mut filter = BloomFilter::with_rate(100, 0.01);
        filter.insert("x");
        filter.clear();
        assert!(!filter.contains("x"));
        assert!(filter.is_empty());
    }

    #[test]
    fn test_sizing() {
        let filter = BloomFilter::with_rate(1_000_000, 0.001);
        // ~14.4 bits per item and ~10 hashes at 0.1%
        assert!(filter.num_bits() > 14_000_000);
        assert_eq!(filter.num_hashes(), 10);
    }
}
