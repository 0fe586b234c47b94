//! Bloom filter tests: plain and blocked layouts

use filter_oxide::common::Filter;
use filter_oxide::membership::{BlockedBloom, Bloom};
use proptest::prelude::*;

fn spread_keys(n: u64, salt: u64) -> Vec<u64> {
    (0..n)
        .map(|i| {
            i.wrapping_add(salt)
                .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                .rotate_left(31)
        })
        .collect()
}

// ============================================================================
// Plain Bloom
// ============================================================================

#[test]
fn test_bloom_no_false_negatives() {
    let keys = spread_keys(20_000, 1);
    let filter = Bloom::from_keys_with_seed(&keys, 10, 100).unwrap();
    for &k in &keys {
        assert!(filter.may_contain(k));
    }
}

#[test]
fn test_bloom_fpp_near_theory() {
    let keys: Vec<u64> = (0..50_000u64).collect();
    let filter = Bloom::from_keys_with_seed(&keys, 10, 101).unwrap();
    let trials = 200_000u64;
    let false_positives = (10_000_000..10_000_000 + trials)
        .filter(|&k| filter.may_contain(k))
        .count();
    let fpp = false_positives as f64 / trials as f64;
    // theory ~0.82% at 10 bits/key with k = 7
    assert!(fpp < 0.025, "fpp {}", fpp);
    assert!(fpp > 0.0005, "suspiciously low fpp {}", fpp);
}

#[test]
fn test_bloom_bits_per_key_range() {
    for bpk in 1..=24u32 {
        let keys = spread_keys(1000, u64::from(bpk));
        let filter = Bloom::from_keys_with_seed(&keys, bpk, 5).unwrap();
        for &k in &keys {
            assert!(filter.may_contain(k), "bpk {}", bpk);
        }
    }
}

// ============================================================================
// Blocked Bloom
// ============================================================================

#[test]
fn test_blocked_no_false_negatives() {
    let keys = spread_keys(20_000, 2);
    let filter = BlockedBloom::from_keys_with_seed(&keys, 12, 102).unwrap();
    for &k in &keys {
        assert!(filter.may_contain(k));
    }
}

#[test]
fn test_blocked_fpp_bounded() {
    let keys: Vec<u64> = (0..50_000u64).collect();
    let filter = BlockedBloom::from_keys_with_seed(&keys, 12, 103).unwrap();
    let trials = 200_000u64;
    let false_positives = (10_000_000..10_000_000 + trials)
        .filter(|&k| filter.may_contain(k))
        .count();
    let fpp = false_positives as f64 / trials as f64;
    // four bits in two words trades FPP for locality
    assert!(fpp < 0.06, "fpp {}", fpp);
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    #[test]
    fn prop_bloom_no_false_negatives(
        keys in prop::collection::hash_set(any::<u64>(), 1..500),
        seed in any::<u64>(),
    ) {
        let keys: Vec<u64> = keys.into_iter().collect();
        let filter = Bloom::from_keys_with_seed(&keys, 10, seed).unwrap();
        for &k in &keys {
            prop_assert!(filter.may_contain(k));
        }
    }

    #[test]
    fn prop_blocked_no_false_negatives(
        keys in prop::collection::hash_set(any::<u64>(), 1..500),
        seed in any::<u64>(),
    ) {
        let keys: Vec<u64> = keys.into_iter().collect();
        let filter = BlockedBloom::from_keys_with_seed(&keys, 12, seed).unwrap();
        for &k in &keys {
            prop_assert!(filter.may_contain(k));
        }
    }
}
