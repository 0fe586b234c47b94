//! Golomb-compressed set tests, plus MPHF smoke coverage

use filter_oxide::common::{Filter, FilterError};
use filter_oxide::membership::{Gcs, Mphf};
use proptest::prelude::*;

fn spread_keys(n: u64, salt: u64) -> Vec<u64> {
    (0..n)
        .map(|i| {
            i.wrapping_add(salt)
                .wrapping_mul(0xBF58_476D_1CE4_E5B9)
                .rotate_left(11)
        })
        .collect()
}

#[test]
fn test_gcs_no_false_negatives() {
    let keys = spread_keys(50_000, 1);
    let filter = Gcs::from_keys_with_seed(&keys, 8, 601).unwrap();
    for &k in &keys {
        assert!(filter.may_contain(k));
    }
}

#[test]
fn test_gcs_fpp_tracks_fingerprint_bits() {
    let keys = spread_keys(10_000, 2);
    let probes = spread_keys(100_000, 33);
    for (bits, bound) in [(6u32, 0.07), (8, 0.02), (12, 0.0015)] {
        let filter = Gcs::from_keys_with_seed(&keys, bits, 602).unwrap();
        let fpp = probes.iter().filter(|&&k| filter.may_contain(k)).count() as f64
            / probes.len() as f64;
        assert!(fpp < bound, "bits {} fpp {}", bits, fpp);
    }
}

#[test]
fn test_gcs_space_near_floor() {
    let keys = spread_keys(100_000, 3);
    for bits in [6u32, 8, 10] {
        let filter = Gcs::from_keys_with_seed(&keys, bits, 603).unwrap();
        let per_key = filter.bits_per_key();
        // information floor is log2(1/eps); Rice coding adds ~1.5, the
        // offset index a little more
        assert!(
            per_key < f64::from(bits) + 2.5,
            "bits {} cost {}",
            bits,
            per_key
        );
    }
}

#[test]
fn test_gcs_rejects_bad_width() {
    assert!(matches!(
        Gcs::from_keys(&[1], 1),
        Err(FilterError::InvalidParameter { .. })
    ));
    assert!(matches!(
        Gcs::from_keys(&[1], 40),
        Err(FilterError::InvalidParameter { .. })
    ));
}

#[test]
fn test_gcs_single_bucket() {
    // fewer than 64 keys all land in one bucket
    let keys = spread_keys(40, 4);
    let filter = Gcs::from_keys_with_seed(&keys, 10, 604).unwrap();
    for &k in &keys {
        assert!(filter.may_contain(k));
    }
}

// ============================================================================
// MPHF (experimental): smoke coverage only
// ============================================================================

#[test]
fn test_mphf_smoke_membership() {
    let keys = spread_keys(5000, 5);
    let filter = Mphf::from_keys_with_seed(&keys, 8, 605).unwrap();
    for &k in &keys {
        assert!(filter.may_contain(k));
    }
}

#[test]
fn test_mphf_fpp_sane() {
    let keys = spread_keys(2000, 6);
    let filter = Mphf::from_keys_with_seed(&keys, 8, 606).unwrap();
    let probes = spread_keys(50_000, 44);
    let fpp =
        probes.iter().filter(|&&k| filter.may_contain(k)).count() as f64 / probes.len() as f64;
    // one stored fingerprint per probe: ~2^-8
    assert!(fpp < 0.02, "fpp {}", fpp);
}

#[test]
fn test_mphf_rejects_duplicates() {
    assert!(matches!(
        Mphf::from_keys_with_seed(&[9, 9, 1], 8, 607),
        Err(FilterError::DuplicateKey { key: 9 })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_gcs_no_false_negatives(
        keys in prop::collection::vec(any::<u64>(), 1..500),
        seed in any::<u64>(),
    ) {
        let filter = Gcs::from_keys_with_seed(&keys, 8, seed).unwrap();
        for &k in &keys {
            prop_assert!(filter.may_contain(k));
        }
    }
}
