//! Binary fuse filter tests: both widths plus the wire format

use filter_oxide::common::{Filter, FilterError};
use filter_oxide::membership::{BinaryFuse16, BinaryFuse8};
use proptest::prelude::*;

fn spread_keys(n: u64, salt: u64) -> Vec<u64> {
    (0..n)
        .map(|i| {
            i.wrapping_add(salt)
                .wrapping_mul(0x9E6C_63D0_876A_46BD)
                .rotate_left(19)
        })
        .collect()
}

#[test]
fn test_no_false_negatives_across_sizes() {
    // crosses every step of the segment-length curve
    for (n, salt) in [(50u64, 1u64), (800, 2), (9000, 3), (120_000, 4)] {
        let keys = spread_keys(n, salt);
        let filter = BinaryFuse8::from_keys_with_seed(&keys, 501).unwrap();
        for &k in &keys {
            assert!(filter.may_contain(k), "n {} key {:#x}", n, k);
        }
    }
}

#[test]
fn test_fpp_eight_and_sixteen() {
    let keys = spread_keys(20_000, 5);
    let f8 = BinaryFuse8::from_keys_with_seed(&keys, 502).unwrap();
    let f16 = BinaryFuse16::from_keys_with_seed(&keys, 502).unwrap();
    let probes = spread_keys(200_000, 66);
    let fpp8 = probes.iter().filter(|&&k| f8.may_contain(k)).count() as f64 / probes.len() as f64;
    let fpp16 =
        probes.iter().filter(|&&k| f16.may_contain(k)).count() as f64 / probes.len() as f64;
    assert!(fpp8 < 0.012, "fpp8 {}", fpp8);
    assert!(fpp16 < 0.0005, "fpp16 {}", fpp16);
}

#[test]
fn test_space_beats_xor() {
    use filter_oxide::membership::Xor8;
    let keys = spread_keys(200_000, 6);
    let fuse = BinaryFuse8::from_keys_with_seed(&keys, 503).unwrap();
    let xor = Xor8::from_keys_with_seed(&keys, 503).unwrap();
    assert!(
        fuse.bit_count() < xor.bit_count(),
        "fuse {} vs xor {}",
        fuse.bit_count(),
        xor.bit_count()
    );
}

#[test]
fn test_duplicate_detection() {
    let mut keys = spread_keys(500, 7);
    keys.push(keys[0]);
    assert!(matches!(
        BinaryFuse16::from_keys_with_seed(&keys, 504),
        Err(FilterError::DuplicateKey { .. })
    ));
}

// ============================================================================
// Wire format
// ============================================================================

#[test]
fn test_serialized_size_is_exact() {
    let keys = spread_keys(1000, 8);
    let filter = BinaryFuse16::from_keys_with_seed(&keys, 505).unwrap();
    let bytes = filter.to_bytes();
    assert_eq!(bytes.len(), filter.serialized_size());
}

#[test]
fn test_roundtrip_preserves_everything() {
    let keys = spread_keys(10_000, 9);
    let filter = BinaryFuse16::from_keys_with_seed(&keys, 506).unwrap();
    let restored = BinaryFuse16::deserialize(&filter.to_bytes()).unwrap();
    assert_eq!(restored.bit_count(), filter.bit_count());
    assert_eq!(restored.serialized_size(), filter.serialized_size());
    assert_eq!(restored.len(), filter.len());
    for &k in &keys {
        assert!(restored.may_contain(k));
    }
    for probe in spread_keys(50_000, 55) {
        assert_eq!(filter.may_contain(probe), restored.may_contain(probe));
    }
}

#[test]
fn test_header_byte_is_checked() {
    let filter = BinaryFuse16::from_keys_with_seed(&[1, 2, 3], 507).unwrap();
    let mut bytes = filter.to_bytes();
    // the wire format opens with the fixed 0xF6 marker
    assert_eq!(bytes[0], 0xF6);
    bytes[0] = 0x00;
    assert!(matches!(
        BinaryFuse16::deserialize(&bytes),
        Err(FilterError::DeserializationError(_))
    ));
}

#[test]
fn test_geometry_fields_are_checked() {
    let filter = BinaryFuse16::from_keys_with_seed(&[1, 2, 3], 508).unwrap();
    let mut bytes = filter.to_bytes();
    // corrupt the segment length mask
    bytes[16] ^= 0x01;
    assert!(BinaryFuse16::deserialize(&bytes).is_err());
}

#[test]
fn test_short_buffers_are_rejected() {
    let filter = BinaryFuse16::from_keys_with_seed(&[1, 2, 3], 509).unwrap();
    let bytes = filter.to_bytes();
    for cut in [0usize, 1, 16, 32, bytes.len() - 1] {
        assert!(
            BinaryFuse16::deserialize(&bytes[..cut]).is_err(),
            "cut {}",
            cut
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_no_false_negatives(
        keys in prop::collection::hash_set(any::<u64>(), 1..600),
        seed in any::<u64>(),
    ) {
        let keys: Vec<u64> = keys.into_iter().collect();
        let filter = BinaryFuse8::from_keys_with_seed(&keys, seed).unwrap();
        for &k in &keys {
            prop_assert!(filter.may_contain(k));
        }
    }

    #[test]
    fn prop_serialization_roundtrip(
        keys in prop::collection::hash_set(any::<u64>(), 1..200),
        seed in any::<u64>(),
    ) {
        let keys: Vec<u64> = keys.into_iter().collect();
        let filter = BinaryFuse16::from_keys_with_seed(&keys, seed).unwrap();
        let restored = BinaryFuse16::deserialize(&filter.to_bytes()).unwrap();
        for &k in &keys {
            prop_assert!(restored.may_contain(k));
        }
    }
}
