//! Bit-primitive tests: buffer codings, radix sort, rank, select

use filter_oxide::bits::{
    fold, select_in_long, sort_unsigned, unfold, BitBuffer, MonotoneList, Rank9,
};
use proptest::prelude::*;

// ============================================================================
// Bit buffer
// ============================================================================

#[test]
fn test_number_roundtrip_all_widths() {
    let mut buf = BitBuffer::new(64 * 128);
    for bits in 0..=63u32 {
        let value = if bits == 0 { 0 } else { (1u64 << bits) - 1 };
        buf.write_number(value, bits);
    }
    buf.seek(0);
    for bits in 0..=63u32 {
        let expected = if bits == 0 { 0 } else { (1u64 << bits) - 1 };
        assert_eq!(buf.read_number(bits), expected, "width {}", bits);
    }
}

#[test]
fn test_position_tracks_writes() {
    let mut buf = BitBuffer::new(512);
    assert_eq!(buf.position(), 0);
    buf.write_bit(1);
    assert_eq!(buf.position(), 1);
    buf.write_number(7, 3);
    assert_eq!(buf.position(), 4);
    buf.write_golomb_rice(2, 11);
    // 11 >> 2 = 2 ones, a zero, 2 remainder bits
    assert_eq!(buf.position(), 4 + 2 + 1 + 2);
}

#[test]
fn test_golomb_rice_skip_matches_read() {
    let mut buf = BitBuffer::new(1 << 16);
    let values = [0u64, 1, 5, 63, 64, 100, 999, 4095];
    for &v in &values {
        buf.write_golomb_rice(5, v);
    }
    let mut pos = 0;
    buf.seek(0);
    for &v in &values {
        assert_eq!(buf.read_golomb_rice(5), v);
        pos = buf.skip_golomb_rice(pos, 5);
        assert_eq!(pos, buf.position());
    }
}

// ============================================================================
// Radix sort
// ============================================================================

#[test]
fn test_sort_large_random() {
    let mut data: Vec<u64> = (0..50_000u64)
        .map(|i| i.wrapping_mul(0x2545_F491_4F6C_DD1D).rotate_left(23))
        .collect();
    let xor_before = data.iter().fold(0u64, |a, &x| a ^ x);
    let mut expected = data.clone();
    expected.sort_unstable();
    sort_unsigned(&mut data);
    assert_eq!(data, expected);
    assert_eq!(data.iter().fold(0u64, |a, &x| a ^ x), xor_before);
}

// ============================================================================
// Rank9
// ============================================================================

#[test]
fn test_rank9_dense_and_sparse() {
    for (pattern, name) in [
        (u64::MAX, "dense"),
        (0u64, "empty"),
        (0x8000_0000_0000_0001, "edges"),
    ] {
        let words = vec![pattern; 33];
        let bit_len = 33 * 64;
        let rank = Rank9::new(words.clone(), bit_len);
        let mut expected = 0u64;
        for pos in 0..bit_len {
            assert_eq!(rank.rank(pos), expected, "{} pos {}", name, pos);
            expected += (words[pos >> 6] >> (pos & 63)) & 1;
        }
        assert_eq!(rank.ones(), expected, "{}", name);
    }
}

// ============================================================================
// Select
// ============================================================================

#[test]
fn test_select_across_patterns() {
    for &word in &[0x5555_5555_5555_5555u64, 0xF0F0_F0F0_F0F0_F0F0, 1 << 63] {
        for k in 0..word.count_ones() {
            let r = select_in_long(word, k);
            assert_eq!((word & ((1u64 << r) - 1)).count_ones(), k);
            assert_eq!((word >> r) & 1, 1);
        }
    }
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    #[test]
    fn prop_elias_delta_roundtrip(values in prop::collection::vec(1..u64::MAX, 1..200)) {
        let mut buf = BitBuffer::new(values.len() * 140 + 64);
        for &v in &values {
            buf.write_elias_delta(v).unwrap();
        }
        buf.seek(0);
        for &v in &values {
            prop_assert_eq!(buf.read_elias_delta(), v);
        }
    }

    #[test]
    fn prop_golomb_rice_roundtrip(
        shift in 0u32..16,
        values in prop::collection::vec(0u64..4096, 1..200),
    ) {
        // worst case is shift 0: the whole value in unary
        let mut buf = BitBuffer::new(values.len() * 4200 + 256);
        for &v in &values {
            buf.write_golomb_rice(shift, v);
        }
        buf.seek(0);
        for &v in &values {
            prop_assert_eq!(buf.read_golomb_rice(shift), v);
        }
    }

    #[test]
    fn prop_write_read_number(pairs in prop::collection::vec((0u64..u64::MAX, 1u32..=63), 1..100)) {
        let mut buf = BitBuffer::new(64 * 100);
        for &(v, bits) in &pairs {
            buf.write_number(v & ((1u64 << bits) - 1), bits);
        }
        buf.seek(0);
        for &(v, bits) in &pairs {
            prop_assert_eq!(buf.read_number(bits), v & ((1u64 << bits) - 1));
        }
    }

    #[test]
    fn prop_fold_unfold(x in i64::MIN / 2..i64::MAX / 2) {
        prop_assert_eq!(unfold(fold(x)), x);
    }

    #[test]
    fn prop_radix_sort_matches(mut data in prop::collection::vec(any::<u64>(), 0..500)) {
        let mut expected = data.clone();
        expected.sort_unstable();
        sort_unsigned(&mut data);
        prop_assert_eq!(data, expected);
    }

    #[test]
    fn prop_rank9_matches_naive(words in prop::collection::vec(any::<u64>(), 1..40)) {
        let bit_len = words.len() * 64;
        let rank = Rank9::new(words.clone(), bit_len);
        let mut expected = 0u64;
        for pos in 0..bit_len {
            prop_assert_eq!(rank.rank(pos), expected);
            expected += (words[pos >> 6] >> (pos & 63)) & 1;
        }
    }

    #[test]
    fn prop_select_is_rank_inverse(word in any::<u64>()) {
        for k in 0..word.count_ones() {
            let r = select_in_long(word, k);
            prop_assert_eq!((word & ((1u64 << r) - 1)).count_ones(), k);
        }
    }

    #[test]
    fn prop_monotone_list_roundtrip(deltas in prop::collection::vec(0u64..5000, 1..300)) {
        let mut acc = 0u64;
        let values: Vec<u64> = deltas.iter().map(|&d| { acc += d; acc }).collect();
        let list = MonotoneList::new(&values);
        for (i, &v) in values.iter().enumerate() {
            prop_assert_eq!(list.get(i), v);
        }
    }
}
